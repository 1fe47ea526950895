//! Specfile object model, parser, and reload loop (§4.8).

pub mod model;
pub mod parser;
pub mod reload;

pub use model::{FileEntry, Pair, Query, Specfile};
pub use reload::{fetch_specfile_text, reload};
