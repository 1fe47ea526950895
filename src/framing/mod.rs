//! Length-prefixed framed-pipe protocol spoken to driver worker processes (§4.1).

mod chunk;

pub use chunk::{read_chunk, write_chunk};
