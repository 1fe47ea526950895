#![forbid(unsafe_code)]

//! Acquisition Gateway: a versioned, coherent filesystem namespace server
//! fronting a distributed storage volume (§1-§9). Exposes content fetched
//! through driver worker subprocesses as a read-only, signed, HTTP-addressable
//! tree, kept coherent with a Metadata Server.

pub mod cache;
pub mod certs;
pub mod clock;
pub mod codec;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod framing;
pub mod http;
pub mod logging;
pub mod ms;
pub mod namespace;
pub mod reconcile;
pub mod reversion;
pub mod specfile;
pub mod state;
pub mod watchdog;
pub mod wire;

pub use error::{AgError, AgResult};
pub use state::State;
