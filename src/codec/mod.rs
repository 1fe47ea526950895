//! Signed-chunk codec (§4.4).

mod manifest;
mod sign;
mod verify;

pub use manifest::{sign_manifest, verify_manifest};
pub use sign::{sign_block, SigningIdentity};
pub use verify::verify_block;
