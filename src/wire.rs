//! Wire-form object model (§3). The actual on-the-wire encoding of these
//! structures (protobuf in the original system) is an external interface;
//! here they are plain `serde` types encoded with `bincode`, matching the
//! teacher's own use of `bincode` for its on-disk record format. Driver
//! framing (§4.1) wraps a [`DriverRequest`]/[`DriverReply`] as one chunk;
//! the signed-chunk codec (§4.4, `ag::codec`) wraps a [`SignedBlockHeader`]
//! as the header half of a block's wire form.

use serde::{Deserialize, Serialize};

/// One HTTP request's identity, as parsed from the URL path schema (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestData {
    pub volume_id: u64,
    pub fs_path: String,
    pub file_id: u64,
    pub file_version: i64,
    pub locator: BlockLocator,
    pub xattr_name: Option<String>,
    pub user_id: u64,
    pub coordinator_id: u64,
}

/// Distinguishes a block GET from a manifest GET (§3, §4.9 URL schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLocator {
    Block { block_id: u64, block_version: i64 },
    Manifest { mtime_sec: i64, mtime_nsec: i32 },
}

/// What the AG sends a driver worker for a single request (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRequest {
    pub request_type: DriverRequestType,
    pub file_id: u64,
    pub file_version: i64,
    pub block_id: u64,
    pub block_version: i64,
    pub manifest_mtime_sec: i64,
    pub manifest_mtime_nsec: i32,
    pub path: String,
    pub query_string: String,
    pub io_hint_sequential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverRequestType {
    Block,
    Stat,
    Reversion,
    Ioctl,
}

/// A driver worker's reply to one [`DriverRequest`]; a non-zero `status`
/// means the request failed and `payload` carries no data (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverReply {
    pub status: u8,
    pub payload: Vec<u8>,
}

impl DriverReply {
    pub fn ok(payload: Vec<u8>) -> Self {
        DriverReply { status: 0, payload }
    }

    pub fn err() -> Self {
        DriverReply { status: 1, payload: Vec::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `(size, mtime_sec, mtime_nsec)` returned by a driver's stat callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubInfo {
    pub size: u64,
    pub mtime_sec: i64,
    pub mtime_nsec: i32,
}

/// Header carried alongside a block's payload in the signed wire form
/// (§3): `[u32 header_len BE][SignedBlockHeader][payload bytes]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBlockHeader {
    pub volume_id: u64,
    pub file_id: u64,
    pub file_version: i64,
    pub block_id: u64,
    pub block_version: i64,
    pub payload_sha256: [u8; 32],
    pub signing_gateway_id: u64,
    pub signature: Vec<u8>,
}

/// One contiguous range of blocks in a manifest, all served by the same
/// gateway, with independent per-block versions (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRange {
    pub start_id: u64,
    pub end_id: u64,
    pub gateway_id: u64,
    pub block_versions: Vec<i64>,
}

/// Signed description of a file's block layout at a point in time (§3).
/// Hashing for the signature is computed over the struct with `signature`
/// cleared (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub volume_id: u64,
    pub file_id: u64,
    pub file_version: i64,
    pub owner_id: u64,
    pub size: u64,
    pub mtime_sec: i64,
    pub mtime_nsec: i32,
    pub ranges: Vec<BlockRange>,
    pub signing_gateway_id: u64,
    pub signature: Vec<u8>,
}

/// Serializes a value with `bincode`, mapping failures to [`crate::error::AgError`].
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, crate::error::AgError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| crate::error::AgError::Codec(e.to_string()))
}

/// Deserializes a value with `bincode`, mapping failures to [`crate::error::AgError`].
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, crate::error::AgError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(v, _)| v)
        .map_err(|e| crate::error::AgError::Codec(e.to_string()))
}
