//! Metadata Server client boundary (§4.2, §4.5, §4.6).
//!
//! `MsClient` is the narrow interface the namespace, reconciler and
//! specfile-reload loop use to talk to the Metadata Server. An
//! RPC-backed implementation talking to a standalone MS process is out
//! of scope here (it's an external system's wire protocol, not this
//! gateway's); [`fake::FakeMs`] doubles as both the §8 test harness's MS
//! and `agd`'s `--ms-mode local` single-node deployment mode.
pub mod fake;

use crate::error::AgResult;
use crate::namespace::map_info::EntryType;
use p256::ecdsa::VerifyingKey;

/// One child entry as reported by `listdir` (§4.5 `download_MS_fs_map`).
#[derive(Debug, Clone)]
pub struct MsDirEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub file_id: u64,
    pub file_version: i64,
    pub write_nonce: u64,
    pub num_children: u64,
    pub generation: u64,
    pub capacity: u64,
}

/// One path's MS-coherence data, as reported by a batched `path_download`
/// (§4.5 `refresh_path_metadata`). `None` means the MS no longer knows the
/// path (deleted out from under a cached ancestor).
pub type MsPathResult = Option<MsDirEntry>;

/// A path's coherence data as pushed up to the MS (§4.6 `create_all`/`update_all`).
#[derive(Debug, Clone)]
pub struct MsPublish {
    pub path: String,
    pub entry_type: EntryType,
    pub file_id: u64,
    pub file_version: i64,
    pub write_nonce: u64,
    pub num_children: u64,
    pub generation: u64,
    pub capacity: u64,
}

pub trait MsClient: Send + Sync {
    /// Lists the immediate children of `path` under `volume_id`, in MS
    /// coherence terms. Used by `download_MS_fs_map`'s frontier BFS.
    fn listdir(&self, volume_id: u64, path: &str) -> AgResult<Vec<MsDirEntry>>;

    /// Batched lookup of `paths`, in request order. Used by
    /// `refresh_path_metadata` so a stale-ancestor chain costs one round
    /// trip instead of one per path (§4.5).
    fn path_download(&self, volume_id: u64, paths: &[String]) -> AgResult<Vec<MsPathResult>>;

    /// Publishes brand-new paths discovered by a specfile reload (§4.6 phase 1).
    fn create_all(&self, volume_id: u64, entries: &[MsPublish]) -> AgResult<()>;

    /// Pushes coherence updates for paths that already existed in the MS
    /// but whose specfile-visible attributes changed (§4.6 phase 2).
    fn update_all(&self, volume_id: u64, entries: &[MsPublish]) -> AgResult<()>;

    /// Removes paths the specfile no longer names (§4.6 phase 3).
    fn delete_all(&self, volume_id: u64, paths: &[String]) -> AgResult<()>;

    /// Fetches the current specfile bundle for `volume_id`: base64-encoded,
    /// zstd-compressed XML (§4.8, §11.1 when no local specfile path is given).
    fn fetch_specfile_bundle(&self, volume_id: u64) -> AgResult<Vec<u8>>;

    /// Fetches a gateway's current public key, for cert-cache reload on
    /// [`crate::error::AgError::CertUnknown`] (§11.4).
    fn fetch_cert(&self, gateway_id: u64) -> AgResult<VerifyingKey>;
}
