//! The `AG_fs` namespace (§3, §4.5): per-path coherence records, the
//! ancestor/root invariants, and the MS-backed refresh/discovery paths.

pub mod ag_fs;
pub mod map_info;
pub mod persist;

pub use ag_fs::{validate_map_info, AgFs};
pub use map_info::{EntryType, MapInfo};
