//! `map_info`: one per path in the namespace (§3).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Dir,
}

/// Driver-coherence block, valid iff `driver_cache_valid` (§3).
pub type DriverCoherence = crate::wire::PubInfo;

#[derive(Debug, Clone)]
pub struct MapInfo {
    pub entry_type: EntryType,
    pub query_string: String,
    /// Query-type tag naming this entry's driver. The driver table
    /// outlives any namespace snapshot that references it, so this is a
    /// borrowing reference by name rather than an owned/shared pointer
    /// (§9 "raw pointer graph -> ownership-clear containers").
    pub driver: String,
    /// Octal permission bits; never has a write bit set (§3 permission
    /// invariant — rejected at parse time, see `ag::specfile`).
    pub file_perm: u32,
    /// Coordinator gateway for this path; mismatches provoke a 410/302
    /// at the HTTP layer depending on context (§4.9).
    pub coordinator_id: u64,

    /// MS-coherence block (§3): only meaningful when `cache_valid` is
    /// true, except `write_nonce`, which survives invalidation so the
    /// next MS compare is forced to mismatch rather than spuriously
    /// agree with stale data.
    pub cache_valid: bool,
    pub file_id: u64,
    pub file_version: i64,
    pub write_nonce: u64,
    pub num_children: u64,
    pub generation: u64,
    pub capacity: u64,

    pub driver_cache: Option<DriverCoherence>,

    pub block_version: i64,
    pub reval_sec: u64,
    pub refresh_deadline: f64,
}

impl MapInfo {
    pub fn new_dir(coordinator_id: u64) -> Self {
        MapInfo {
            entry_type: EntryType::Dir,
            query_string: String::new(),
            driver: String::new(),
            file_perm: 0o555,
            coordinator_id,
            cache_valid: false,
            file_id: 0,
            file_version: 0,
            write_nonce: 0,
            num_children: 0,
            generation: 0,
            capacity: 0,
            driver_cache: None,
            block_version: 0,
            reval_sec: 0,
            refresh_deadline: 0.0,
        }
    }

    pub fn driver_cache_valid(&self) -> bool {
        self.driver_cache.is_some()
    }

    /// An entry is fresh iff `now < refresh_deadline` (§3).
    pub fn is_fresh(&self, now_secs: f64) -> bool {
        now_secs < self.refresh_deadline
    }

    /// `make_coherent_with_MS_data` (§4.5). Coherence monotonicity (§3,
    /// §8): this is the only way `cache_valid` becomes `true`.
    pub fn make_coherent_with_ms_data(
        &mut self,
        file_id: u64,
        file_version: i64,
        write_nonce: u64,
        num_children: u64,
        generation: u64,
        capacity: u64,
    ) {
        self.file_id = file_id;
        self.file_version = file_version;
        self.write_nonce = write_nonce;
        self.num_children = num_children;
        self.generation = generation;
        self.capacity = capacity;
        self.cache_valid = true;
    }

    /// `make_coherent_with_driver_data` (§4.5).
    pub fn make_coherent_with_driver_data(&mut self, size: u64, mtime_sec: i64, mtime_nsec: i32) {
        self.driver_cache = Some(DriverCoherence { size, mtime_sec, mtime_nsec });
    }

    /// `make_coherent_with_AG_data` (§4.5).
    pub fn make_coherent_with_ag_data(&mut self, block_version: i64, refresh_deadline: f64) {
        self.block_version = block_version;
        self.refresh_deadline = refresh_deadline;
    }

    /// `invalidate_cached_metadata` (§4.5): `cache_valid` becomes false and
    /// `write_nonce` is randomized so the next MS compare is forced to
    /// refresh rather than spuriously matching stale data.
    pub fn invalidate_cached_metadata(&mut self) {
        self.cache_valid = false;
        self.write_nonce = rand::random();
    }
}
