//! Cache configuration: soft/hard byte limits (§4.3) and the volume block
//! size used for the read-side size sanity check.

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub soft_limit_bytes: u64,
    pub hard_limit_bytes: u64,
    pub block_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            soft_limit_bytes: 50 * 1024 * 1024,
            hard_limit_bytes: 100 * 1024 * 1024,
            block_size_bytes: 1024 * 1024,
        }
    }
}
