//! CLI flags (§6) and the hot-swappable specfile `<Config>` map (§3).

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

/// `string -> string` map extracted from the specfile's `<Config>` block,
/// hot-swapped atomically with the namespace on reload.
pub type Config = HashMap<String, String>;

/// CLI flags, per §6.
#[derive(Parser, Debug, Clone)]
#[command(name = "agd", about = "Acquisition Gateway daemon")]
pub struct AgArgs {
    /// This volume's identifier, as known to the MS.
    #[arg(short = 'v', long = "volume-id")]
    pub volume_id: u64,

    /// This gateway's identifier, used to sign served blocks and manifests.
    #[arg(short = 'g', long = "gateway-id")]
    pub gateway_id: u64,

    /// `host:port` to bind the HTTP server to.
    #[arg(long = "http", default_value = "0.0.0.0:8080")]
    pub http_addr: String,

    /// Worker threads servicing the HTTP socket.
    #[arg(long = "http-threads", default_value_t = 8)]
    pub http_threads: usize,

    /// PKCS#8 DER file holding this gateway's P-256 signing key; a fresh
    /// key is generated in memory if absent (fine for a single test run,
    /// not for a gateway other gateways need to keep trusting across restarts).
    #[arg(long = "signing-key", value_name = "PATH")]
    pub signing_key: Option<PathBuf>,

    /// UNIX socket path for control events.
    #[arg(short = 'e', long = "events", value_name = "PATH")]
    pub events_socket: PathBuf,

    /// Log file directory.
    #[arg(short = 'i', long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Directory containing driver executables.
    #[arg(short = 'D', long = "driver-dir", value_name = "DIR")]
    pub driver_dir: Option<PathBuf>,

    /// JSON file mapping specfile driver names to exec paths/argv/env/pool
    /// size; every driver name the namespace references must appear here
    /// or dispatch to it fails with `NoSuchDriver`.
    #[arg(long = "driver-registry", value_name = "PATH")]
    pub driver_registry: Option<PathBuf>,

    /// On-disk specfile override; if absent, fetched from the MS bundle.
    #[arg(short = 's', long = "specfile", value_name = "PATH")]
    pub specfile: Option<PathBuf>,

    /// Queue every entry for reversion at startup.
    #[arg(short = 'n', long = "reversion-at-startup")]
    pub reversion_at_startup: bool,

    /// Cache soft limit in bytes.
    #[arg(short = 'l', long = "cache-soft-limit", value_name = "BYTES")]
    pub cache_soft_limit: Option<u64>,

    /// Cache hard limit in bytes.
    #[arg(short = 'L', long = "cache-hard-limit", value_name = "BYTES")]
    pub cache_hard_limit: Option<u64>,

    /// Persisted MS-metadata cache file (§6, §11.1).
    #[arg(long = "metadata-cache", value_name = "PATH")]
    pub metadata_cache: Option<PathBuf>,
}

impl AgArgs {
    pub fn parse_args() -> Self {
        AgArgs::parse()
    }
}

/// Exit codes, per §6: 0 on clean shutdown, 1 on initialization failure.
pub mod exit_code {
    pub const CLEAN_SHUTDOWN: i32 = 0;
    pub const INIT_FAILURE: i32 = 1;
}
