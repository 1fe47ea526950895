//! Shared end-to-end harness (§8): wires a full `State` around `FakeMs`,
//! an in-memory cache and cert store, and a `Supervisor` pool backed by
//! the `fake_driver` fixture binary, then drives the HTTP handlers
//! directly rather than through a bound `tiny_http::Server`.

use ag::cache::{Cache, CacheConfig, MemoryStore};
use ag::certs::{CertStore, InMemoryCertStore};
use ag::clock::{Clock, FakeClock};
use ag::codec::SigningIdentity;
use ag::drivers::{DriverSpec, Supervisor};
use ag::ms::fake::FakeMs;
use ag::namespace::{AgFs, EntryType, MapInfo};
use ag::state::{RunState, State};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use std::path::PathBuf;
use std::sync::Arc;

pub const VOLUME_ID: u64 = 1;
pub const GATEWAY_ID: u64 = 7;
pub const QUERY_TYPE: &str = "fixture";

pub struct Harness {
    pub state: Arc<State>,
    pub ms: Arc<FakeMs>,
    pub clock: Arc<FakeClock>,
    pub certs: Arc<InMemoryCertStore>,
}

impl Harness {
    /// Boots a `State` with no namespace entries beyond the root. Callers
    /// populate `state.fs()` and `ms` directly for their scenario.
    pub fn new() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key().clone();
        let identity = SigningIdentity { gateway_id: GATEWAY_ID, key: signing_key };

        let ms = Arc::new(FakeMs::new(VOLUME_ID));
        let certs = Arc::new(InMemoryCertStore::new(8));
        certs.install(GATEWAY_ID, verifying_key);
        let clock = FakeClock::new();

        let cache_config = CacheConfig { block_size_bytes: 1024, ..CacheConfig::default() };
        let cache = Cache::new(Arc::new(MemoryStore::new()), cache_config);
        let drivers = Supervisor::new(None);
        let fs = AgFs::new(VOLUME_ID, GATEWAY_ID);

        let state = Arc::new(State::new(
            VOLUME_ID,
            GATEWAY_ID,
            fs,
            cache,
            drivers,
            certs.clone() as Arc<dyn ag::certs::CertStore>,
            ms.clone() as Arc<dyn ag::ms::MsClient>,
            clock.clone() as Arc<dyn ag::clock::Clock>,
            identity,
            std::collections::HashMap::new(),
        ));

        state.set_run_state(RunState::Running);
        Harness { state, ms, clock, certs }
    }

    /// Starts one worker pool of the `fake_driver` fixture under
    /// [`QUERY_TYPE`], for scenarios that need a real driver round trip.
    pub fn start_fixture_driver(&self) {
        let spec = DriverSpec {
            query_type: QUERY_TYPE.to_string(),
            exec_path: PathBuf::from(env!("CARGO_BIN_EXE_fake_driver")),
            argv_role: "worker".to_string(),
            env: Vec::new(),
            num_instances: 1,
        };
        self.state.drivers.start_group(spec, b"{}", b"", b"").expect("fixture driver failed to boot");
    }

    /// Starts the fixture driver with its `Stat` reply reporting `size`
    /// bytes, for manifest scenarios that care about block count.
    pub fn start_fixture_driver_with_stat_size(&self, size: u64) {
        let spec = DriverSpec {
            query_type: QUERY_TYPE.to_string(),
            exec_path: PathBuf::from(env!("CARGO_BIN_EXE_fake_driver")),
            argv_role: "worker".to_string(),
            env: vec![("FAKE_DRIVER_SIZE".to_string(), size.to_string())],
            num_instances: 1,
        };
        self.state.drivers.start_group(spec, b"{}", b"", b"").expect("fixture driver failed to boot");
    }

    /// Starts a fixture pool whose workers die after serving `die_after`
    /// requests, for the worker-death scenario.
    pub fn start_dying_fixture_driver(&self, die_after: u64) {
        let spec = DriverSpec {
            query_type: QUERY_TYPE.to_string(),
            exec_path: PathBuf::from(env!("CARGO_BIN_EXE_fake_driver")),
            argv_role: "worker".to_string(),
            env: vec![("FAKE_DRIVER_DIE_AFTER".to_string(), die_after.to_string())],
            num_instances: 1,
        };
        self.state.drivers.start_group(spec, b"{}", b"", b"").expect("fixture driver failed to boot");
    }

    /// Inserts a ready-to-serve file entry into both the local `AgFs` and
    /// the `FakeMs`, so `refresh_path_metadata` sees them agree and treats
    /// the entry as fresh without a round trip (unless `stale` is set).
    /// Ancestor directories are created fresh in `AgFs` only, since the
    /// ancestor-chain walk in `refresh_path_metadata` never consults the MS
    /// for an already-fresh entry (§4.5 ancestor invariant).
    pub fn publish_file(&self, path: &str, stale: bool) -> (u64, i64) {
        self.ensure_ancestor_dirs(path);

        let file_id = self.ms.insert(path, EntryType::File);
        let now = self.clock.now_secs();

        let mut info = MapInfo::new_dir(GATEWAY_ID);
        info.entry_type = EntryType::File;
        info.driver = QUERY_TYPE.to_string();
        info.query_string = format!("path={path}");
        info.file_perm = 0o444;
        info.reval_sec = 3600;
        info.make_coherent_with_ms_data(file_id, 1, 1, 0, 1, 0);
        info.make_coherent_with_ag_data(1, if stale { now - 1.0 } else { now + 3600.0 });

        self.state.fs().insert(path.to_string(), info);
        (file_id, 1)
    }

    fn ensure_ancestor_dirs(&self, path: &str) {
        let fs = self.state.fs();
        let now = self.clock.now_secs();
        let mut acc = String::new();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        for seg in &segments[..segments.len() - 1] {
            acc.push('/');
            acc.push_str(seg);
            if fs.contains(&acc) {
                continue;
            }
            let mut info = MapInfo::new_dir(GATEWAY_ID);
            info.make_coherent_with_ag_data(0, now + 3600.0);
            fs.insert(acc.clone(), info);
        }
    }
}
