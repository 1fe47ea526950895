//! Top-level gateway state (§5 locking discipline: `state -> fs -> config`,
//! with `AG_fs`'s own internal lock always innermost and never held across
//! network or driver I/O).

use crate::cache::Cache;
use crate::certs::CertStore;
use crate::clock::Clock;
use crate::codec::SigningIdentity;
use crate::config::Config;
use crate::drivers::Supervisor;
use crate::ms::MsClient;
use crate::namespace::AgFs;
use crate::reversion::Reversioner;
use parking_lot::RwLock;
use std::sync::Arc;

/// The gateway's run state, replacing a plain "is this referenceable"
/// boolean with an explicit small state machine (§9 design note): a
/// request arriving mid-`Draining` should see `AgError::TryAgain`, not a
/// use-after-shutdown panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Draining,
    Stopped,
}

pub struct State {
    pub volume_id: u64,
    pub gateway_id: u64,

    run_state: RwLock<RunState>,
    fs: RwLock<Arc<AgFs>>,
    config: RwLock<Config>,

    pub cache: Cache,
    pub drivers: Supervisor,
    pub certs: Arc<dyn CertStore>,
    pub ms: Arc<dyn MsClient>,
    pub clock: Arc<dyn Clock>,
    pub reversioner: Reversioner,
    pub signing_identity: SigningIdentity,
}

impl State {
    pub fn new(
        volume_id: u64,
        gateway_id: u64,
        initial_fs: AgFs,
        cache: Cache,
        drivers: Supervisor,
        certs: Arc<dyn CertStore>,
        ms: Arc<dyn MsClient>,
        clock: Arc<dyn Clock>,
        signing_identity: SigningIdentity,
        config: Config,
    ) -> Self {
        State {
            volume_id,
            gateway_id,
            run_state: RwLock::new(RunState::Starting),
            fs: RwLock::new(Arc::new(initial_fs)),
            config: RwLock::new(config),
            cache,
            drivers,
            certs,
            ms,
            clock,
            reversioner: Reversioner::new(),
            signing_identity,
        }
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.read()
    }

    pub fn set_run_state(&self, s: RunState) {
        *self.run_state.write() = s;
    }

    /// A handler-facing precondition: refuse new work once draining or
    /// stopped, per `RunState` (§9).
    pub fn check_servicing(&self) -> crate::error::AgResult<()> {
        match self.run_state() {
            RunState::Running => Ok(()),
            RunState::Starting | RunState::Draining | RunState::Stopped => {
                Err(crate::error::AgError::TryAgain)
            }
        }
    }

    pub fn fs(&self) -> Arc<AgFs> {
        self.fs.read().clone()
    }

    /// Atomically swaps in a new `AgFs`, the only place the `fs` lock is
    /// ever held for a write (§4.8 specfile reload).
    pub fn swap_fs(&self, new_fs: AgFs) {
        *self.fs.write() = Arc::new(new_fs);
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn swap_config(&self, new_config: Config) {
        *self.config.write() = new_config;
    }
}
