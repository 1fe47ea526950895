//! Driver process supervision (§4.2): one proc-group (pool) per
//! query-type, fixed `num_instances`, reload-in-place, ordered shutdown.

pub mod registry;
mod semaphore;
mod worker;

pub use registry::{sync_groups, DriverRegistry};
pub use semaphore::Semaphore;
pub use worker::{HandshakeOutcome, Worker};

use crate::error::AgError;
use crate::wire::DriverReply;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Static identity of a driver: where it lives and how it's invoked.
#[derive(Debug, Clone)]
pub struct DriverSpec {
    pub query_type: String,
    pub exec_path: PathBuf,
    pub argv_role: String,
    pub env: Vec<(String, String)>,
    pub num_instances: usize,
}

/// One pool of worker processes for a single query-type.
pub struct ProcGroup {
    spec: RwLock<DriverSpec>,
    freelist: Mutex<VecDeque<Worker>>,
    roster_size: Mutex<usize>,
    sem: Semaphore,
}

impl ProcGroup {
    fn new(spec: DriverSpec) -> Self {
        ProcGroup {
            freelist: Mutex::new(VecDeque::new()),
            sem: Semaphore::new(0),
            roster_size: Mutex::new(0),
            spec: RwLock::new(spec),
        }
    }

    fn spawn_into(
        &self,
        sandbox_path: Option<&Path>,
        config: &[u8],
        secrets: &[u8],
        driver_code: &[u8],
    ) -> Result<(), AgError> {
        let spec = self.spec.read().clone();
        for _ in 0..spec.num_instances {
            let (worker, _outcome) = Worker::spawn(
                sandbox_path,
                &spec.exec_path,
                &spec.argv_role,
                &spec.env,
                config,
                secrets,
                driver_code,
            )?;
            self.freelist.lock().push_back(worker);
            *self.roster_size.lock() += 1;
            self.sem.post();
        }
        Ok(())
    }

    /// Reaps any workers that have died since they were last checked, then
    /// removes the head of the freelist, blocking on the semaphore if it
    /// is empty (§4.2).
    pub fn acquire(&self) -> Worker {
        loop {
            self.sem.acquire();
            let mut list = self.freelist.lock();
            if let Some(mut w) = list.pop_front() {
                if w.is_dead() {
                    w.reap_if_dead(Duration::from_millis(200));
                    *self.roster_size.lock() -= 1;
                    continue;
                }
                return w;
            }
            // Semaphore accounting said a worker was available but the
            // freelist raced empty; loop and re-acquire.
        }
    }

    /// Returns a worker to the freelist if it is still alive; otherwise
    /// discards it and shrinks the roster (§4.2).
    pub fn release(&self, mut worker: Worker) {
        if worker.is_dead() {
            worker.reap_if_dead(Duration::from_millis(200));
            *self.roster_size.lock() -= 1;
            return;
        }
        self.freelist.lock().push_back(worker);
        self.sem.post();
    }

    /// Per-slot-serial reload: for each current slot, spawn a fresh
    /// worker, swap it into the freelist, then gracefully stop the old one
    /// (§4.2). Total pool concurrency never drops to zero when possible.
    pub fn reload(
        &self,
        sandbox_path: Option<&Path>,
        new_spec: DriverSpec,
        config: &[u8],
        secrets: &[u8],
        driver_code: &[u8],
    ) -> Result<(), AgError> {
        let n = new_spec.num_instances;
        *self.spec.write() = new_spec.clone();
        for _ in 0..n {
            let (fresh, _outcome) = Worker::spawn(
                sandbox_path,
                &new_spec.exec_path,
                &new_spec.argv_role,
                &new_spec.env,
                config,
                secrets,
                driver_code,
            )?;
            self.freelist.lock().push_back(fresh);
            self.sem.post();
            *self.roster_size.lock() += 1;

            // Retire one old worker, if any remain beyond the ones we just added.
            let old = {
                let mut list = self.freelist.lock();
                if list.len() > n {
                    self.sem.acquire();
                    list.pop_front()
                } else {
                    None
                }
            };
            if let Some(mut old_worker) = old {
                old_worker.stop(Duration::from_secs(1));
                *self.roster_size.lock() -= 1;
            }
        }
        Ok(())
    }

    /// `SIGINT` every worker, sleep one second, then `SIGKILL` survivors
    /// and `waitpid` them all (§4.2 shutdown).
    pub fn shutdown(&self) {
        let mut list = self.freelist.lock();
        for worker in list.iter_mut() {
            worker.stop(Duration::from_secs(1));
        }
        list.clear();
        *self.roster_size.lock() = 0;
    }

    pub fn snapshot(&self) -> ProcGroupSnapshot {
        ProcGroupSnapshot {
            query_type: self.spec.read().query_type.clone(),
            idle: self.freelist.lock().len(),
            roster_size: *self.roster_size.lock(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcGroupSnapshot {
    pub query_type: String,
    pub idle: usize,
    pub roster_size: usize,
}

/// Hosts one proc-group per distinct query-type.
pub struct Supervisor {
    sandbox_path: Option<PathBuf>,
    groups: RwLock<HashMap<String, Arc<ProcGroup>>>,
}

impl Supervisor {
    pub fn new(sandbox_path: Option<PathBuf>) -> Self {
        Supervisor { sandbox_path, groups: RwLock::new(HashMap::new()) }
    }

    pub fn start_group(
        &self,
        spec: DriverSpec,
        config: &[u8],
        secrets: &[u8],
        driver_code: &[u8],
    ) -> Result<(), AgError> {
        let group = Arc::new(ProcGroup::new(spec.clone()));
        group.spawn_into(self.sandbox_path.as_deref(), config, secrets, driver_code)?;
        self.groups.write().insert(spec.query_type.clone(), group);
        Ok(())
    }

    pub fn group(&self, query_type: &str) -> Option<Arc<ProcGroup>> {
        self.groups.read().get(query_type).cloned()
    }

    /// Acquires a worker, sends one request, and releases the worker
    /// regardless of outcome (§4.1, §4.9 block/manifest handlers).
    pub fn dispatch(
        &self,
        query_type: &str,
        req: &crate::wire::DriverRequest,
    ) -> Result<DriverReply, AgError> {
        let group = self.group(query_type).ok_or_else(|| AgError::NoSuchDriver(query_type.to_string()))?;
        let mut worker = group.acquire();
        let result = worker.request(req);
        group.release(worker);
        result
    }

    pub fn reload_group(
        &self,
        spec: DriverSpec,
        config: &[u8],
        secrets: &[u8],
        driver_code: &[u8],
    ) -> Result<(), AgError> {
        let existing = self.groups.read().get(&spec.query_type).cloned();
        match existing {
            Some(group) => {
                group.reload(self.sandbox_path.as_deref(), spec, config, secrets, driver_code)
            }
            None => self.start_group(spec, config, secrets, driver_code),
        }
    }

    pub fn shutdown_all(&self) {
        for group in self.groups.read().values() {
            group.shutdown();
        }
    }

    pub fn snapshot(&self) -> Vec<ProcGroupSnapshot> {
        self.groups.read().values().map(|g| g.snapshot()).collect()
    }
}
