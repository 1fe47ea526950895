//! Reversioner (§4.7, §11.2): the deadline-priority queue that bumps a
//! path's `block_version`, invalidates its cached blocks, and notifies the
//! owning driver whenever the AG decides a path's data must be
//! re-fetched — whether because a revalidation deadline passed, the MS
//! pushed new `PubInfo`, or `-n` asked for a full reversion at startup.

use crate::cache::Cache;
use crate::drivers::Supervisor;
use crate::error::AgResult;
use crate::namespace::AgFs;
use crate::wire::{DriverRequest, DriverRequestType, PubInfo};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct PendingReversion {
    deadline: f64,
    path: String,
    query_type: String,
    pubinfo: Option<PubInfo>,
}

impl PartialEq for PendingReversion {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.path == other.path
    }
}
impl Eq for PendingReversion {}

impl PartialOrd for PendingReversion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Earliest deadline first; a `BinaryHeap` is a max-heap, so ordering is
/// reversed, with path as a deterministic tiebreaker (§9 open question:
/// ties broken by path, not insertion order).
impl Ord for PendingReversion {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .partial_cmp(&self.deadline)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.path.cmp(&self.path))
    }
}

pub struct Reversioner {
    queue: Mutex<BinaryHeap<PendingReversion>>,
}

impl Default for Reversioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Reversioner {
    pub fn new() -> Self {
        Reversioner { queue: Mutex::new(BinaryHeap::new()) }
    }

    pub fn push(&self, path: String, query_type: String, deadline: f64, pubinfo: Option<PubInfo>) {
        self.queue.lock().push(PendingReversion { deadline, path, query_type, pubinfo });
    }

    /// Adds every path in `all` to the queue with deadline `0.0` (reverted
    /// immediately): called at boot when `-n` is given, and after every
    /// successful specfile reload (§11.2).
    pub fn add_map_infos<'a, I>(&self, all: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (path, query_type) in all {
            self.push(path.to_string(), query_type.to_string(), 0.0, None);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops and runs every entry whose deadline has passed as of `now`,
    /// draining the heap under the lock only long enough to collect the
    /// due work, then running reversions without holding it (§5: no
    /// network/driver I/O under an internal lock).
    pub fn drain_due(
        &self,
        now: f64,
        fs: &AgFs,
        cache: &Cache,
        drivers: &Supervisor,
    ) -> AgResult<usize> {
        let due = {
            let mut queue = self.queue.lock();
            let mut due = Vec::new();
            while let Some(top) = queue.peek() {
                if top.deadline > now {
                    break;
                }
                due.push(queue.pop().unwrap());
            }
            due
        };

        let n = due.len();
        for item in due {
            revert_path(fs, cache, drivers, now, &item.path, &item.query_type, item.pubinfo)?;
        }
        Ok(n)
    }
}

/// `AG_fs_reversion` (§4.7): bumps `block_version`, resets
/// `refresh_deadline = now + reval_sec`, evicts every cached block for the
/// path, and tells the owning driver to drop any state it's holding for
/// the old version. A path no longer in the namespace is silently dropped
/// — the specfile reload that removed it already reconciled the MS.
fn revert_path(
    fs: &AgFs,
    cache: &Cache,
    drivers: &Supervisor,
    now: f64,
    path: &str,
    query_type: &str,
    pubinfo: Option<PubInfo>,
) -> AgResult<()> {
    let Some(info) = fs.get(path) else { return Ok(()) };

    let new_block_version = info.block_version + 1;
    let new_deadline = now + info.reval_sec as f64;
    fs.with_entry_mut(path, |entry| {
        entry.make_coherent_with_ag_data(new_block_version, new_deadline);
        if let Some(pi) = pubinfo {
            entry.driver_cache = Some(pi);
        }
    });

    cache.evict_file(info.file_id, info.file_version);

    let req = DriverRequest {
        request_type: DriverRequestType::Reversion,
        file_id: info.file_id,
        file_version: info.file_version,
        block_id: 0,
        block_version: new_block_version,
        manifest_mtime_sec: 0,
        manifest_mtime_nsec: 0,
        path: path.to_string(),
        query_string: info.query_string.clone(),
        io_hint_sequential: false,
    };
    // A driver that never implements reversion notification (handshake
    // returned "unimplemented") is not an error here; `dispatch` already
    // folds that into a best-effort no-op reply at the worker layer.
    let _ = drivers.dispatch(query_type, &req);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_due_only_takes_expired_entries() {
        let r = Reversioner::new();
        r.push("/a".to_string(), "q".to_string(), 10.0, None);
        r.push("/b".to_string(), "q".to_string(), 5.0, None);

        let due = {
            let mut q = r.queue.lock();
            let mut out = Vec::new();
            while let Some(top) = q.peek() {
                if top.deadline > 6.0 {
                    break;
                }
                out.push(q.pop().unwrap().path);
            }
            out
        };
        assert_eq!(due, vec!["/b".to_string()]);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn ties_break_on_path() {
        let r = Reversioner::new();
        r.push("/z".to_string(), "q".to_string(), 1.0, None);
        r.push("/a".to_string(), "q".to_string(), 1.0, None);
        let first = r.queue.lock().peek().unwrap().path.clone();
        assert_eq!(first, "/a");
    }
}
