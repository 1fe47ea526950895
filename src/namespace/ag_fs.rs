//! `AG_fs`: the namespace map itself (§3, §4.5).
//!
//! Holds one [`MapInfo`] per path behind its own lock, distinct from the
//! `state`-level lock that decides *which* `AgFs` instance is currently
//! live (§5 locking discipline: `state -> fs -> config`, and `AG_fs`'s own
//! lock is always the innermost one held).

use super::map_info::{EntryType, MapInfo};
use crate::clock::Clock;
use crate::error::{AgError, AgResult};
use crate::ms::MsClient;
use parking_lot::RwLock;
use std::collections::HashMap;

pub struct AgFs {
    pub volume_id: u64,
    inner: RwLock<HashMap<String, MapInfo>>,
}

fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Every path from the root down to (and including) `path`, root first.
fn ancestor_chain(path: &str) -> Vec<String> {
    if path == "/" {
        return vec!["/".to_string()];
    }
    let mut out = vec!["/".to_string()];
    let mut acc = String::new();
    for seg in path.trim_start_matches('/').split('/') {
        acc.push('/');
        acc.push_str(seg);
        out.push(acc.clone());
    }
    out
}

/// Ancestor and root invariants (§3): `"/"` is always present and a `Dir`;
/// every other path's immediate parent is present and a `Dir` (which, by
/// induction over every path in the map, implies every proper prefix is).
pub fn validate_map_info(map: &HashMap<String, MapInfo>) -> AgResult<()> {
    match map.get("/") {
        Some(root) if root.entry_type == EntryType::Dir => {}
        Some(_) => return Err(AgError::NotDirectory("/".to_string())),
        None => return Err(AgError::AncestorInvariant("/".to_string())),
    }
    for path in map.keys() {
        if path == "/" {
            continue;
        }
        let parent = parent_path(path).ok_or_else(|| AgError::AncestorInvariant(path.clone()))?;
        match map.get(&parent) {
            Some(info) if info.entry_type == EntryType::Dir => {}
            Some(_) => return Err(AgError::NotDirectory(parent)),
            None => return Err(AgError::AncestorInvariant(parent)),
        }
    }
    Ok(())
}

impl AgFs {
    pub fn new(volume_id: u64, coordinator_id: u64) -> Self {
        let mut map = HashMap::new();
        map.insert("/".to_string(), MapInfo::new_dir(coordinator_id));
        AgFs { volume_id, inner: RwLock::new(map) }
    }

    pub fn from_map(volume_id: u64, map: HashMap<String, MapInfo>) -> AgResult<Self> {
        validate_map_info(&map)?;
        Ok(AgFs { volume_id, inner: RwLock::new(map) })
    }

    pub fn get(&self, path: &str) -> Option<MapInfo> {
        self.inner.read().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_paths(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> HashMap<String, MapInfo> {
        self.inner.read().clone()
    }

    pub fn insert(&self, path: String, info: MapInfo) {
        self.inner.write().insert(path, info);
    }

    pub fn remove(&self, path: &str) -> Option<MapInfo> {
        self.inner.write().remove(path)
    }

    pub fn replace_all(&self, map: HashMap<String, MapInfo>) -> AgResult<()> {
        validate_map_info(&map)?;
        *self.inner.write() = map;
        Ok(())
    }

    /// Mutates a single entry's coherence/freshness fields in place under
    /// the write lock, without touching anything else in the map.
    pub fn with_entry_mut<F: FnOnce(&mut MapInfo)>(&self, path: &str, f: F) -> bool {
        let mut map = self.inner.write();
        match map.get_mut(path) {
            Some(info) => {
                f(info);
                true
            }
            None => false,
        }
    }

    /// `refresh_path_metadata` (§4.5): brings `path` and any stale ancestor
    /// of `path` up to date with the MS in a single batched round trip.
    /// Already-fresh ancestors are left untouched; paths the MS reports as
    /// deleted have their cached metadata invalidated but are not removed
    /// (removal is the reconciler's and reload loop's job, not a read
    /// path's). No entries are added to the map here (`merge_new=false`):
    /// a path the MS doesn't recognize at all is reported as an error.
    pub fn refresh_path_metadata(
        &self,
        ms: &dyn MsClient,
        clock: &dyn Clock,
        path: &str,
    ) -> AgResult<()> {
        let now = clock.now_secs();
        let work_paths: Vec<String> = {
            let map = self.inner.read();
            let mut stale = Vec::new();
            for p in ancestor_chain(path) {
                match map.get(&p) {
                    Some(info) if info.is_fresh(now) => continue,
                    Some(_) => stale.push(p),
                    None => return Err(AgError::NotFound(p)),
                }
            }
            stale
        };

        if work_paths.is_empty() {
            return Ok(());
        }

        let results = ms.path_download(self.volume_id, &work_paths)?;
        if results.len() != work_paths.len() {
            return Err(AgError::Ms("path_download returned a mismatched result count".to_string()));
        }

        let mut map = self.inner.write();
        for (p, result) in work_paths.into_iter().zip(results.into_iter()) {
            let Some(info) = map.get_mut(&p) else { continue };
            match result {
                Some(entry) => {
                    info.make_coherent_with_ms_data(
                        entry.file_id,
                        entry.file_version,
                        entry.write_nonce,
                        entry.num_children,
                        entry.generation,
                        entry.capacity,
                    );
                }
                None => info.invalidate_cached_metadata(),
            }
        }
        Ok(())
    }

    /// `download_MS_fs_map` (§4.5): frontier BFS from the root, folding the
    /// MS's view of each directory's children into `base` (the
    /// specfile-derived namespace skeleton). A child the MS reports that
    /// `base` doesn't already contain is inserted only if
    /// `new_child_template` recognizes the name (`merge_new=true` against
    /// the specfile's authority over namespace shape, e.g. a directory's
    /// wildcard `Query` entry) — otherwise it's a path the specfile never
    /// named and is silently skipped.
    pub fn download_ms_fs_map(
        volume_id: u64,
        base: &HashMap<String, MapInfo>,
        ms: &dyn MsClient,
        new_child_template: &dyn Fn(&str, EntryType) -> Option<MapInfo>,
    ) -> AgResult<HashMap<String, MapInfo>> {
        let mut out = base.clone();
        let mut frontier = vec!["/".to_string()];

        while let Some(dir) = frontier.pop() {
            match out.get(&dir) {
                Some(info) if info.entry_type == EntryType::Dir => {}
                _ => continue,
            }
            let children = ms.listdir(volume_id, &dir)?;
            for child in children {
                let child_path = join(&dir, &child.name);
                let is_new = !out.contains_key(&child_path);
                if is_new {
                    let Some(mut template) = new_child_template(&child_path, child.entry_type) else {
                        continue;
                    };
                    template.make_coherent_with_ms_data(
                        child.file_id,
                        child.file_version,
                        child.write_nonce,
                        child.num_children,
                        child.generation,
                        child.capacity,
                    );
                    let entry_type = template.entry_type;
                    out.insert(child_path.clone(), template);
                    if entry_type == EntryType::Dir {
                        frontier.push(child_path);
                    }
                } else if let Some(info) = out.get_mut(&child_path) {
                    info.make_coherent_with_ms_data(
                        child.file_id,
                        child.file_version,
                        child.write_nonce,
                        child.num_children,
                        child.generation,
                        child.capacity,
                    );
                    if info.entry_type == EntryType::Dir {
                        frontier.push(child_path);
                    }
                }
            }
        }

        validate_map_info(&out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::ms::fake::FakeMs;

    fn dir_template(_path: &str, entry_type: EntryType) -> Option<MapInfo> {
        let mut info = MapInfo::new_dir(1);
        info.entry_type = entry_type;
        info.driver = "passthrough".to_string();
        Some(info)
    }

    #[test]
    fn ancestor_chain_is_root_first() {
        assert_eq!(ancestor_chain("/a/b"), vec!["/".to_string(), "/a".to_string(), "/a/b".to_string()]);
        assert_eq!(ancestor_chain("/"), vec!["/".to_string()]);
    }

    #[test]
    fn validate_rejects_missing_ancestor() {
        let mut map = HashMap::new();
        map.insert("/".to_string(), MapInfo::new_dir(1));
        map.insert("/a/b".to_string(), MapInfo::new_dir(1));
        assert!(validate_map_info(&map).is_err());
    }

    #[test]
    fn validate_rejects_non_dir_ancestor() {
        let mut map = HashMap::new();
        map.insert("/".to_string(), MapInfo::new_dir(1));
        let mut file = MapInfo::new_dir(1);
        file.entry_type = EntryType::File;
        map.insert("/a".to_string(), file);
        map.insert("/a/b".to_string(), MapInfo::new_dir(1));
        assert!(validate_map_info(&map).is_err());
    }

    #[test]
    fn refresh_path_metadata_skips_fresh_ancestors() {
        let ms = FakeMs::new(1);
        ms.insert("/a", EntryType::Dir);
        let clock = FakeClock::new();
        let fs = AgFs::new(1, 1);
        fs.insert("/a".to_string(), MapInfo::new_dir(1));

        fs.refresh_path_metadata(&ms, &*clock, "/a").unwrap();
        let info = fs.get("/a").unwrap();
        assert!(info.cache_valid);

        // second call with nothing expired should be a no-op (no panics,
        // no MS round trip needed) — verified indirectly via freshness.
        clock.advance(1.0);
        fs.refresh_path_metadata(&ms, &*clock, "/a").unwrap();
    }

    #[test]
    fn refresh_path_metadata_reports_ms_deletion() {
        let ms = FakeMs::new(1);
        let clock = FakeClock::new();
        let fs = AgFs::new(1, 1);
        let mut info = MapInfo::new_dir(1);
        info.refresh_deadline = -1.0; // force stale
        fs.insert("/gone".to_string(), info);

        fs.refresh_path_metadata(&ms, &*clock, "/gone").unwrap();
        let after = fs.get("/gone").unwrap();
        assert!(!after.cache_valid);
    }

    #[test]
    fn download_ms_fs_map_discovers_new_children() {
        let ms = FakeMs::new(1);
        ms.insert("/a", EntryType::Dir);
        ms.insert("/a/b", EntryType::File);

        let mut base = HashMap::new();
        base.insert("/".to_string(), MapInfo::new_dir(1));

        let out = AgFs::download_ms_fs_map(1, &base, &ms, &dir_template).unwrap();
        assert!(out.contains_key("/a"));
        assert!(out.contains_key("/a/b"));
        assert!(out["/a/b"].cache_valid);
    }

    #[test]
    fn download_ms_fs_map_skips_names_the_template_rejects() {
        let ms = FakeMs::new(1);
        ms.insert("/secret", EntryType::File);
        let mut base = HashMap::new();
        base.insert("/".to_string(), MapInfo::new_dir(1));

        let out = AgFs::download_ms_fs_map(1, &base, &ms, &|_, _| None).unwrap();
        assert!(!out.contains_key("/secret"));
    }
}
