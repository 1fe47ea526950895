//! In-memory `MsClient` for the §8 end-to-end scenarios and unit tests.

use super::{MsClient, MsDirEntry, MsPathResult, MsPublish};
use crate::error::{AgError, AgResult};
use crate::namespace::map_info::EntryType;
use p256::ecdsa::{SigningKey, VerifyingKey};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Clone)]
struct Node {
    entry_type: EntryType,
    file_id: u64,
    file_version: i64,
    write_nonce: u64,
    num_children: u64,
    generation: u64,
    capacity: u64,
}

/// A hand-built, in-process stand-in for the Metadata Server. Paths are
/// keyed by full `HTTP`-style path string (`"/"`, `"/a"`, `"/a/b"`, ...).
pub struct FakeMs {
    volume_id: u64,
    nodes: Mutex<HashMap<String, Node>>,
    specfile_bundle: Mutex<Vec<u8>>,
    gateway_keys: Mutex<HashMap<u64, VerifyingKey>>,
    next_file_id: Mutex<u64>,
}

impl FakeMs {
    pub fn new(volume_id: u64) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                entry_type: EntryType::Dir,
                file_id: 0,
                file_version: 0,
                write_nonce: 0,
                num_children: 0,
                generation: 0,
                capacity: 0,
            },
        );
        FakeMs {
            volume_id,
            nodes: Mutex::new(nodes),
            specfile_bundle: Mutex::new(Vec::new()),
            gateway_keys: Mutex::new(HashMap::new()),
            next_file_id: Mutex::new(1),
        }
    }

    pub fn set_specfile_bundle(&self, bytes: Vec<u8>) {
        *self.specfile_bundle.lock() = bytes;
    }

    pub fn install_gateway_key(&self, gateway_id: u64, key: &SigningKey) {
        self.gateway_keys.lock().insert(gateway_id, key.verifying_key().clone());
    }

    pub fn insert(&self, path: &str, entry_type: EntryType) -> u64 {
        let mut nodes = self.nodes.lock();
        let mut next_id = self.next_file_id.lock();
        let file_id = *next_id;
        *next_id += 1;
        nodes.insert(
            path.to_string(),
            Node {
                entry_type,
                file_id,
                file_version: 1,
                write_nonce: 1,
                num_children: 0,
                generation: 1,
                capacity: 0,
            },
        );
        if let Some(parent) = parent_path(path) {
            if let Some(p) = nodes.get_mut(&parent) {
                p.num_children += 1;
                p.write_nonce += 1;
            }
        }
        file_id
    }

    pub fn remove(&self, path: &str) {
        let mut nodes = self.nodes.lock();
        nodes.remove(path);
        if let Some(parent) = parent_path(path) {
            if let Some(p) = nodes.get_mut(&parent) {
                p.num_children = p.num_children.saturating_sub(1);
                p.write_nonce += 1;
            }
        }
    }

    pub fn bump_version(&self, path: &str) {
        if let Some(n) = self.nodes.lock().get_mut(path) {
            n.file_version += 1;
            n.write_nonce += 1;
        }
    }
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

fn child_name(path: &str) -> String {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string()
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

impl MsClient for FakeMs {
    fn listdir(&self, volume_id: u64, path: &str) -> AgResult<Vec<MsDirEntry>> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound(path.to_string()));
        }
        let nodes = self.nodes.lock();
        if !nodes.contains_key(path) {
            return Err(AgError::NotFound(path.to_string()));
        }
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        let mut out = Vec::new();
        for (candidate, node) in nodes.iter() {
            if candidate == path {
                continue;
            }
            let Some(rest) = candidate.strip_prefix(&prefix) else { continue };
            if rest.contains('/') {
                continue;
            }
            out.push(MsDirEntry {
                name: child_name(candidate),
                entry_type: node.entry_type,
                file_id: node.file_id,
                file_version: node.file_version,
                write_nonce: node.write_nonce,
                num_children: node.num_children,
                generation: node.generation,
                capacity: node.capacity,
            });
        }
        Ok(out)
    }

    fn path_download(&self, volume_id: u64, paths: &[String]) -> AgResult<Vec<MsPathResult>> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound("volume mismatch".to_string()));
        }
        let nodes = self.nodes.lock();
        Ok(paths
            .iter()
            .map(|p| {
                nodes.get(p).map(|n| MsDirEntry {
                    name: child_name(p),
                    entry_type: n.entry_type,
                    file_id: n.file_id,
                    file_version: n.file_version,
                    write_nonce: n.write_nonce,
                    num_children: n.num_children,
                    generation: n.generation,
                    capacity: n.capacity,
                })
            })
            .collect())
    }

    fn create_all(&self, volume_id: u64, entries: &[MsPublish]) -> AgResult<()> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound("volume mismatch".to_string()));
        }
        let mut nodes = self.nodes.lock();
        for e in entries {
            nodes.insert(
                e.path.clone(),
                Node {
                    entry_type: e.entry_type,
                    file_id: e.file_id,
                    file_version: e.file_version,
                    write_nonce: e.write_nonce,
                    num_children: e.num_children,
                    generation: e.generation,
                    capacity: e.capacity,
                },
            );
        }
        Ok(())
    }

    fn update_all(&self, volume_id: u64, entries: &[MsPublish]) -> AgResult<()> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound("volume mismatch".to_string()));
        }
        let mut nodes = self.nodes.lock();
        for e in entries {
            if let Some(n) = nodes.get_mut(&e.path) {
                n.entry_type = e.entry_type;
                n.file_version = e.file_version;
                n.write_nonce = e.write_nonce;
                n.num_children = e.num_children;
                n.generation = e.generation;
                n.capacity = e.capacity;
            }
        }
        Ok(())
    }

    fn delete_all(&self, volume_id: u64, paths: &[String]) -> AgResult<()> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound("volume mismatch".to_string()));
        }
        let mut nodes = self.nodes.lock();
        for p in paths {
            nodes.remove(p);
        }
        Ok(())
    }

    fn fetch_specfile_bundle(&self, volume_id: u64) -> AgResult<Vec<u8>> {
        if volume_id != self.volume_id {
            return Err(AgError::NotFound("volume mismatch".to_string()));
        }
        Ok(self.specfile_bundle.lock().clone())
    }

    fn fetch_cert(&self, gateway_id: u64) -> AgResult<VerifyingKey> {
        self.gateway_keys
            .lock()
            .get(&gateway_id)
            .cloned()
            .ok_or_else(|| AgError::CertUnknown(gateway_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listdir_finds_direct_children_only() {
        let ms = FakeMs::new(1);
        ms.insert("/a", EntryType::Dir);
        ms.insert("/a/b", EntryType::File);
        ms.insert("/a/b/c", EntryType::File);

        let root_children = ms.listdir(1, "/").unwrap();
        assert_eq!(root_children.len(), 1);
        assert_eq!(root_children[0].name, "a");

        let a_children = ms.listdir(1, "/a").unwrap();
        assert_eq!(a_children.len(), 1);
        assert_eq!(a_children[0].name, "b");
    }

    #[test]
    fn path_download_reports_missing_as_none() {
        let ms = FakeMs::new(1);
        ms.insert("/a", EntryType::Dir);
        let results = ms.path_download(1, &["/a".to_string(), "/missing".to_string()]).unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }
}
