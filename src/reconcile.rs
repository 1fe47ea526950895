//! MS reconciler (§4.6): folds a freshly-parsed specfile's namespace shape
//! against the currently-published MS view, in three phases so that a
//! crash mid-reconcile never leaves an orphaned or half-published path.

use crate::ms::{MsClient, MsPublish};
use crate::namespace::{EntryType, MapInfo};
use crate::error::AgResult;
use std::collections::HashMap;

/// What changed between the old and new namespace shapes, computed once
/// up front so the three publish phases can run without re-diffing.
pub struct Diff {
    pub to_publish: Vec<String>,
    pub to_update: Vec<String>,
    pub to_delete: Vec<String>,
}

/// Two paths' specfile-visible attributes are equal for reconciliation
/// purposes iff this predicate says so. §4.6 uses a looser predicate at
/// boot (permissions/revalidation/type only — the MS hasn't seen a
/// `driver` or `query_string` before) and a stricter one on reload (everything
/// the specfile controls).
pub type EqualityPredicate = fn(&MapInfo, &MapInfo) -> bool;

pub fn boot_equal(old: &MapInfo, new: &MapInfo) -> bool {
    old.entry_type == new.entry_type && old.file_perm == new.file_perm && old.reval_sec == new.reval_sec
}

pub fn reload_equal(old: &MapInfo, new: &MapInfo) -> bool {
    boot_equal(old, new) && old.driver == new.driver && old.query_string == new.query_string
}

/// Diffs `old_fs` against `new_fs` under `equal`. A path present in both
/// maps but unequal under `equal` is an update; present only in `new_fs`
/// is a publish; present only in `old_fs` is a delete.
pub fn diff(
    old_fs: &HashMap<String, MapInfo>,
    new_fs: &HashMap<String, MapInfo>,
    equal: EqualityPredicate,
) -> Diff {
    let mut to_publish = Vec::new();
    let mut to_update = Vec::new();
    let mut to_delete = Vec::new();

    for (path, new_info) in new_fs {
        match old_fs.get(path) {
            None => to_publish.push(path.clone()),
            Some(old_info) if !equal(old_info, new_info) => to_update.push(path.clone()),
            Some(_) => {}
        }
    }
    for path in old_fs.keys() {
        if !new_fs.contains_key(path) {
            to_delete.push(path.clone());
        }
    }

    to_publish.sort();
    to_update.sort();
    to_delete.sort();
    Diff { to_publish, to_update, to_delete }
}

fn to_ms_publish(path: &str, info: &MapInfo) -> MsPublish {
    MsPublish {
        path: path.to_string(),
        entry_type: info.entry_type,
        file_id: info.file_id,
        file_version: info.file_version,
        write_nonce: info.write_nonce,
        num_children: info.num_children,
        generation: info.generation,
        capacity: info.capacity,
    }
}

/// Runs the three-phase transform against the MS: publish new paths,
/// then update changed ones, then delete removed ones (§4.6). Phase order
/// matters — deleting before publishing could, for a path that moved
/// rather than disappeared, briefly leave the MS with neither form of it.
pub fn reconcile(
    volume_id: u64,
    ms: &dyn MsClient,
    old_fs: &HashMap<String, MapInfo>,
    new_fs: &HashMap<String, MapInfo>,
    equal: EqualityPredicate,
) -> AgResult<Diff> {
    let d = diff(old_fs, new_fs, equal);

    if !d.to_publish.is_empty() {
        let entries: Vec<MsPublish> =
            d.to_publish.iter().map(|p| to_ms_publish(p, &new_fs[p])).collect();
        ms.create_all(volume_id, &entries)?;
    }
    if !d.to_update.is_empty() {
        let entries: Vec<MsPublish> =
            d.to_update.iter().map(|p| to_ms_publish(p, &new_fs[p])).collect();
        ms.update_all(volume_id, &entries)?;
    }
    if !d.to_delete.is_empty() {
        ms.delete_all(volume_id, &d.to_delete)?;
    }

    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ms::fake::FakeMs;

    fn dir(perm: u32) -> MapInfo {
        let mut m = MapInfo::new_dir(1);
        m.file_perm = perm;
        m
    }

    #[test]
    fn diff_classifies_publish_update_delete() {
        let mut old_fs = HashMap::new();
        old_fs.insert("/a".to_string(), dir(0o555));
        old_fs.insert("/b".to_string(), dir(0o555));

        let mut new_fs = HashMap::new();
        new_fs.insert("/a".to_string(), dir(0o555)); // unchanged
        new_fs.insert("/c".to_string(), dir(0o555)); // new
        // /b dropped

        let d = diff(&old_fs, &new_fs, boot_equal);
        assert_eq!(d.to_publish, vec!["/c".to_string()]);
        assert!(d.to_update.is_empty());
        assert_eq!(d.to_delete, vec!["/b".to_string()]);
    }

    #[test]
    fn reload_equal_is_stricter_than_boot_equal() {
        let mut old = dir(0o555);
        old.driver = "a".to_string();
        let mut new = dir(0o555);
        new.driver = "b".to_string();

        assert!(boot_equal(&old, &new));
        assert!(!reload_equal(&old, &new));
    }

    #[test]
    fn reconcile_drives_all_three_phases() {
        let ms = FakeMs::new(1);
        ms.insert("/old", EntryType::Dir);

        let mut old_fs = HashMap::new();
        old_fs.insert("/old".to_string(), dir(0o555));

        let mut new_fs = HashMap::new();
        new_fs.insert("/new".to_string(), dir(0o555));

        let d = reconcile(1, &ms, &old_fs, &new_fs, boot_equal).unwrap();
        assert_eq!(d.to_publish, vec!["/new".to_string()]);
        assert_eq!(d.to_delete, vec!["/old".to_string()]);
        assert!(ms.listdir(1, "/").unwrap().iter().any(|e| e.name == "new"));
    }
}
