//! Persisted MS-metadata cache file (§6, §11.1).
//!
//! One line per namespace path: `f:<path>` or `d:<path>`. Written fresh on
//! clean shutdown and on every specfile reload, so a restart after a clean
//! stop can seed its namespace shape without waiting on the MS. A restart
//! after a crash ignores this file — `-n` forces a full reversion instead.

use super::map_info::EntryType;
use crate::error::{AgError, AgResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn save<'a, I>(path: &Path, entries: I) -> AgResult<()>
where
    I: IntoIterator<Item = (&'a str, EntryType)>,
{
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for (entry_path, entry_type) in entries {
            let tag = match entry_type {
                EntryType::File => 'f',
                EntryType::Dir => 'd',
            };
            writeln!(writer, "{tag}:{entry_path}")?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads the cache file, rejecting it outright if any path appears twice
/// (§6: a duplicate means the file was corrupted or hand-edited, and
/// trusting it could resurrect a stale ancestor/child pairing).
pub fn load(path: &Path) -> AgResult<Vec<(String, EntryType)>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (tag, entry_path) = line
            .split_once(':')
            .ok_or_else(|| AgError::InvalidSpecfile(format!("malformed cache line: {line}")))?;
        let entry_type = match tag {
            "f" => EntryType::File,
            "d" => EntryType::Dir,
            other => {
                return Err(AgError::InvalidSpecfile(format!("unknown entry tag '{other}' in cache file")))
            }
        };
        if !seen.insert(entry_path.to_string()) {
            return Err(AgError::DuplicatePath(entry_path.to_string()));
        }
        out.push((entry_path.to_string(), entry_type));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ms_cache");
        let entries = vec![("/", EntryType::Dir), ("/a", EntryType::Dir), ("/a/b", EntryType::File)];
        save(&path, entries.clone()).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2], ("/a/b".to_string(), EntryType::File));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ms_cache");
        std::fs::write(&path, "d:/a\nf:/a\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, AgError::DuplicatePath(_)));
    }

    #[test]
    fn malformed_line_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ms_cache");
        std::fs::write(&path, "not-a-valid-line\n").unwrap();
        assert!(load(&path).is_err());
    }
}
