//! The specfile's parsed object model (§4.8): the structure `ag::specfile::parser`
//! builds from XML and that `ag::specfile::reload` turns into namespace shape.

use crate::error::{AgError, AgResult};
use std::collections::HashMap;

/// `reval="1h30m"` etc.: a sum of `N{w,d,h,m,s}` components (§4.8).
pub fn parse_reval(text: &str) -> AgResult<u64> {
    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if digits.is_empty() {
            return Err(AgError::InvalidSpecfile(format!("malformed reval string: {text}")));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| AgError::InvalidSpecfile(format!("malformed reval string: {text}")))?;
        digits.clear();
        let multiplier: u64 = match ch {
            'w' => 7 * 24 * 3600,
            'd' => 24 * 3600,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            other => {
                return Err(AgError::InvalidSpecfile(format!("unknown reval unit '{other}' in {text}")))
            }
        };
        total = total
            .checked_add(n.checked_mul(multiplier).ok_or_else(|| {
                AgError::InvalidSpecfile(format!("reval string overflowed: {text}"))
            })?)
            .ok_or_else(|| AgError::InvalidSpecfile(format!("reval string overflowed: {text}")))?;
    }
    if !digits.is_empty() {
        return Err(AgError::InvalidSpecfile(format!(
            "reval string {text} is missing a trailing unit"
        )));
    }
    Ok(total)
}

/// `<Pair key="..." value="..."/>`, used both inside `<Config>` and as a
/// driver's environment/argument pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

/// One statically-named path in the specfile. Wildcard directories carry
/// a `query` entry instead (see [`Query`]) and have no `File`/`Dir` node
/// of their own until a child is actually discovered via the MS.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub is_dir: bool,
    pub driver: String,
    pub query_string: String,
    pub file_perm: u32,
    pub coordinator_id: u64,
    pub reval_sec: u64,
}

/// A directory's wildcard child-naming rule (§4.5 `download_MS_fs_map`
/// `merge_new`): any MS-reported child of `dir_path` not otherwise named
/// statically is synthesized using this driver/permissions template.
#[derive(Debug, Clone)]
pub struct Query {
    pub dir_path: String,
    pub driver: String,
    pub query_string: String,
    pub file_perm: u32,
    pub coordinator_id: u64,
    pub reval_sec: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Specfile {
    pub volume_id: u64,
    pub files: Vec<FileEntry>,
    pub queries: Vec<Query>,
    pub config: HashMap<String, String>,
}

impl Specfile {
    /// The permission invariant (§3) is enforced here, at parse time, not
    /// later at use: no entry may carry a write bit.
    pub fn validate(&self) -> AgResult<()> {
        const WRITE_BITS: u32 = 0o222;
        for f in &self.files {
            if f.file_perm & WRITE_BITS != 0 {
                return Err(AgError::WritePermission(f.path.clone()));
            }
        }
        for q in &self.queries {
            if q.file_perm & WRITE_BITS != 0 {
                return Err(AgError::WritePermission(q.dir_path.clone()));
            }
        }
        Ok(())
    }

    pub fn query_for_dir(&self, dir_path: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.dir_path == dir_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reval_sums_mixed_units() {
        assert_eq!(parse_reval("1h30m").unwrap(), 3600 + 30 * 60);
        assert_eq!(parse_reval("10s").unwrap(), 10);
        assert_eq!(parse_reval("1d").unwrap(), 24 * 3600);
    }

    #[test]
    fn reval_rejects_garbage() {
        assert!(parse_reval("abc").is_err());
        assert!(parse_reval("10").is_err());
        assert!(parse_reval("10x").is_err());
    }

    #[test]
    fn validate_rejects_write_bit() {
        let mut sf = Specfile::default();
        sf.files.push(FileEntry {
            path: "/a".to_string(),
            is_dir: false,
            driver: "d".to_string(),
            query_string: String::new(),
            file_perm: 0o644,
            coordinator_id: 1,
            reval_sec: 60,
        });
        assert!(sf.validate().is_err());
    }
}
