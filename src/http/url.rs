//! URL path schema parsing (§4.9):
//!
//! `/ {volume_id} / {fs_path} . {file_id} . {file_version} / {block_id} . {block_version}`
//! for a block, or the last segment replaced with
//! `manifest.{mtime_sec}.{mtime_nsec}` for a manifest.

use crate::error::AgError;
use crate::wire::{BlockLocator, RequestData};

fn parse_u64(s: &str) -> Result<u64, AgError> {
    s.parse().map_err(|_| AgError::BadRequest(format!("not a u64: {s}")))
}

fn parse_i64(s: &str) -> Result<i64, AgError> {
    s.parse().map_err(|_| AgError::BadRequest(format!("not an i64: {s}")))
}

fn parse_i32(s: &str) -> Result<i32, AgError> {
    s.parse().map_err(|_| AgError::BadRequest(format!("not an i32: {s}")))
}

/// Parses a GET/HEAD request path into a [`RequestData`]. `user_id` and
/// `coordinator_id` are filled in by the caller from request context
/// (auth header / namespace lookup), not from the URL.
pub fn parse_get_path(path: &str) -> Result<RequestData, AgError> {
    let trimmed = path.trim_start_matches('/');
    let mut segments = trimmed.split('/');

    let volume_id = parse_u64(segments.next().ok_or_else(|| bad(path))?)?;

    let rest: Vec<&str> = segments.collect();
    if rest.len() < 2 {
        return Err(bad(path));
    }
    let (fs_segment, last_segments) = rest.split_at(rest.len() - 1);
    let last = last_segments[0];
    let fs_path_and_id = fs_segment.join("/");

    let mut fid_parts = fs_path_and_id.rsplitn(3, '.');
    let file_version_str = fid_parts.next().ok_or_else(|| bad(path))?;
    let file_id_str = fid_parts.next().ok_or_else(|| bad(path))?;
    let fs_path = fid_parts.next().ok_or_else(|| bad(path))?;
    let file_id = parse_u64(file_id_str)?;
    let file_version = parse_i64(file_version_str)?;

    let locator = if let Some(rest) = last.strip_prefix("manifest.") {
        let mut parts = rest.splitn(2, '.');
        let mtime_sec = parse_i64(parts.next().ok_or_else(|| bad(path))?)?;
        let mtime_nsec = parse_i32(parts.next().ok_or_else(|| bad(path))?)?;
        BlockLocator::Manifest { mtime_sec, mtime_nsec }
    } else {
        let mut parts = last.splitn(2, '.');
        let block_id = parse_u64(parts.next().ok_or_else(|| bad(path))?)?;
        let block_version = parse_i64(parts.next().ok_or_else(|| bad(path))?)?;
        BlockLocator::Block { block_id, block_version }
    };

    Ok(RequestData {
        volume_id,
        fs_path: format!("/{fs_path}"),
        file_id,
        file_version,
        locator,
        xattr_name: None,
        user_id: 0,
        coordinator_id: 0,
    })
}

fn bad(path: &str) -> AgError {
    AgError::BadRequest(format!("unparseable URL path: {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_path() {
        let req = parse_get_path("/1/a/b.2.3/4.5").unwrap();
        assert_eq!(req.volume_id, 1);
        assert_eq!(req.fs_path, "/a/b");
        assert_eq!(req.file_id, 2);
        assert_eq!(req.file_version, 3);
        assert_eq!(req.locator, BlockLocator::Block { block_id: 4, block_version: 5 });
    }

    #[test]
    fn parses_manifest_path() {
        let req = parse_get_path("/1/a.2.3/manifest.1000.500").unwrap();
        assert_eq!(req.locator, BlockLocator::Manifest { mtime_sec: 1000, mtime_nsec: 500 });
    }

    #[test]
    fn rejects_malformed_path() {
        assert!(parse_get_path("/not-enough").is_err());
        assert!(parse_get_path("/1/a.nope.3/4.5").is_err());
    }
}
