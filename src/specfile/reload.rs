//! Specfile reload (§4.8): turns a specfile (local file or MS bundle) into
//! a new `AG_fs`, reconciles it against the MS, and atomically swaps it in.

use super::model::Specfile;
use super::parser;
use crate::clock::Clock;
use crate::error::{AgError, AgResult};
use crate::ms::MsClient;
use crate::namespace::{validate_map_info, AgFs, EntryType, MapInfo};
use crate::reconcile::{reconcile, reload_equal};
use crate::reversion::Reversioner;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Reads specfile XML text either from a local path (`-s`) or, if none was
/// given, from the MS bundle (base64 then zstd-compressed, §11.1).
pub fn fetch_specfile_text(
    local_path: Option<&Path>,
    ms: &dyn MsClient,
    volume_id: u64,
) -> AgResult<String> {
    if let Some(path) = local_path {
        let mut text = String::new();
        std::fs::File::open(path)?.read_to_string(&mut text)?;
        return Ok(text);
    }

    let bundle = ms.fetch_specfile_bundle(volume_id)?;
    let compressed = BASE64
        .decode(&bundle)
        .map_err(|e| AgError::InvalidSpecfile(format!("bad base64 specfile bundle: {e}")))?;
    let xml_bytes = zstd::stream::decode_all(&compressed[..])
        .map_err(|e| AgError::InvalidSpecfile(format!("bad zstd specfile bundle: {e}")))?;
    String::from_utf8(xml_bytes).map_err(|e| AgError::InvalidSpecfile(e.to_string()))
}

/// Builds a namespace skeleton straight from the specfile's static
/// `<File>`/`<Dir>` entries, with `cache_valid = false` everywhere —
/// coherence is filled in afterward by [`AgFs::download_ms_fs_map`].
pub fn build_skeleton(specfile: &Specfile) -> AgResult<HashMap<String, MapInfo>> {
    let mut map = HashMap::new();
    map.insert("/".to_string(), MapInfo::new_dir(0));

    for entry in &specfile.files {
        let mut info = MapInfo::new_dir(entry.coordinator_id);
        info.entry_type = if entry.is_dir { EntryType::Dir } else { EntryType::File };
        info.driver = entry.driver.clone();
        info.query_string = entry.query_string.clone();
        info.file_perm = entry.file_perm;
        info.reval_sec = entry.reval_sec;
        map.insert(entry.path.clone(), info);
    }

    validate_map_info(&map)?;
    Ok(map)
}

fn parent_of(path: &str) -> Option<String> {
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

/// The template a directory's wildcard `<Query>` entry supplies for a
/// dynamically MS-discovered child not named statically in the specfile.
pub fn query_template<'a>(
    specfile: &'a Specfile,
) -> impl Fn(&str, EntryType) -> Option<MapInfo> + 'a {
    move |path: &str, entry_type: EntryType| {
        let dir_path = parent_of(path)?;
        let q = specfile.query_for_dir(&dir_path)?;
        let mut info = MapInfo::new_dir(q.coordinator_id);
        info.entry_type = entry_type;
        info.driver = q.driver.clone();
        info.query_string = q.query_string.clone();
        info.file_perm = q.file_perm;
        info.reval_sec = q.reval_sec;
        Some(info)
    }
}

/// Copies AG-runtime-only fields (`block_version`, `refresh_deadline`,
/// `driver_cache`) forward for paths present in both the old and new
/// namespace, so a reload doesn't spuriously force a reversion or a cache
/// miss for a path whose specfile-visible attributes didn't change.
pub fn carry_forward_runtime_state(
    old: &HashMap<String, MapInfo>,
    new: &mut HashMap<String, MapInfo>,
) {
    for (path, new_info) in new.iter_mut() {
        if let Some(old_info) = old.get(path) {
            new_info.block_version = old_info.block_version;
            new_info.refresh_deadline = old_info.refresh_deadline;
            new_info.driver_cache = old_info.driver_cache;
            new_info.cache_valid = old_info.cache_valid;
            new_info.file_id = old_info.file_id;
            new_info.file_version = old_info.file_version;
            new_info.write_nonce = old_info.write_nonce;
            new_info.num_children = old_info.num_children;
            new_info.generation = old_info.generation;
            new_info.capacity = old_info.capacity;
        }
    }
}

/// Runs one full reload (§4.8): parse, validate, discover via MS, carry
/// runtime state forward, reconcile against the MS, swap into `fs`, and
/// enqueue every live path into the reversioner so freshly-seen paths get
/// an initial reversion pass. Returns the set of paths now live, for the
/// caller to persist (§11.1).
pub fn reload(
    volume_id: u64,
    ms: &dyn MsClient,
    _clock: &dyn Clock,
    xml: &str,
    fs: &AgFs,
    reversioner: &Reversioner,
) -> AgResult<Vec<String>> {
    let specfile = parser::parse(xml)?;
    if specfile.volume_id != volume_id {
        return Err(AgError::InvalidSpecfile(format!(
            "specfile volume_id {} does not match running volume {volume_id}",
            specfile.volume_id
        )));
    }

    let skeleton = build_skeleton(&specfile)?;
    let template = query_template(&specfile);
    let mut discovered = AgFs::download_ms_fs_map(volume_id, &skeleton, ms, &template)?;

    let old_fs = fs.snapshot();
    carry_forward_runtime_state(&old_fs, &mut discovered);

    reconcile(volume_id, ms, &old_fs, &discovered, reload_equal)?;

    let path_drivers: Vec<(String, String)> =
        discovered.iter().map(|(p, info)| (p.clone(), info.driver.clone())).collect();
    let paths: Vec<String> = discovered.keys().cloned().collect();
    fs.replace_all(discovered)?;

    reversioner.add_map_infos(path_drivers.iter().map(|(p, d)| (p.as_str(), d.as_str())));

    Ok(paths)
}
