//! GET/HEAD request pipeline (§4.9): parse, refresh, freshness/redirect
//! checks, then serve from cache or the owning driver.

use super::url::parse_get_path;
use crate::cache::CacheKey;
use crate::codec::sign_block;
use crate::error::{AgError, AgResult, StatusHint};
use crate::namespace::EntryType;
use crate::state::State;
use crate::wire::{BlockLocator, BlockRange, DriverRequest, DriverRequestType, Manifest, PubInfo};

pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn ok(body: Vec<u8>) -> Self {
        HttpResponse { status: 200, location: None, body }
    }

    fn redirect(location: String) -> Self {
        HttpResponse { status: 302, location: Some(location), body: Vec::new() }
    }
}

pub fn status_code(hint: StatusHint) -> u16 {
    match hint {
        StatusHint::NotFound => 404,
        StatusHint::PermissionDenied => 403,
        StatusHint::BadRequest => 400,
        StatusHint::Redirect => 302,
        StatusHint::TryAgain => 503,
        StatusHint::CoordinatorMismatch => 410,
        StatusHint::NotImplemented => 501,
        StatusHint::Internal => 500,
    }
}

fn error_response(err: &AgError) -> HttpResponse {
    HttpResponse { status: status_code(err.status_hint()), location: None, body: err.to_string().into_bytes() }
}

fn canonical_path(volume_id: u64, fs_path: &str, file_id: u64, file_version: i64, tail: &str) -> String {
    format!("/{volume_id}{fs_path}.{file_id}.{file_version}/{tail}")
}

/// `coordinator_id`, when nonzero, is the caller's belief about who owns
/// this path (carried over request context outside the URL path schema,
/// e.g. an `X-Coordinator-Id` header — see [`super::url::parse_get_path`]'s
/// doc comment); a mismatch against the namespace's own record is a
/// coordinator-mismatch error, not a redirect the same request can follow
/// (§4.9, §8 scenario 6).
pub fn handle_get(state: &State, path: &str, coordinator_id: u64) -> HttpResponse {
    match handle_get_inner(state, path, coordinator_id) {
        Ok(r) => r,
        Err(e) => error_response(&e),
    }
}

fn handle_get_inner(state: &State, path: &str, coordinator_id: u64) -> AgResult<HttpResponse> {
    state.check_servicing()?;
    let mut req = parse_get_path(path)?;
    req.coordinator_id = coordinator_id;
    if req.volume_id != state.volume_id {
        return Err(AgError::NotFound(path.to_string()));
    }

    let fs = state.fs();
    fs.refresh_path_metadata(state.ms.as_ref(), state.clock.as_ref(), &req.fs_path)?;
    let info = fs.get(&req.fs_path).ok_or_else(|| AgError::NotFound(req.fs_path.clone()))?;

    if info.entry_type != EntryType::File {
        return Err(AgError::NotDirectory(req.fs_path.clone()));
    }

    // Past its freshness deadline: the MS refresh above may have updated
    // coherence data, but only a reversion moves `refresh_deadline`
    // forward (§4.7). Queue one and make the caller retry rather than
    // serve against a record we haven't revalidated block-wise (§4.9
    // step 3).
    let now = state.clock.now_secs();
    if now > info.refresh_deadline {
        state.reversioner.push(req.fs_path.clone(), info.driver.clone(), 0.0, info.driver_cache);
        return Err(AgError::TryAgain);
    }

    // Coordinator mismatch is not retryable by redirecting the same
    // request: the client must re-resolve ownership (§4.9, §8 scenario 6).
    if req.coordinator_id != 0 && info.coordinator_id != req.coordinator_id {
        return Err(AgError::NotCoordinator(req.fs_path.clone()));
    }

    if info.file_id != req.file_id || info.file_version != req.file_version {
        let tail = match req.locator {
            BlockLocator::Block { block_id, .. } => format!("{block_id}.{}", info.block_version),
            BlockLocator::Manifest { .. } => {
                let pub_info = info.driver_cache.unwrap_or(PubInfo { size: 0, mtime_sec: 0, mtime_nsec: 0 });
                format!("manifest.{}.{}", pub_info.mtime_sec, pub_info.mtime_nsec)
            }
        };
        let location = canonical_path(req.volume_id, &req.fs_path, info.file_id, info.file_version, &tail);
        return Ok(HttpResponse::redirect(location));
    }

    match req.locator {
        BlockLocator::Block { block_id, block_version } => {
            if block_version != info.block_version {
                let tail = format!("{block_id}.{}", info.block_version);
                let location = canonical_path(req.volume_id, &req.fs_path, info.file_id, info.file_version, &tail);
                return Ok(HttpResponse::redirect(location));
            }
            serve_block(state, &req.fs_path, info.file_id, info.file_version, &info.driver, &info.query_string, block_id, block_version)
        }
        BlockLocator::Manifest { .. } => serve_manifest(
            state,
            &req.fs_path,
            info.file_id,
            info.file_version,
            &info.driver,
            &info.query_string,
            info.block_version,
            info.driver_cache,
        ),
    }
}

fn serve_block(
    state: &State,
    fs_path: &str,
    file_id: u64,
    file_version: i64,
    driver: &str,
    query_string: &str,
    block_id: u64,
    block_version: i64,
) -> AgResult<HttpResponse> {
    let key = CacheKey::block(file_id, file_version, block_id, block_version);

    let payload = match state.cache.get(&key) {
        Some(bytes) => bytes,
        None => {
            let req = DriverRequest {
                request_type: DriverRequestType::Block,
                file_id,
                file_version,
                block_id,
                block_version,
                manifest_mtime_sec: 0,
                manifest_mtime_nsec: 0,
                path: fs_path.to_string(),
                query_string: query_string.to_string(),
                io_hint_sequential: false,
            };
            let reply = state.drivers.dispatch(driver, &req)?;
            if !reply.is_ok() {
                return Err(AgError::NotFound(fs_path.to_string()));
            }
            let mut padded = reply.payload;
            let block_size = state.cache.config().block_size_bytes as usize;
            if padded.len() < block_size {
                padded.resize(block_size, 0);
            }
            // A losing single-flight race (another reader already filled
            // this key) surfaces as `Cache("EEXIST")`; that's not an
            // error for this reader, who already has the bytes in hand.
            if let Err(e) = state.cache.put_async(key, padded.clone()) {
                match e {
                    AgError::Cache(_) => {}
                    other => return Err(other),
                }
            }
            padded
        }
    };

    let wire = sign_block(
        &state.signing_identity,
        state.volume_id,
        file_id,
        file_version,
        block_id,
        block_version,
        &payload,
    )?;
    Ok(HttpResponse::ok(wire))
}

#[allow(clippy::too_many_arguments)]
fn serve_manifest(
    state: &State,
    fs_path: &str,
    file_id: u64,
    file_version: i64,
    driver: &str,
    query_string: &str,
    block_version: i64,
    driver_cache: Option<PubInfo>,
) -> AgResult<HttpResponse> {
    if let Some(pi) = driver_cache {
        let key = CacheKey::manifest(file_id, file_version, pi.mtime_sec, pi.mtime_nsec);
        if let Some(bytes) = state.cache.get(&key) {
            return Ok(HttpResponse::ok(bytes));
        }
    }

    let req = DriverRequest {
        request_type: DriverRequestType::Stat,
        file_id,
        file_version,
        block_id: 0,
        block_version: 0,
        manifest_mtime_sec: 0,
        manifest_mtime_nsec: 0,
        path: fs_path.to_string(),
        query_string: query_string.to_string(),
        io_hint_sequential: false,
    };
    let reply = state.drivers.dispatch(driver, &req)?;
    if !reply.is_ok() {
        return Err(AgError::NotFound(fs_path.to_string()));
    }
    let pub_info: PubInfo = crate::wire::decode(&reply.payload)?;

    let block_size = state.cache.config().block_size_bytes.max(1);
    let num_blocks = pub_info.size.div_ceil(block_size);
    let mut manifest = Manifest {
        volume_id: state.volume_id,
        file_id,
        file_version,
        owner_id: state.gateway_id,
        size: pub_info.size,
        mtime_sec: pub_info.mtime_sec,
        mtime_nsec: pub_info.mtime_nsec,
        ranges: vec![BlockRange {
            start_id: 0,
            end_id: num_blocks,
            gateway_id: state.gateway_id,
            block_versions: vec![block_version; num_blocks as usize],
        }],
        signing_gateway_id: 0,
        signature: Vec::new(),
    };
    crate::codec::sign_manifest(&state.signing_identity, &mut manifest)?;
    let wire = crate::wire::encode(&manifest)?;

    // Persist the freshly-learned pubinfo so the next manifest GET for this
    // path can probe the cache before dispatching to the driver at all.
    state.fs().with_entry_mut(fs_path, |entry| {
        entry.make_coherent_with_driver_data(pub_info.size, pub_info.mtime_sec, pub_info.mtime_nsec);
    });

    let key = CacheKey::manifest(file_id, file_version, pub_info.mtime_sec, pub_info.mtime_nsec);
    if let Err(e) = state.cache.put_async(key, wire.clone()) {
        match e {
            AgError::Cache(_) => {}
            other => return Err(other),
        }
    }
    Ok(HttpResponse::ok(wire))
}
