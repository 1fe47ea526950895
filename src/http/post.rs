//! POST verb envelope (§4.9, §6): write-delta, truncate, rename, detach,
//! setxattr, removexattr, putchunks, deletechunks. `AG_fs`'s permission
//! invariant (§3) forbids write bits on any entry, so every data- or
//! metadata-mutating verb is structurally impossible here and fails
//! closed with [`AgError::WritePermission`] rather than attempting a
//! capability check that could never pass. `Ioctl` is the one verb that
//! reaches a driver, via the control-plane passthrough (§11.3); it still
//! goes through the full envelope: signature verification against the
//! sender's public key, a capability check, and a coordinator check (§4.9).

use crate::certs::CertStore;
use crate::error::{AgError, AgResult};
use crate::state::State;
use crate::wire::{decode, encode, DriverRequest, DriverRequestType};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::Signature;
use serde::{Deserialize, Serialize};

/// Grants write-delta/truncate/putchunks/deletechunks-class access.
pub const CAP_WRITE_DATA: u8 = 0b01;
/// Grants rename/detach/setxattr/removexattr/ioctl-class access.
pub const CAP_WRITE_METADATA: u8 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostVerb {
    WriteDelta,
    Truncate,
    Rename,
    Detach,
    SetXattr,
    RemoveXattr,
    PutChunks,
    DeleteChunks,
    Ioctl,
}

impl PostVerb {
    fn required_capability(self) -> u8 {
        match self {
            PostVerb::WriteDelta | PostVerb::Truncate | PostVerb::PutChunks | PostVerb::DeleteChunks => {
                CAP_WRITE_DATA
            }
            PostVerb::Rename
            | PostVerb::Detach
            | PostVerb::SetXattr
            | PostVerb::RemoveXattr
            | PostVerb::Ioctl => CAP_WRITE_METADATA,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub verb: PostVerb,
    pub fs_path: String,
    pub opaque: Vec<u8>,
    pub sender_gateway_id: u64,
    pub capabilities: u8,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReply {
    pub status: u8,
    pub payload: Vec<u8>,
}

/// Verifies `req.signature` against the sender's cached public key, the
/// same clear-field-then-encode-then-verify shape as
/// [`crate::codec::verify_manifest`].
///
/// # Errors
/// Returns [`AgError::CertUnknown`] if the sender isn't cached yet (the
/// caller should trigger a cert reload), or [`AgError::VerificationFailed`]
/// if the signature doesn't check out.
fn verify_post_request(certs: &dyn CertStore, req: &PostRequest) -> AgResult<()> {
    let public_key = certs
        .public_key(req.sender_gateway_id)
        .ok_or_else(|| AgError::CertUnknown(req.sender_gateway_id.to_string()))?;

    let mut unsigned = req.clone();
    unsigned.signature.clear();
    let to_verify = encode(&unsigned)?;

    let sig = Signature::from_der(&req.signature).map_err(|_| AgError::VerificationFailed)?;
    public_key.verify(&to_verify, &sig).map_err(|_| AgError::VerificationFailed)?;
    Ok(())
}

pub fn handle_post(state: &State, body: &[u8]) -> AgResult<Vec<u8>> {
    state.check_servicing()?;
    let req: PostRequest = decode(body)?;
    verify_post_request(state.certs.as_ref(), &req)?;

    if req.capabilities & req.verb.required_capability() == 0 {
        return Err(AgError::PermissionDenied(req.fs_path));
    }

    let reply = match req.verb {
        PostVerb::Ioctl => handle_ioctl(state, &req)?,
        _ => return Err(AgError::WritePermission(req.fs_path)),
    };
    encode(&reply)
}

fn handle_ioctl(state: &State, req: &PostRequest) -> AgResult<PostReply> {
    let fs = state.fs();
    let info = fs.get(&req.fs_path).ok_or_else(|| AgError::NotFound(req.fs_path.clone()))?;

    // This gateway must be the coordinator for the target file: a POST
    // aimed at the wrong gateway can't be retried as-is (§4.9).
    if info.coordinator_id != state.gateway_id {
        return Err(AgError::NotCoordinator(req.fs_path.clone()));
    }

    // DRIVER_IOCTL payload is `"<query_type>:<opaque>"`, byte-delimited
    // rather than C-string terminated (§9 open question resolved against
    // the C-string reading: a NUL inside `opaque` is data, not a
    // terminator, so splitting on the first `:` is the only safe rule).
    let colon = memchr::memchr(b':', &req.opaque).ok_or_else(|| {
        AgError::BadRequest("DRIVER_IOCTL payload missing ':' separator".to_string())
    })?;
    let (query_type_bytes, opaque) = req.opaque.split_at(colon);
    let opaque = &opaque[1..];
    let query_type = std::str::from_utf8(query_type_bytes)
        .map_err(|_| AgError::BadRequest("DRIVER_IOCTL query type is not UTF-8".to_string()))?;

    let mut ioctl_req = DriverRequest {
        request_type: DriverRequestType::Ioctl,
        file_id: info.file_id,
        file_version: info.file_version,
        block_id: 0,
        block_version: info.block_version,
        manifest_mtime_sec: 0,
        manifest_mtime_nsec: 0,
        path: req.fs_path.clone(),
        query_string: info.query_string.clone(),
        io_hint_sequential: false,
    };
    ioctl_req.query_string = String::from_utf8_lossy(opaque).into_owned();

    let reply = state.drivers.dispatch(query_type, &ioctl_req)?;
    Ok(PostReply { status: reply.status, payload: reply.payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::rand_core::OsRng;

    fn signed(verb: PostVerb, capabilities: u8, key: &SigningKey, gateway_id: u64) -> PostRequest {
        let mut req = PostRequest {
            verb,
            fs_path: "/a".to_string(),
            opaque: Vec::new(),
            sender_gateway_id: gateway_id,
            capabilities,
            signature: Vec::new(),
        };
        let to_sign = encode(&req).unwrap();
        let sig: Signature = key.sign(&to_sign);
        req.signature = sig.to_der().as_bytes().to_vec();
        req
    }

    #[test]
    fn write_delta_requires_write_data_capability() {
        let key = SigningKey::random(&mut OsRng);
        let req = signed(PostVerb::WriteDelta, CAP_WRITE_DATA, &key, 1);
        assert_eq!(req.verb, PostVerb::WriteDelta);
        assert_eq!(req.verb.required_capability(), CAP_WRITE_DATA);
    }

    #[test]
    fn ioctl_requires_write_metadata_capability() {
        assert_eq!(PostVerb::Ioctl.required_capability(), CAP_WRITE_METADATA);
    }

    #[test]
    fn verify_post_request_rejects_unknown_sender() {
        use crate::certs::InMemoryCertStore;
        let key = SigningKey::random(&mut OsRng);
        let req = signed(PostVerb::Ioctl, CAP_WRITE_METADATA, &key, 1);
        let certs = InMemoryCertStore::new(4);
        let err = verify_post_request(&certs, &req).unwrap_err();
        assert!(matches!(err, AgError::CertUnknown(_)));
    }

    #[test]
    fn verify_post_request_accepts_known_sender() {
        use crate::certs::InMemoryCertStore;
        let key = SigningKey::random(&mut OsRng);
        let vk = key.verifying_key().clone();
        let req = signed(PostVerb::Ioctl, CAP_WRITE_METADATA, &key, 1);
        let certs = InMemoryCertStore::new(4);
        certs.install(1, vk);
        verify_post_request(&certs, &req).unwrap();
    }

    #[test]
    fn verify_post_request_rejects_tampered_body() {
        use crate::certs::InMemoryCertStore;
        let key = SigningKey::random(&mut OsRng);
        let vk = key.verifying_key().clone();
        let mut req = signed(PostVerb::Ioctl, CAP_WRITE_METADATA, &key, 1);
        req.fs_path = "/b".to_string();
        let certs = InMemoryCertStore::new(4);
        certs.install(1, vk);
        let err = verify_post_request(&certs, &req).unwrap_err();
        assert!(matches!(err, AgError::VerificationFailed));
    }
}
