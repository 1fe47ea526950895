//! Sign a block: §4.4, §3 wire form `[u32 header_len BE][SignedBlockHeader][payload]`.

use crate::error::AgError;
use crate::wire::{encode, SignedBlockHeader};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

/// This gateway's signing identity.
pub struct SigningIdentity {
    pub gateway_id: u64,
    pub key: SigningKey,
}

/// Computes `SHA-256(payload)`, fills in a [`SignedBlockHeader`], signs it,
/// and emits the wire form.
///
/// # Errors
/// Returns [`AgError::Codec`] if the header cannot be serialized.
pub fn sign_block(
    identity: &SigningIdentity,
    volume_id: u64,
    file_id: u64,
    file_version: i64,
    block_id: u64,
    block_version: i64,
    payload: &[u8],
) -> Result<Vec<u8>, AgError> {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let payload_sha256: [u8; 32] = hasher.finalize().into();

    let mut header = SignedBlockHeader {
        volume_id,
        file_id,
        file_version,
        block_id,
        block_version,
        payload_sha256,
        signing_gateway_id: identity.gateway_id,
        signature: Vec::new(),
    };

    let to_sign = encode(&header)?;
    let sig: Signature = identity.key.sign(&to_sign);
    header.signature = sig.to_der().as_bytes().to_vec();

    let header_bytes = encode(&header)?;
    let mut wire = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    wire.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    wire.extend_from_slice(&header_bytes);
    wire.extend_from_slice(payload);
    Ok(wire)
}
