//! Verify a signed block (§4.4, §8 sign/verify round-trip law).

use crate::certs::CertStore;
use crate::error::AgError;
use crate::wire::{decode, encode, SignedBlockHeader};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::Signature;
use sha2::{Digest, Sha256};

/// Parses the header, verifies the gateway's signature over the header
/// (with `signature` cleared), and checks the payload hash. On success
/// returns the byte offset at which the payload begins, so the caller can
/// slice it out of `wire` in place.
///
/// # Errors
/// - [`AgError::BadRequest`] if the declared header length doesn't fit in `wire`.
/// - [`AgError::CertUnknown`] if the signing gateway's public key isn't cached yet
///   — the caller should trigger a certificate reload.
/// - [`AgError::VerificationFailed`] if the signature doesn't check out.
/// - [`AgError::HashMismatch`] if the payload hash doesn't match the header.
pub fn verify_block(certs: &dyn CertStore, wire: &[u8]) -> Result<usize, AgError> {
    if wire.len() < 4 {
        return Err(AgError::BadRequest("wire form too short for header length".to_string()));
    }
    let header_len = u32::from_be_bytes([wire[0], wire[1], wire[2], wire[3]]) as usize;
    let header_end = 4usize
        .checked_add(header_len)
        .filter(|&end| end <= wire.len())
        .ok_or_else(|| AgError::BadRequest("declared header length exceeds wire form".to_string()))?;

    let header_bytes = &wire[4..header_end];
    let payload = &wire[header_end..];
    let header: SignedBlockHeader = decode(header_bytes)?;

    let public_key = certs
        .public_key(header.signing_gateway_id)
        .ok_or_else(|| AgError::CertUnknown(header.signing_gateway_id.to_string()))?;

    let mut unsigned = header.clone();
    unsigned.signature.clear();
    let to_verify = encode(&unsigned)?;

    let sig = Signature::from_der(&header.signature).map_err(|_| AgError::VerificationFailed)?;
    public_key
        .verify(&to_verify, &sig)
        .map_err(|_| AgError::VerificationFailed)?;

    let mut hasher = Sha256::new();
    hasher.update(payload);
    let computed: [u8; 32] = hasher.finalize().into();
    if computed != header.payload_sha256 {
        return Err(AgError::HashMismatch);
    }

    Ok(header_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::InMemoryCertStore;
    use crate::codec::sign::{sign_block, SigningIdentity};
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::rand_core::OsRng;

    fn identity() -> (SigningIdentity, p256::ecdsa::VerifyingKey) {
        let key = SigningKey::random(&mut OsRng);
        let vk = key.verifying_key().clone();
        (SigningIdentity { gateway_id: 7, key }, vk)
    }

    #[test]
    fn round_trip_succeeds() {
        let (identity, vk) = identity();
        let certs = InMemoryCertStore::new(8);
        certs.install(7, vk);

        let wire = sign_block(&identity, 1, 2, 1, 0, 1, b"hello world").unwrap();
        let offset = verify_block(&certs, &wire).unwrap();
        assert_eq!(&wire[offset..], b"hello world");
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (identity, vk) = identity();
        let certs = InMemoryCertStore::new(8);
        certs.install(7, vk);

        let mut wire = sign_block(&identity, 1, 2, 1, 0, 1, b"hello world").unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        let err = verify_block(&certs, &wire).unwrap_err();
        assert!(matches!(err, AgError::HashMismatch));
    }

    #[test]
    fn unknown_gateway_requests_cert_reload() {
        let (identity, _vk) = identity();
        let certs = InMemoryCertStore::new(8);
        let wire = sign_block(&identity, 1, 2, 1, 0, 1, b"x").unwrap();
        let err = verify_block(&certs, &wire).unwrap_err();
        assert!(matches!(err, AgError::CertUnknown(_)));
    }
}
