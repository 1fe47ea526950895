//! Manifest signing/verification (§4.4): signed and verified like a block
//! but at the protobuf-equivalent level — no length-prefix wrapper, the
//! signature is an embedded field, and hashing covers the struct with that
//! field cleared.

use crate::certs::CertStore;
use crate::codec::sign::SigningIdentity;
use crate::error::AgError;
use crate::wire::{encode, Manifest};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::Signature;

/// Signs `manifest` in place, filling `signing_gateway_id` and `signature`.
///
/// # Errors
/// Returns [`AgError::Codec`] if the manifest cannot be serialized.
pub fn sign_manifest(identity: &SigningIdentity, manifest: &mut Manifest) -> Result<(), AgError> {
    manifest.signing_gateway_id = identity.gateway_id;
    manifest.signature.clear();
    let to_sign = encode(manifest)?;
    let sig: Signature = identity.key.sign(&to_sign);
    manifest.signature = sig.to_der().as_bytes().to_vec();
    Ok(())
}

/// Verifies a manifest's embedded signature against its signing gateway's
/// public key.
///
/// # Errors
/// Returns [`AgError::CertUnknown`] if the signing gateway isn't cached yet,
/// or [`AgError::VerificationFailed`] if the signature is invalid.
pub fn verify_manifest(certs: &dyn CertStore, manifest: &Manifest) -> Result<(), AgError> {
    let public_key = certs
        .public_key(manifest.signing_gateway_id)
        .ok_or_else(|| AgError::CertUnknown(manifest.signing_gateway_id.to_string()))?;

    let mut unsigned = manifest.clone();
    unsigned.signature.clear();
    let to_verify = encode(&unsigned)?;

    let sig = Signature::from_der(&manifest.signature).map_err(|_| AgError::VerificationFailed)?;
    public_key
        .verify(&to_verify, &sig)
        .map_err(|_| AgError::VerificationFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::InMemoryCertStore;
    use crate::wire::BlockRange;
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::rand_core::OsRng;

    #[test]
    fn manifest_round_trip() {
        let key = SigningKey::random(&mut OsRng);
        let vk = key.verifying_key().clone();
        let identity = SigningIdentity { gateway_id: 3, key };
        let certs = InMemoryCertStore::new(4);
        certs.install(3, vk);

        let mut manifest = Manifest {
            volume_id: 1,
            file_id: 2,
            file_version: 1,
            owner_id: 9,
            size: 4096,
            mtime_sec: 1000,
            mtime_nsec: 0,
            ranges: vec![BlockRange { start_id: 0, end_id: 4, gateway_id: 3, block_versions: vec![1, 1, 1, 1] }],
            signing_gateway_id: 0,
            signature: Vec::new(),
        };

        sign_manifest(&identity, &mut manifest).unwrap();
        verify_manifest(&certs, &manifest).unwrap();

        manifest.size += 1;
        assert!(verify_manifest(&certs, &manifest).is_err());
    }
}
