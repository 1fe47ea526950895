//! Scenario 1 (§8): a fresh, coherent file entry serves a block with a
//! signature that verifies against the gateway's installed public key.

mod common;

use ag::codec::verify_block;
use common::Harness;

#[test]
fn cold_get_serves_verifiable_block() {
    let h = Harness::new();
    h.start_fixture_driver();
    let (file_id, file_version) = h.publish_file("/readme.txt", false);

    let path = format!("/{}/readme.txt.{file_id}.{file_version}/0.1", common::VOLUME_ID);
    let resp = ag::http::handlers::handle_get(&h.state, &path, 0);

    assert_eq!(resp.status, 200);
    let offset = verify_block(&*h.certs, &resp.body).expect("signature must verify");
    // Short reads are zero-padded out to the volume block size (1024 in
    // this harness) before being signed and cached (§4.9).
    let mut expected = format!("file={file_id} block=0 version=1").repeat(4).into_bytes();
    expected.resize(1024, 0);
    assert_eq!(&resp.body[offset..], expected.as_slice());

    let key = ag::cache::CacheKey::block(file_id, file_version, 0, 1);
    assert!(h.state.cache.get(&key).is_some(), "block should now be cached");
}
