//! Scenario 4 (§8): a block tampered with after signing fails payload-hash
//! verification, independent of whether the signature itself still parses.

mod common;

use ag::codec::verify_block;
use ag::error::AgError;
use common::Harness;

#[test]
fn tampered_served_block_fails_hash_check() {
    let h = Harness::new();
    h.start_fixture_driver();
    let (file_id, file_version) = h.publish_file("/readme.txt", false);

    let path = format!("/{}/readme.txt.{file_id}.{file_version}/0.1", common::VOLUME_ID);
    let resp = ag::http::handlers::handle_get(&h.state, &path, 0);
    assert_eq!(resp.status, 200);

    let mut tampered = resp.body;
    let last = tampered.len() - 1;
    tampered[last] ^= 0xFF;

    let err = verify_block(&*h.certs, &tampered).unwrap_err();
    assert!(matches!(err, AgError::HashMismatch));
}
