//! Testable invariant #3 (§8): for every block served with `version=V`,
//! the manifest served under the same `(file_id, file_version)` lists
//! `V` at that block's index — for every block, not just block 0.

mod common;

use common::Harness;

#[test]
fn manifest_lists_the_current_version_at_every_block_index() {
    let h = Harness::new();
    h.start_fixture_driver_with_stat_size(3000); // 3 blocks at the harness's 1024-byte block size
    let (file_id, file_version) = h.publish_file("/a/b", false);

    let manifest_path = format!("/{}/a/b.{file_id}.{file_version}/manifest.0.0", common::VOLUME_ID);
    let resp = ag::http::handlers::handle_get(&h.state, &manifest_path, 0);
    assert_eq!(resp.status, 200);

    let manifest: ag::wire::Manifest = ag::wire::decode(&resp.body).unwrap();
    assert_eq!(manifest.ranges.len(), 1);
    let range = &manifest.ranges[0];
    assert_eq!(range.start_id, 0);
    assert_eq!(range.end_id, 3);
    assert_eq!(range.block_versions, vec![1, 1, 1]);

    // A second manifest GET must be served from the read-through cache
    // rather than re-dispatching to the driver.
    let key = ag::cache::CacheKey::manifest(file_id, file_version, 1_700_000_000, 0);
    assert!(h.state.cache.get(&key).is_some(), "manifest should now be cached");
}
