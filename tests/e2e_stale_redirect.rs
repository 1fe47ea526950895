//! Scenario 2 (§8): a path past its freshness deadline replies `503 Try
//! Again` and enqueues a reversion rather than serving stale data; once
//! that reversion runs, a GET at the bumped block version succeeds.

mod common;

use ag::clock::Clock;
use common::Harness;

#[test]
fn stale_deadline_triggers_reversion_then_succeeds() {
    let h = Harness::new();
    h.start_fixture_driver();
    let (file_id, file_version) = h.publish_file("/a", false);

    // `publish_file` gives `/a` a 3600s reval window; run past it.
    h.clock.advance(3601.0);

    let path = format!("/{}/a.{file_id}.{file_version}/0.1", common::VOLUME_ID);
    let first = ag::http::handlers::handle_get(&h.state, &path, 0);
    assert_eq!(first.status, 503);
    assert_eq!(h.state.reversioner.len(), 1);

    let fs = h.state.fs();
    let now = h.clock.now_secs();
    let ran = h.state.reversioner.drain_due(now, &fs, &h.state.cache, &h.state.drivers).unwrap();
    assert_eq!(ran, 1);

    let info = fs.get("/a").unwrap();
    assert_eq!(info.block_version, 2);
    assert!(info.refresh_deadline > now, "reversion must move the deadline forward");

    let refreshed_path =
        format!("/{}/a.{file_id}.{file_version}/0.{}", common::VOLUME_ID, info.block_version);
    let second = ag::http::handlers::handle_get(&h.state, &refreshed_path, 0);
    assert_eq!(second.status, 200);
}
