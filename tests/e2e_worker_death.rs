//! Scenario 5 (§8): a driver worker that exits before replying surfaces
//! as `WorkerDead` to the dispatcher, and the pool's roster shrinks once
//! the dead worker is reaped on release.

mod common;

use ag::error::AgError;
use common::Harness;

#[test]
fn dead_worker_surfaces_as_worker_dead_and_shrinks_roster() {
    let h = Harness::new();
    h.start_dying_fixture_driver(0);
    let (file_id, file_version) = h.publish_file("/readme.txt", false);

    let before = h.state.drivers.snapshot();
    assert_eq!(before.iter().find(|g| g.query_type == common::QUERY_TYPE).unwrap().roster_size, 1);

    let path = format!("/{}/readme.txt.{file_id}.{file_version}/0.1", common::VOLUME_ID);
    let resp = ag::http::handlers::handle_get(&h.state, &path, 0);

    assert_eq!(resp.status, ag::http::handlers::status_code(AgError::WorkerDead.status_hint()));

    let after = h.state.drivers.snapshot();
    assert_eq!(after.iter().find(|g| g.query_type == common::QUERY_TYPE).unwrap().roster_size, 0);
}
