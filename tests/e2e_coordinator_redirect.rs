//! Scenario 6 (§8): a request carrying a coordinator id that disagrees
//! with the path's own record is a coordinator mismatch (HTTP 410), not a
//! followable redirect — the client must re-resolve ownership elsewhere.

mod common;

use common::{Harness, GATEWAY_ID};

#[test]
fn mismatched_coordinator_id_is_rejected() {
    let h = Harness::new();
    h.start_fixture_driver();
    let (file_id, file_version) = h.publish_file("/readme.txt", false);

    let path = format!("/{}/readme.txt.{file_id}.{file_version}/0.1", common::VOLUME_ID);

    // The path's own coordinator is GATEWAY_ID; a caller who believes a
    // different gateway owns it gets rejected rather than served.
    let resp = ag::http::handlers::handle_get(&h.state, &path, GATEWAY_ID + 1);
    assert_eq!(resp.status, 410);

    // The same caller with no opinion (0) or the right opinion succeeds.
    let resp_no_opinion = ag::http::handlers::handle_get(&h.state, &path, 0);
    assert_eq!(resp_no_opinion.status, 200);

    let resp_agrees = ag::http::handlers::handle_get(&h.state, &path, GATEWAY_ID);
    assert_eq!(resp_agrees.status, 200);
}
