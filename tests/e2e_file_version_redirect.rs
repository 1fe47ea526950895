//! §4.9 step 4: once the namespace has learned of a new `file_version`
//! for a path (e.g. via a specfile reload's unconditional MS fold) while
//! the entry is still within its freshness window, a GET carrying the
//! old `file_version` in its URL redirects to the canonical one rather
//! than erroring.

mod common;

use common::Harness;

#[test]
fn bumped_file_version_redirects_to_canonical_path() {
    let h = Harness::new();
    h.start_fixture_driver();
    let (file_id, old_version) = h.publish_file("/data/report.csv", false);

    let fs = h.state.fs();
    fs.with_entry_mut("/data/report.csv", |info| {
        info.file_version = old_version + 1;
    });

    let path = format!("/{}/data/report.csv.{file_id}.{old_version}/0.1", common::VOLUME_ID);
    let resp = ag::http::handlers::handle_get(&h.state, &path, 0);

    assert_eq!(resp.status, 302);
    let location = resp.location.expect("redirect must carry a Location");
    assert_eq!(
        location,
        format!("/{}/data/report.csv.{file_id}.{}/0.1", common::VOLUME_ID, old_version + 1)
    );
}
