//! Scenario 3 (§8): a specfile reload that drops a previously-named file
//! removes it from the live namespace, the returned live-path set, and
//! the MS's own view (reconcile's delete phase).

mod common;

use ag::ms::MsClient;
use ag::specfile;
use common::Harness;

const TWO_FILES: &str = r#"
    <Specfile volume_id="1">
      <File path="/keep.txt" driver="fixture" query="doc=keep" perm="0444" coordinator="7" reval="1h"/>
      <File path="/gone.txt" driver="fixture" query="doc=gone" perm="0444" coordinator="7" reval="1h"/>
    </Specfile>
"#;

const ONE_FILE: &str = r#"
    <Specfile volume_id="1">
      <File path="/keep.txt" driver="fixture" query="doc=keep" perm="0444" coordinator="7" reval="1h"/>
    </Specfile>
"#;

fn run_reload(h: &Harness, xml: &str) -> Vec<String> {
    let fs = h.state.fs();
    specfile::reload(common::VOLUME_ID, h.ms.as_ref(), h.clock.as_ref(), xml, &fs, &h.state.reversioner)
        .expect("reload should succeed")
}

#[test]
fn reload_drops_paths_the_new_specfile_no_longer_names() {
    let h = Harness::new();

    let live_after_first = run_reload(&h, TWO_FILES);
    assert!(live_after_first.contains(&"/keep.txt".to_string()));
    assert!(live_after_first.contains(&"/gone.txt".to_string()));
    assert!(h.ms.path_download(common::VOLUME_ID, &["/gone.txt".to_string()]).unwrap()[0].is_some());

    let live_after_second = run_reload(&h, ONE_FILE);
    assert!(live_after_second.contains(&"/keep.txt".to_string()));
    assert!(!live_after_second.contains(&"/gone.txt".to_string()));

    let fs = h.state.fs();
    assert!(fs.contains("/keep.txt"));
    assert!(!fs.contains("/gone.txt"));

    // reconcile's delete phase should have scrubbed it from the MS too.
    assert!(h.ms.path_download(common::VOLUME_ID, &["/gone.txt".to_string()]).unwrap()[0].is_none());
}
