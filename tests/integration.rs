//! Integration tests for `hosts-sync` against real files.
//!
//! Tests marked `#[ignore]` write the real system hosts file and require root:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use hosts_sync::splice::CURRENT_MARKER;
use hosts_sync::{
    HostsHistory, NoPrompt, Profile, ProfilePatch, Selection, SyncConfig, SyncEngine,
};
use std::path::Path;
use std::sync::Arc;

fn open(dir: &Path, hosts: &str) -> SyncEngine {
    let hosts_path = dir.join("hosts");
    std::fs::write(&hosts_path, hosts).unwrap();
    let config = SyncConfig::new(dir.join("data")).with_hosts_path(hosts_path);
    SyncEngine::open(&config, Arc::new(NoPrompt)).unwrap()
}

// ---------------------------------------------------------------------------
// Tempdir tests (no root required)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path(), "127.0.0.1 localhost\n");
    let store = engine.store();

    // Two profiles, one enabled.
    store.create(Profile::new("dev", "Dev")).unwrap();
    store.create(Profile::new("stage", "Stage")).unwrap();
    engine.cache().store("dev", "10.0.0.1 api.dev\n").await.unwrap();
    engine.cache().store("stage", "10.0.0.2 api.stage\n").await.unwrap();
    store.update("dev", ProfilePatch::toggle(true)).unwrap();

    engine.reconcile().await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
    assert_eq!(
        on_disk,
        format!("127.0.0.1 localhost\n\n\n\n{CURRENT_MARKER}\n\n10.0.0.1 api.dev")
    );

    // Enable the second one too.
    store.update("stage", ProfilePatch::toggle(true)).unwrap();
    engine.reconcile().await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
    assert!(on_disk.ends_with("10.0.0.1 api.dev\n\n\n10.0.0.2 api.stage"));

    // Trash both; region disappears.
    let out = store.trash_many(&["dev", "stage"], Some("dev")).unwrap();
    assert_eq!(out.selection, Selection::Moved(None));
    engine.reconcile().await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
    assert_eq!(on_disk, "127.0.0.1 localhost\n");

    // Restore brings the enabled state back.
    store.restore("dev").unwrap();
    engine.reconcile().await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
    assert!(on_disk.ends_with("10.0.0.1 api.dev"));
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = open(dir.path(), "127.0.0.1 localhost\n");
        engine.store().create(Profile::new("a", "A").enabled(true)).unwrap();
        engine.cache().store("a", "1.2.3.4 foo").await.unwrap();
        engine.store().create(Profile::new("b", "B")).unwrap();
        engine.store().trash("b", None).unwrap();
    }

    let config = SyncConfig::new(dir.path().join("data")).with_hosts_path(dir.path().join("hosts"));
    let engine = SyncEngine::open(&config, Arc::new(NoPrompt)).unwrap();
    let ids: Vec<_> = engine.store().list().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["0", "a"]);
    assert_eq!(engine.store().trash_list()[0].profile.id, "b");

    let done = engine.reconcile().await.unwrap();
    assert!(done.content.ends_with("1.2.3.4 foo"));
}

#[tokio::test]
async fn user_content_above_marker_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let user = "127.0.0.1 localhost\n# my own stuff\n192.168.1.10 nas\n";
    let engine = open(dir.path(), user);
    engine.store().create(Profile::new("a", "A").enabled(true)).unwrap();
    engine.cache().store("a", "1.2.3.4 foo").await.unwrap();

    for _ in 0..3 {
        engine.reconcile().await.unwrap();
    }
    let on_disk = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
    assert!(on_disk.starts_with(user.trim_end()));
    assert_eq!(on_disk.matches(CURRENT_MARKER).count(), 1);
}

#[tokio::test]
async fn history_records_changes_only() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path(), "127.0.0.1 localhost\n");
    engine.store().create(Profile::new("a", "A").enabled(true)).unwrap();
    engine.cache().store("a", "1.2.3.4 foo").await.unwrap();

    engine.reconcile().await.unwrap();
    engine.reconcile().await.unwrap();

    let history = HostsHistory::new(dir.path().join("data"), 50).list().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "127.0.0.1 localhost\n");
    assert!(history[1].content.ends_with("1.2.3.4 foo"));
}

#[tokio::test]
async fn legacy_folder_tree_is_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("list.json"),
        r#"[{"id":"f","title":"folder","on":false,"type":"folder",
            "children":[{"id":"c","title":"child","on":true,"type":"local"}]}]"#,
    )
    .unwrap();
    std::fs::write(data.join("hosts_content_c.txt"), "1.2.3.4 child").unwrap();

    let engine = open(dir.path(), "127.0.0.1 localhost\n");
    let done = engine.reconcile().await.unwrap();
    assert_eq!(
        done.content,
        format!("127.0.0.1 localhost\n\n\n\n{CURRENT_MARKER}\n\n1.2.3.4 child")
    );

    // The child can be switched off and the tree is written back intact.
    engine.store().update("c", ProfilePatch::toggle(false)).unwrap();
    assert_eq!(engine.reconcile().await.unwrap().content, "127.0.0.1 localhost\n");
    let raw = std::fs::read_to_string(data.join("list.json")).unwrap();
    let list: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(list[0]["children"][0]["id"], "c");
    assert_eq!(list[0]["children"][0]["on"], false);
    assert_eq!(list[0]["type"], "folder");
}

#[tokio::test]
async fn safe_mode_never_touches_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let hosts_path = dir.path().join("hosts");
    std::fs::write(&hosts_path, "127.0.0.1 localhost\n").unwrap();
    let config = SyncConfig::new(dir.path().join("data"))
        .with_hosts_path(&hosts_path)
        .with_safe_mode(true);
    let engine = SyncEngine::open(&config, Arc::new(NoPrompt)).unwrap();
    engine.store().create(Profile::new("a", "A").enabled(true)).unwrap();
    engine.cache().store("a", "1.2.3.4 foo").await.unwrap();

    let done = engine.reconcile().await.unwrap();
    assert!(done.content.ends_with("1.2.3.4 foo"));
    assert_eq!(
        std::fs::read_to_string(&hosts_path).unwrap(),
        "127.0.0.1 localhost\n"
    );
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires root to write /etc/hosts"]
async fn real_hosts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::new(dir.path());
    let engine = SyncEngine::open(&config, Arc::new(NoPrompt)).unwrap();
    let before = std::fs::read_to_string(&config.hosts_path).unwrap();

    engine.store().create(Profile::new("t", "T").enabled(true)).unwrap();
    engine.cache().store("t", "127.0.0.1 hosts-sync-test.invalid").await.unwrap();
    engine.reconcile().await.unwrap();
    assert!(std::fs::read_to_string(&config.hosts_path)
        .unwrap()
        .contains("hosts-sync-test.invalid"));

    engine.store().update("t", ProfilePatch::toggle(false)).unwrap();
    engine.reconcile().await.unwrap();
    let after = std::fs::read_to_string(&config.hosts_path).unwrap();
    assert!(!after.contains("hosts-sync-test.invalid"));
    assert_eq!(after.trim_end(), hosts_sync::splice::preserved_prefix(&before));
}
