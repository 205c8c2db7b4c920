//! Admission scenarios against real host directories.
//!
//! Each test lays out a host root in a temp dir, registers jobs in a state
//! store, and runs the dispatcher the way a build queue would.

use std::path::Path;
use std::sync::Arc;

use spaceleft_admission::*;
use spaceleft_core::{JobSettings, SpaceLeftConfig};
use spaceleft_state::StateStore;

/// Slack for free space drifting between two measurements of a live filesystem.
const MEASUREMENT_TOLERANCE: u64 = 8 * 1024 * 1024;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_store() -> StateStore {
    StateStore::open_in_memory().unwrap()
}

fn add_workspace(root: &Path, dir: &str) {
    std::fs::create_dir_all(root.join("workspace").join(dir)).unwrap();
}

fn fixed(store: &StateStore, free: u64) -> SpaceLeftDispatcher {
    SpaceLeftDispatcher::new(Arc::new(store.clone()))
        .with_probe(Arc::new(FixedSpaceProbe(Some(free))))
}

#[test]
fn resident_job_reduces_remaining_space() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("main", &JobSettings::default()).unwrap();
    store.put_job("other", &JobSettings::enabled(2_000_000, 1.0)).unwrap();
    add_workspace(root.path(), "other");

    let dispatcher = SpaceLeftDispatcher::new(Arc::new(store));
    let host = Host::agent("agent-1", root.path());

    let free = dispatcher.free_space(&host).bytes();
    let result = dispatcher.can_take(&host, &BuildableItem::new("main"));

    let expected = free.saturating_sub(2_000_000);
    assert!(
        result.remaining_space_bytes.abs_diff(expected) < MEASUREMENT_TOLERANCE,
        "remaining {} too far from expected {expected}",
        result.remaining_space_bytes
    );
    if free > 2_000_000 + MEASUREMENT_TOLERANCE {
        assert!(result.allowed);
    }
}

#[test]
fn explicit_override_and_resident_jobs() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("main", &JobSettings::enabled(1_000_000, 1.0)).unwrap();
    store.put_job("other", &JobSettings::enabled(2_000_000, 1.0)).unwrap();
    add_workspace(root.path(), "other");

    let dispatcher = fixed(&store, 100_000_000);
    let host = Host::agent("agent-1", root.path());

    let plain = dispatcher.can_take(&host, &BuildableItem::new("main"));
    assert_eq!(plain.remaining_space_bytes, 97_000_000);

    let item = BuildableItem::new("main").with_parameter(REQUIRED_SPACE_PARAMETER, "3000000");
    let overridden = dispatcher.can_take(&host, &item);
    assert!(overridden.allowed);
    assert_eq!(overridden.remaining_space_bytes, 95_000_000);
}

#[test]
fn candidate_workspaces_are_not_charged_to_itself() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("job", &JobSettings::enabled(2_000_000, 1.0)).unwrap();
    add_workspace(root.path(), "job@2");
    add_workspace(root.path(), "job@3");

    let dispatcher = fixed(&store, 10_000_000);
    let host = Host::agent("agent-1", root.path());

    assert_eq!(dispatcher.aggregator().aggregate(&host, &store, Some("job")), 0);
    assert_eq!(dispatcher.aggregator().aggregate(&host, &store, None), 4_000_000);

    // Only its own requirement counts against the candidate.
    let result = dispatcher.can_take(&host, &BuildableItem::new("job"));
    assert_eq!(result.remaining_space_bytes, 8_000_000);

    // A different job pays for both workspaces.
    let result = dispatcher.can_take(&host, &BuildableItem::new("newcomer"));
    assert_eq!(result.remaining_space_bytes, 6_000_000);
}

#[test]
fn custom_combinator_counts_every_copy() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("spaceConsumer", &JobSettings::enabled(2_000_000, 1.0)).unwrap();

    let dispatcher = fixed(&store, 50_000_000).with_scanner(WorkspaceScanner::new("_", "workspace"));
    let host = Host::agent("agent-1", root.path());
    assert_eq!(dispatcher.aggregator().aggregate(&host, &store, None), 0);

    add_workspace(root.path(), "spaceConsumer");
    assert_eq!(dispatcher.aggregator().aggregate(&host, &store, None), 2_000_000);

    add_workspace(root.path(), "spaceConsumer_2");
    add_workspace(root.path(), "spaceConsumer_3");
    assert_eq!(dispatcher.aggregator().aggregate(&host, &store, None), 6_000_000);
}

#[test]
fn oversized_resident_job_blocks_host() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("hog", &JobSettings::enabled(u64::MAX / 4, 1.0)).unwrap();
    add_workspace(root.path(), "hog");

    let dispatcher = fixed(&store, 10_000_000);
    let result = dispatcher.can_take(&Host::agent("agent-1", root.path()), &BuildableItem::new("main"));

    assert!(!result.allowed);
    assert_eq!(result.remaining_space_bytes, 0);
    assert!(result.block_reason.unwrap().contains("agent-1"));
}

#[test]
fn orphaned_workspaces_are_free() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    add_workspace(root.path(), "deleted-job");
    add_workspace(root.path(), "deleted-job@2");

    let dispatcher = fixed(&store, 1_000);
    let result = dispatcher.can_take(&Host::agent("agent-1", root.path()), &BuildableItem::new("main"));
    assert_eq!(result.remaining_space_bytes, 1_000);
}

#[test]
fn decision_is_stable_across_calls() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("other", &JobSettings::enabled(1_000, 1.0)).unwrap();
    add_workspace(root.path(), "other");

    let dispatcher = SpaceLeftDispatcher::new(Arc::new(store));
    let host = Host::agent("agent-1", root.path());
    let item = BuildableItem::new("main");

    let first = dispatcher.can_take(&host, &item);
    let second = dispatcher.can_take(&host, &item);
    assert_eq!(first.allowed, second.allowed);
}

#[test]
fn primary_node_skips_accounting() {
    let store = test_store();
    store.put_job("main", &JobSettings::enabled(u64::MAX, 1.0)).unwrap();

    let dispatcher = SpaceLeftDispatcher::new(Arc::new(store))
        .with_probe(Arc::new(FixedSpaceProbe(None)));
    let result = dispatcher.can_take(&Host::primary("built-in", "/"), &BuildableItem::new("main"));
    assert!(result.allowed);
}

#[test]
fn config_file_drives_dispatcher() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("spaceleft.toml");
    std::fs::write(
        &config_path,
        r#"
[workspace]
combinator = "@"

[jobs.other]
use_required_space = true
required_space = 1000
factor = 2.0
"#,
    )
    .unwrap();
    add_workspace(root.path(), "other@5");

    let config = SpaceLeftConfig::from_file(&config_path).unwrap();
    let dispatcher = SpaceLeftDispatcher::from_config(&config)
        .with_probe(Arc::new(FixedSpaceProbe(Some(5_000))));

    let result = dispatcher.can_take(&Host::agent("agent-1", root.path()), &BuildableItem::new("main"));
    assert_eq!(result.remaining_space_bytes, 3_000);
}

#[tokio::test]
async fn async_hook_matches_sync_hook() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store();
    store.put_job("other", &JobSettings::enabled(400, 1.0)).unwrap();
    add_workspace(root.path(), "other");

    let dispatcher = fixed(&store, 1_000);
    let host = Host::agent("agent-1", root.path());
    let item = BuildableItem::new("main").with_parameter(REQUIRED_SPACE_PARAMETER, "100");

    let sync_result = dispatcher.can_take(&host, &item);
    let async_result = dispatcher.can_take_async(host, item).await;
    assert_eq!(sync_result, async_result);
    assert_eq!(async_result.remaining_space_bytes, 500);
}
