mod support;

use std::sync::Arc;

use support::{config, saved_snapshot, FlakyReadStore, Harness, TestDir};
use tasks_tracker::events::{GameState, HostAction, HostEvent, ProfileType};
use tasks_tracker::merge::load_and_merge;
use tasks_tracker::session::{HostInfo, TrackerSession};
use tasks_tracker::storage::{
    ConfigStore, FileConfigStore, MemoryConfigStore, ProfileScope, TrackerDataStore,
};
use tasks_tracker::task::{StaticTaskSource, TaskRegistry, TaskType};

fn store_with(task_type: TaskType, blob: &str) -> Arc<MemoryConfigStore> {
    let store = Arc::new(MemoryConfigStore::new());
    store
        .set_blob(&ProfileScope::default(), task_type.name(), blob.as_bytes())
        .unwrap();
    store
}

#[test]
fn saved_flags_are_restored_on_login() {
    let store = store_with(
        TaskType::Combat,
        r#"{"3":{"tracked":true,"completed":false},"500":{"tracked":true,"completed":true}}"#,
    );
    let mut h = Harness::with_store(config(TaskType::Combat), store);

    h.login(0);

    assert!(h.session.registry().get(TaskType::Combat, 3).unwrap().tracked());
    let saved = h.saved(TaskType::Combat).unwrap();
    assert_eq!(saved.tasks.len(), 96);
    assert!(saved.tasks[&3].tracked);
    assert!(!saved.tasks.contains_key(&500));
}

#[test]
fn live_varps_override_saved_completion() {
    let store = store_with(
        TaskType::Combat,
        r#"{"4":{"tracked":true,"completed":true}}"#,
    );
    let mut h = Harness::with_store(config(TaskType::Combat), store);

    h.login(0);

    let task = h.session.registry().get(TaskType::Combat, 4).unwrap();
    assert!(!task.completed());
    assert!(task.tracked());
}

#[test]
fn unreadable_blob_is_left_in_place() {
    let store = store_with(TaskType::Combat, "this is not json");
    let mut h = Harness::with_store(config(TaskType::Combat), store.clone());

    h.login(0);

    let blob = store
        .get_blob(&ProfileScope::default(), "COMBAT")
        .unwrap()
        .unwrap();
    assert_eq!(blob, b"this is not json");
    assert!(h.saved(TaskType::League4).is_some());
}

#[test]
fn failed_read_on_relogin_keeps_in_memory_flags() {
    let store = Arc::new(MemoryConfigStore::new());
    let flaky = Arc::new(FlakyReadStore::new(store.clone()));
    let mut h = Harness::with_config_store(config(TaskType::Combat), store, flaky.clone());
    h.login(0);
    h.session.toggle_tracked(TaskType::Combat, 5).unwrap();

    flaky.fail_reads(true);
    h.game_state(GameState::LoginScreen);
    h.game_state(GameState::LoggingIn);
    h.tick(1_000);

    assert!(h.session.registry().get(TaskType::Combat, 5).unwrap().tracked());

    h.change_varp(9001, 0b1);
    h.tick(9_000);

    let saved = h.saved(TaskType::Combat).unwrap();
    assert!(saved.tasks[&0].completed);
    assert!(saved.tasks[&5].tracked);
}

#[test]
fn reloaded_definitions_keep_saved_flags() {
    let mut h = Harness::new(config(TaskType::Combat));
    h.login(0);
    h.session.toggle_tracked(TaskType::Combat, 5).unwrap();

    let source = StaticTaskSource::new().with(TaskType::Combat, support::definitions(10));
    let actions = h.session.reload_definitions(&source);

    assert_eq!(actions, vec![HostAction::refresh_all()]);
    assert_eq!(h.session.registry().manager(TaskType::Combat).len(), 10);
    assert!(h.session.registry().get(TaskType::Combat, 5).unwrap().tracked());
    assert_eq!(h.saved(TaskType::Combat).unwrap().tasks.len(), 10);
}

#[test]
fn whitespace_blob_is_an_empty_snapshot() {
    let store = store_with(TaskType::League4, "  \n");
    let mut registry = TaskRegistry::load_all(&support::source());
    let data = TrackerDataStore::new(store.clone());

    let report = load_and_merge(
        &data,
        &ProfileScope::default(),
        &mut registry,
        TaskType::League4,
    )
    .unwrap();

    assert_eq!(report.applied, 0);
    assert!(report.resaved);
    let saved = saved_snapshot(&store, &ProfileScope::default(), TaskType::League4).unwrap();
    assert_eq!(saved.tasks.len(), 64);
}

#[test]
fn merge_without_definitions_does_not_overwrite() {
    let store = store_with(TaskType::Combat, r#"{"1":{"tracked":true,"completed":false}}"#);
    let mut registry = TaskRegistry::new();
    let data = TrackerDataStore::new(store.clone());

    let report = load_and_merge(&data, &ProfileScope::default(), &mut registry, TaskType::Combat)
        .unwrap();

    assert!(!report.resaved);
    assert_eq!(report.dropped, 1);
    let saved = saved_snapshot(&store, &ProfileScope::default(), TaskType::Combat).unwrap();
    assert!(saved.tasks[&1].tracked);
}

#[test]
fn accounts_keep_separate_data() {
    let mut h = Harness::new(config(TaskType::Combat));
    h.event(HostEvent::GameStateChanged {
        state: GameState::LoggingIn,
        profile: ProfileType::Standard,
        account: Some("alice".to_string()),
    });
    h.tick(0);
    h.session.toggle_tracked(TaskType::Combat, 2).unwrap();

    let alice = ProfileScope::new(Some("alice"), ProfileType::Standard);
    assert_eq!(h.session.scope(), alice);
    let saved = saved_snapshot(&h.store, &alice, TaskType::Combat).unwrap();
    assert!(saved.tasks[&2].tracked);
    assert!(h.saved(TaskType::Combat).is_none());
}

#[test]
fn deferred_file_saves_land_on_shutdown() {
    let dir = TestDir::new();
    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(dir.store_dir()));
    let data = TrackerDataStore::deferred(store.clone()).unwrap();
    let mut session = TrackerSession::start(
        config(TaskType::Combat),
        &support::source(),
        data,
        HostInfo::default(),
    )
    .with_decoder(support::decoder());

    session.toggle_tracked(TaskType::Combat, 9).unwrap();
    session.shutdown(&std::collections::HashMap::<u32, i32>::new());

    let path = dir
        .store_dir()
        .join("default.standard")
        .join("COMBAT.json");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(saved["9"]["tracked"], true);
    assert_eq!(saved["9"]["completed"], false);
}
