mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use support::TestDir;
use tasks_tracker::task::TaskType;

fn tracker(dir: &TestDir) -> Command {
    let mut cmd = Command::cargo_bin("tasks-tracker").expect("binary");
    cmd.env_remove("TASKS_TRACKER_CONFIG")
        .env_remove("TASKS_TRACKER_ACCOUNT")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(dir.store_dir())
        .arg("--definitions")
        .arg(dir.definitions_dir());
    cmd
}

fn with_combat_definitions() -> TestDir {
    let dir = TestDir::new();
    dir.write_definitions(TaskType::Combat, 96)
        .expect("definitions");
    dir
}

#[test]
fn help_works() {
    Command::cargo_bin("tasks-tracker")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("tasks-tracker"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["replay", "export", "import", "summary", "track"] {
        Command::cargo_bin("tasks-tracker")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn summary_reports_loaded_definitions() {
    let dir = with_combat_definitions();
    tracker(&dir)
        .args(["--task-type", "combat", "--json", "summary"])
        .assert()
        .success()
        .stdout(contains("\"total_tasks\": 96"))
        .stdout(contains("\"schema_version\": \"tasks-tracker.v1\""));
}

#[test]
fn track_then_summary_counts_tracked_task() {
    let dir = with_combat_definitions();
    tracker(&dir)
        .args(["--task-type", "combat", "--json", "track", "5"])
        .assert()
        .success()
        .stdout(contains("\"tracked\": true"));

    tracker(&dir)
        .args(["--task-type", "combat", "summary"])
        .assert()
        .success()
        .stdout(contains("Combat Tasks"))
        .stdout(contains("- tracked: 1 (1 points)"));
}

#[test]
fn track_unknown_task_is_a_user_error() {
    let dir = with_combat_definitions();
    tracker(&dir)
        .args(["--task-type", "combat", "--json", "track", "4000"])
        .assert()
        .code(2)
        .stdout(contains("\"kind\": \"user_error\""));
}

#[test]
fn import_then_export_round_trips_through_the_store() {
    let dir = with_combat_definitions();
    let input = dir
        .write_file(
            "import.json",
            r#"{"tasks":{"3":{"completed":true,"tracked":true}}}"#,
        )
        .expect("import file");

    tracker(&dir)
        .args(["--task-type", "combat", "import", "--yes"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("applied: 1"));

    tracker(&dir)
        .args(["--task-type", "combat", "export"])
        .assert()
        .success()
        .stdout(contains("\"taskType\": \"COMBAT\""))
        .stdout(contains("\"3116\": 8"));
}

#[test]
fn unwritable_store_fails_import_and_track() {
    let dir = with_combat_definitions();
    let store_file = dir.write_file("store-file", "not a directory").expect("store file");
    let input = dir
        .write_file("import.json", r#"{"tasks":{"3":{"tracked":true}}}"#)
        .expect("import file");

    Command::cargo_bin("tasks-tracker")
        .expect("binary")
        .env_remove("TASKS_TRACKER_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(&store_file)
        .arg("--definitions")
        .arg(dir.definitions_dir())
        .args(["--task-type", "combat", "import", "--yes"])
        .arg(&input)
        .assert()
        .code(4)
        .stdout(contains("updated").not())
        .stderr(contains("Failed to persist COMBAT"));

    Command::cargo_bin("tasks-tracker")
        .expect("binary")
        .env_remove("TASKS_TRACKER_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(&store_file)
        .arg("--definitions")
        .arg(dir.definitions_dir())
        .args(["--task-type", "combat", "track", "3"])
        .assert()
        .code(4);
}

#[test]
fn blank_import_is_rejected() {
    let dir = with_combat_definitions();
    tracker(&dir)
        .args(["import", "-", "--yes"])
        .write_stdin("   \n")
        .assert()
        .code(3)
        .stderr(contains("Input was empty so no data has been imported."));
}

#[test]
fn replay_emits_host_actions() {
    let dir = with_combat_definitions();
    let events = dir
        .write_file(
            "events.jsonl",
            concat!(
                "{\"event\":\"game_state_changed\",\"state\":\"LOGGING_IN\"}\n",
                "{\"record\":\"varp_set\",\"varp_id\":3116,\"value\":5}\n",
                "{\"record\":\"tick\",\"at_ms\":0}\n",
                "{\"record\":\"varp_set\",\"varp_id\":3117,\"value\":1}\n",
                "{\"event\":\"varp_changed\",\"varp_id\":3117}\n",
                "{\"record\":\"tick\",\"at_ms\":600}\n",
                "{\"record\":\"tick\",\"at_ms\":7001}\n",
                "{\"record\":\"totals\"}\n",
            ),
        )
        .expect("events file");

    tracker(&dir)
        .args(["--task-type", "combat", "replay"])
        .arg(&events)
        .assert()
        .success()
        .stdout(contains("\"action\":\"set_logged_in\""))
        .stdout(contains("\"scope\":\"all\""))
        .stdout(contains("\"id\":32"))
        .stdout(contains("Task Tracker - Tracked Tasks: 0 | Tracked Points: 0"))
        .stdout(contains("\"id\":33").not());
}

#[test]
fn replay_rejects_garbage_lines() {
    let dir = with_combat_definitions();
    let events = dir
        .write_file("events.jsonl", "{\"nope\":true}\n")
        .expect("events file");

    tracker(&dir)
        .arg("replay")
        .arg(&events)
        .assert()
        .code(2)
        .stderr(contains("line 1"));
}

#[test]
fn unknown_task_type_is_rejected() {
    let dir = TestDir::new();
    tracker(&dir)
        .args(["--task-type", "league9", "summary"])
        .assert()
        .failure();
}
