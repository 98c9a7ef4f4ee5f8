mod support;

use serde_json::Value;
use support::{config, Harness};
use tasks_tracker::error::exit_codes;
use tasks_tracker::events::{DialogKind, HostAction};
use tasks_tracker::session::{import_failure_action, IMPORT_CONFIRM_MESSAGE};
use tasks_tracker::task::TaskType;
use tasks_tracker::transfer::OS_LEAGUE_TOOLS_IMPORT_URL;
use tasks_tracker::Error;

#[test]
fn clipboard_export_carries_tasks_and_varps() {
    let mut h = Harness::new(config(TaskType::Combat));
    h.set_varp(9003, 0b101);
    h.login(0);
    h.session.toggle_tracked(TaskType::Combat, 1).unwrap();

    let actions = h
        .session
        .copy_export_to_clipboard(TaskType::Combat, &h.client)
        .unwrap();

    assert_eq!(actions.len(), 2);
    assert_eq!(
        actions[1],
        HostAction::ShowDialog {
            title: "Data Exported!".to_string(),
            message: "Exported Combat Tasks data copied to clipboard!".to_string(),
            kind: DialogKind::Information,
            link: Some(OS_LEAGUE_TOOLS_IMPORT_URL.to_string()),
        }
    );
    let HostAction::CopyToClipboard { text } = &actions[0] else {
        panic!("expected clipboard action, got {:?}", actions[0]);
    };

    let doc: Value = serde_json::from_str(text).unwrap();
    assert_eq!(doc["taskType"], "COMBAT");
    assert_eq!(doc["clientVersion"], "test-client");
    assert_eq!(doc["profileType"], "STANDARD");
    assert!(doc["pluginVersion"].is_string());
    assert!(doc["timestamp"].is_string());
    assert_eq!(doc["varps"]["9003"], 5);
    assert_eq!(doc["varps"]["9001"], 0);
    assert_eq!(doc["tasks"].as_object().unwrap().len(), 96);
    assert_eq!(doc["tasks"]["64"]["completed"], true);
    assert_eq!(doc["tasks"]["65"]["completed"], false);
    assert_eq!(doc["tasks"]["1"]["tracked"], true);
    assert_eq!(doc["tasks"]["1"]["name"], "Task 1");
}

#[test]
fn export_all_dumps_every_task_type() {
    let mut h = Harness::new(config(TaskType::Combat));
    h.session.toggle_tracked(TaskType::League3, 2).unwrap();

    let json = h.session.export(None, &h.client).to_json().unwrap();
    let doc: Value = serde_json::from_str(&json).unwrap();

    let types = doc.as_object().unwrap();
    assert_eq!(types.len(), 3);
    assert_eq!(doc["COMBAT"]["taskType"], "COMBAT");
    assert_eq!(doc["LEAGUE_4"]["tasks"].as_object().unwrap().len(), 64);
    assert_eq!(doc["LEAGUE_3"]["tasks"]["2"]["tracked"], true);
    assert!(doc["COMBAT"].get("varps").is_none());
}

#[test]
fn import_overwrites_selected_task_type() {
    let mut h = Harness::new(config(TaskType::League4));
    h.session.toggle_tracked(TaskType::League4, 1).unwrap();

    let pending = h
        .session
        .begin_import(
            r#"{"tasks":{"1":{"tracked":false,"completed":true},"2":{"todo":1690000000000},"999":{"tracked":true}}}"#,
        )
        .unwrap();
    assert_eq!(pending.task_type(), TaskType::League4);
    assert_eq!(
        pending.confirmation(),
        HostAction::dialog("Import Tasks", IMPORT_CONFIRM_MESSAGE, DialogKind::Warning)
    );

    let report = h.session.finish_import(pending, true).unwrap().unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.ignored, 1);
    let one = h.session.registry().get(TaskType::League4, 1).unwrap();
    assert!(one.completed() && !one.tracked());
    assert!(h.session.registry().get(TaskType::League4, 2).unwrap().tracked());
    assert!(!h.session.registry().get(TaskType::Combat, 2).unwrap().tracked());

    let saved = h.saved(TaskType::League4).unwrap();
    assert!(saved.tasks[&1].completed);
    assert!(saved.tasks[&2].tracked);
}

#[test]
fn declined_import_changes_nothing() {
    let mut h = Harness::new(config(TaskType::League4));
    let writes = h.store.write_count();

    let pending = h
        .session
        .begin_import(r#"{"tasks":{"1":{"tracked":true}}}"#)
        .unwrap();
    assert!(h.session.finish_import(pending, false).unwrap().is_none());

    assert!(!h.session.registry().get(TaskType::League4, 1).unwrap().tracked());
    assert_eq!(h.store.write_count(), writes);
}

#[test]
fn blank_import_is_rejected_with_dialog() {
    let h = Harness::new(config(TaskType::League4));

    let err = h.session.begin_import("  \n\t").unwrap_err();

    assert!(matches!(err, Error::EmptyImportInput));
    assert_eq!(err.exit_code(), exit_codes::IMPORT_REJECTED);
    assert_eq!(
        import_failure_action(&err),
        HostAction::dialog(
            "Import Tasks Error",
            "Input was empty so no data has been imported.",
            DialogKind::Error
        )
    );
}

#[test]
fn malformed_import_is_rejected() {
    let h = Harness::new(config(TaskType::League4));

    let err = h.session.begin_import("{\"tasks\": [").unwrap_err();

    assert!(matches!(err, Error::MalformedImportDocument(_)));
    assert_eq!(err.exit_code(), exit_codes::IMPORT_REJECTED);
}

#[test]
fn exported_document_imports_into_another_profile() {
    let mut source = Harness::new(config(TaskType::Combat));
    source.set_varp(9001, 0b1000);
    source.login(0);
    source.session.toggle_tracked(TaskType::Combat, 12).unwrap();
    let exported = source
        .session
        .export(Some(TaskType::Combat), &source.client)
        .to_json()
        .unwrap();

    let mut target = Harness::new(config(TaskType::Combat));
    let pending = target.session.begin_import(&exported).unwrap();
    let report = target.session.finish_import(pending, true).unwrap().unwrap();

    assert_eq!(report.applied, 96);
    let combat = target.session.registry().manager(TaskType::Combat);
    assert!(combat.get(3).unwrap().completed());
    assert!(combat.get(12).unwrap().tracked());
    assert_eq!(
        combat.summary(),
        source.session.registry().manager(TaskType::Combat).summary()
    );
}
