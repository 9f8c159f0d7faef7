//! Watch-mode runs: assignment, read-once termination, the directory watcher.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use logsend_core::{interpret, ConfigDocument, Group, ReadMode, RunSettings, SenderRegistry};
use logsend_tail::{
    assign_files, run_watch_until, CompletionCoordinator, CompletionOutcome, DirectoryWatcher,
    TaskOrigin, WatchOptions,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

use common::{sink_registry, wait_for, write_config};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn read_once() -> RunSettings {
    RunSettings {
        read_whole_log: true,
        read_once: true,
        ..RunSettings::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Read-once runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_once_run_delivers_named_captures_and_ends() {
    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("app.log"), "INFO boot\nERROR disk full\n").unwrap();
    std::fs::write(logs.path().join("other.txt"), "ERROR ignored\n").unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config = write_config(
        conf_dir.path(),
        &json!({
            "sink": {},
            "rules": [{"mask": "app\\.log", "rules": [
                {"regexp": "ERROR (?P<msg>.+)", "sink": {"template": "{{.msg}}"}}
            ]}]
        }),
    );
    let (registry, seen) = sink_registry();

    let options = WatchOptions {
        paths: vec![logs.path().to_path_buf()],
        config,
        settings: read_once(),
    };
    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        run_watch_until(options, registry, std::future::pending()),
    )
    .await
    .expect("run ends")
    .expect("run ok");

    assert_eq!(report.outcome, CompletionOutcome::AllFinished);
    assert_eq!((report.files, report.tasks), (2, 1));
    assert!(report.unflushed.is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0].get_str("msg"), Some("disk full"));
}

#[tokio::test]
async fn file_matched_by_two_masks_is_tailed_twice() {
    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("a.log"), "hit\n").unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config = write_config(
        conf_dir.path(),
        &json!({
            "sink": {},
            "groups": [
                {"mask": "a\\.log", "rules": [{"regexp": "(?P<first>hit)", "sink": {}}]},
                {"mask": ".*\\.log", "rules": [{"regexp": "(?P<second>hit)", "sink": {}}]}
            ]
        }),
    );
    let (registry, seen) = sink_registry();

    let options = WatchOptions {
        paths: vec![logs.path().to_path_buf()],
        config,
        settings: read_once(),
    };
    let report = run_watch_until(options, registry, std::future::pending())
        .await
        .expect("run ok");

    assert_eq!(report.tasks, 2);
    let seen = seen.lock().unwrap();
    let mut keys: Vec<_> = seen
        .iter()
        .flat_map(|m| m.fields().keys().cloned())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["first", "second"]);
}

#[tokio::test]
async fn read_once_with_no_matching_files_ends_immediately() {
    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("notes.txt"), "x\n").unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config = write_config(
        conf_dir.path(),
        &json!({"groups": [{"mask": "\\.log$", "rules": [{"regexp": "x"}]}]}),
    );
    let (registry, _) = sink_registry();

    let options = WatchOptions {
        paths: vec![logs.path().to_path_buf()],
        config,
        settings: read_once(),
    };
    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        run_watch_until(options, registry, std::future::pending()),
    )
    .await
    .expect("run ends")
    .expect("run ok");
    assert_eq!(report.tasks, 0);
    assert_eq!(report.outcome, CompletionOutcome::AllFinished);
}

#[tokio::test]
async fn follow_mode_runs_until_shutdown() {
    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("app.log"), "ERROR before start\n").unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config = write_config(
        conf_dir.path(),
        &json!({"sink": {}, "groups": [{"mask": "app", "rules": [{"regexp": "ERROR (?P<msg>.+)", "sink": {}}]}]}),
    );
    let (registry, _) = sink_registry();

    let options = WatchOptions {
        paths: vec![logs.path().to_path_buf()],
        config,
        settings: RunSettings::default(),
    };
    let report = run_watch_until(options, registry, tokio::time::sleep(Duration::from_millis(200)))
        .await
        .expect("run ok");
    assert_eq!(report.outcome, CompletionOutcome::Interrupted);
    assert_eq!(report.tasks, 1);
}

#[tokio::test]
async fn missing_config_is_an_error() {
    let logs = TempDir::new().unwrap();
    let (registry, _) = sink_registry();
    let options = WatchOptions {
        paths: vec![logs.path().to_path_buf()],
        config: logs.path().join("absent.json"),
        settings: read_once(),
    };
    let err = run_watch_until(options, registry, std::future::pending())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("absent.json"), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Directory watcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watcher_tasks_do_not_block_read_once_exit() {
    let logs = TempDir::new().unwrap();
    let initial = logs.path().join("initial.log");
    std::fs::write(&initial, "ERROR initial\n").unwrap();

    let doc = ConfigDocument::from_json(
        r#"{"sink": {}, "groups": [{"mask": "\\.log$", "rules": [{"regexp": "ERROR (?P<msg>.+)", "sink": {}}]}]}"#,
    )
    .unwrap();
    let (mut registry, seen) = sink_registry();
    let groups = interpret(&doc, &mut registry, &read_once())
        .unwrap()
        .into_groups();

    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let coordinator = CompletionCoordinator::new(1, true, done_rx);

    let watcher = DirectoryWatcher::install(logs.path()).expect("install watcher");
    let watcher_task = watcher.spawn(groups.clone(), ReadMode::WholeFollow, done_tx.clone());

    let created = logs.path().join("created.log");
    std::fs::File::create(&created).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(&created, "ERROR from watcher\n").unwrap();
    wait_for(&seen, 1).await;
    assert_eq!(seen.lock().unwrap()[0].get_str("msg"), Some("from watcher"));

    // The watcher-started task follows forever; only the initial task counts.
    for task in assign_files(&[initial], &groups, ReadMode::WholeOnce, TaskOrigin::Initial)
        .await
        .unwrap()
    {
        task.spawn(done_tx.clone());
    }
    drop(done_tx);

    let outcome = tokio::time::timeout(RUN_TIMEOUT, coordinator.wait(std::future::pending()))
        .await
        .expect("coordinator ends");
    assert_eq!(outcome, CompletionOutcome::AllFinished);
    assert_eq!(seen.lock().unwrap().len(), 2);
    watcher_task.abort();
}

fn follow_groups(registry: &mut SenderRegistry) -> Vec<Arc<Group>> {
    let doc = ConfigDocument::from_json(
        r#"{"sink": {}, "groups": [{"mask": "\\.log$", "rules": [{"regexp": "ERROR (?P<msg>.+)", "sink": {}}]}]}"#,
    )
    .unwrap();
    interpret(&doc, registry, &RunSettings::default())
        .unwrap()
        .into_groups()
}

#[tokio::test]
async fn created_file_is_read_from_its_first_line_when_following_from_end() {
    let logs = TempDir::new().unwrap();
    let (mut registry, seen) = sink_registry();
    let groups = follow_groups(&mut registry);
    let (done_tx, _done_rx) = mpsc::unbounded_channel();

    let watcher = DirectoryWatcher::install(logs.path()).expect("install watcher");
    let watcher_task = watcher.spawn(groups, ReadMode::FollowFromEnd, done_tx);

    std::fs::write(logs.path().join("new.log"), "ERROR first line
").unwrap();
    wait_for(&seen, 1).await;
    assert_eq!(seen.lock().unwrap()[0].get_str("msg"), Some("first line"));
    watcher_task.abort();
}

#[tokio::test]
async fn appending_to_a_tailed_file_starts_no_new_task() {
    let logs = TempDir::new().unwrap();
    let existing = logs.path().join("app.log");
    std::fs::write(&existing, "").unwrap();
    let (mut registry, seen) = sink_registry();
    let groups = follow_groups(&mut registry);
    let (done_tx, _done_rx) = mpsc::unbounded_channel();

    let watcher = DirectoryWatcher::install(logs.path()).expect("install watcher");
    let watcher_task = watcher.spawn(groups.clone(), ReadMode::WholeFollow, done_tx.clone());
    let tasks = assign_files(&[existing.clone()], &groups, ReadMode::WholeFollow, TaskOrigin::Initial)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    let handles: Vec<_> = tasks.into_iter().map(|task| task.spawn(done_tx.clone())).collect();

    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&existing).unwrap();
        writeln!(file, "ERROR appended").unwrap();
    }
    wait_for(&seen, 1).await;
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(seen.lock().unwrap().len(), 1, "line delivered by a single task");

    watcher_task.abort();
    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn continue_watch_with_file_root_is_accepted() {
    let logs = TempDir::new().unwrap();
    let file = logs.path().join("app.log");
    std::fs::write(&file, "x\n").unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config = write_config(
        conf_dir.path(),
        &json!({"groups": [{"mask": "app", "rules": [{"regexp": "x"}]}]}),
    );
    let (registry, _) = sink_registry();

    let options = WatchOptions {
        paths: vec![file],
        config,
        settings: RunSettings {
            continue_watch: true,
            ..read_once()
        },
    };
    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        run_watch_until(options, registry, std::future::pending()),
    )
    .await
    .expect("run ends")
    .expect("run ok");
    assert_eq!(report.outcome, CompletionOutcome::AllFinished);
}
