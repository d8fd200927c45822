//! Snapshot restart paths: current snapshot, snapshot lagging the log,
//! missing snapshot, unreadable snapshot.

mod support;

use tempo::config::Config;
use tempo::event;
use tempo::log::EventLog;
use tempo::store::Restored;

use support::{seed_hierarchy, TestDir};

#[test]
fn current_snapshot_skips_replay() {
    let dir = TestDir::new();
    let state = {
        let store = dir.open_store();
        let (_, _, tasks) = seed_hierarchy(&store, &[2.0]);
        store.start_task(&tasks[0]).unwrap();
        store.state()
    };

    let (store, report) = dir.open_store_with(Config::default());
    assert_eq!(report.restored, Restored::Snapshot);
    assert_eq!(store.state(), state);
}

#[test]
fn missing_snapshot_falls_back_to_full_replay() {
    let dir = TestDir::new();
    let state = {
        let store = dir.open_store();
        let (_, _, tasks) = seed_hierarchy(&store, &[2.0]);
        store.start_task(&tasks[0]).unwrap();
        store.state()
    };

    std::fs::remove_file(dir.snapshot_file()).unwrap();
    let (store, report) = dir.open_store_with(Config::default());
    assert_eq!(report.restored, Restored::Replay);
    assert_eq!(store.state(), state);
}

#[test]
fn lagging_snapshot_folds_only_the_tail() {
    let dir = TestDir::new();
    {
        let store = dir.open_store();
        seed_hierarchy(&store, &[2.0]);
    }

    // Simulate a crash after a log append but before the snapshot write:
    // a new event lands in the log behind the snapshot's back.
    let (log, _) = EventLog::load(dir.events_file()).unwrap();
    log.append(event::project_created("prj-manual", "Manual", None))
        .unwrap();

    let (store, report) = dir.open_store_with(Config::default());
    assert_eq!(report.restored, Restored::SnapshotTail(1));
    assert!(store.state().projects.contains_key("prj-manual"));
}

#[test]
fn unreadable_snapshot_falls_back_to_full_replay() {
    let dir = TestDir::new();
    let state = {
        let store = dir.open_store();
        seed_hierarchy(&store, &[2.0, 3.0]);
        store.state()
    };

    std::fs::write(dir.snapshot_file(), "{definitely not json").unwrap();
    let (store, report) = dir.open_store_with(Config::default());
    assert_eq!(report.restored, Restored::Replay);
    assert_eq!(store.state(), state);
}

#[test]
fn snapshot_every_batches_saves() {
    let dir = TestDir::new();
    dir.write_config("[snapshot]\nevery = 100\n");
    let config = Config::load(&dir.storage().config_file()).unwrap();

    {
        let (store, _) = dir.open_store_with(config.clone());
        seed_hierarchy(&store, &[2.0]);
    }
    // Not enough folded events to hit the threshold: no snapshot yet.
    assert!(!dir.snapshot_file().exists());

    let (store, report) = dir.open_store_with(config);
    assert_eq!(report.restored, Restored::Replay);
    assert_eq!(store.state().tasks.len(), 1);
}

#[test]
fn stale_state_never_survives_restart() {
    // The snapshot reflects the log at save time; whatever happens to the
    // snapshot, reopening always converges on what the log says.
    let dir = TestDir::new();
    let final_state = {
        let store = dir.open_store();
        let (_, _, tasks) = seed_hierarchy(&store, &[2.0, 3.0]);
        store.start_task(&tasks[0]).unwrap();
        store.complete_task(&tasks[0], None).unwrap();
        store.state()
    };

    for _ in 0..3 {
        let (store, _) = dir.open_store_with(Config::default());
        assert_eq!(store.state(), final_state);
    }
}
