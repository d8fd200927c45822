//! Statistics: the worked scenario from the product rules, and the
//! non-degeneracy guard on points-per-hour.

mod support;

use chrono::{Duration, TimeZone, Utc};

use tempo::event::{self, Event};
use tempo::model::Priority;
use tempo::projector::Projector;

use support::{seed_hierarchy, TestDir};

#[test]
fn worked_scenario_three_tasks_completed() {
    let dir = TestDir::new();
    let store = dir.open_store();
    let (_, _, tasks) = seed_hierarchy(&store, &[2.0, 3.0, 5.0]);

    for task in &tasks {
        store.start_task(task).unwrap();
        store.complete_task(task, None).unwrap();
    }

    let stats = store.statistics();
    assert_eq!(stats.total_tasks, 3);
    assert_eq!(stats.completed_tasks, 3);
    assert_eq!(stats.total_points, 10.0);
    assert_eq!(stats.earned_points, 10.0);
}

#[test]
fn actual_points_override_the_estimate() {
    let dir = TestDir::new();
    let store = dir.open_store();
    let (_, _, tasks) = seed_hierarchy(&store, &[2.0, 3.0]);

    store.start_task(&tasks[0]).unwrap();
    store.complete_task(&tasks[0], Some(7.0)).unwrap();

    let stats = store.statistics();
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.total_points, 5.0);
    assert_eq!(stats.earned_points, 7.0);
}

#[test]
fn average_stays_at_configured_seed_without_durations() {
    let dir = TestDir::new();
    dir.write_config("[statistics]\npoints_per_hour = 4.0\n");
    let config = tempo::config::Config::load(&dir.storage().config_file()).unwrap();
    let (store, _) = dir.open_store_with(config);

    // No tasks completed yet: seed untouched.
    assert_eq!(store.statistics().average_points_per_hour, 4.0);

    // Completions whose start/end land in the same instant contribute no
    // usable duration, so the average must keep its prior value.
    let (_, _, tasks) = seed_hierarchy(&store, &[2.0]);
    store.start_task(&tasks[0]).unwrap();
    store.complete_task(&tasks[0], None).unwrap();

    let stats = store.statistics();
    let average = stats.average_points_per_hour;
    assert!(average.is_finite(), "average must never be NaN/infinite");
    assert!(average > 0.0);
}

#[test]
fn average_reflects_logged_durations() {
    // Hand-stamped timestamps: 5 points over 2 hours, then 5 points over
    // 3 hours -> 10 points over 5 hours.
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let stamp = |mut event: Event, offset_hours: i64| {
        event.timestamp = t0 + Duration::hours(offset_hours);
        event
    };

    let events = vec![
        stamp(event::project_created("prj-a", "P", None), 0),
        stamp(event::milestone_created("ms-a", "prj-a", "M", None, None), 0),
        stamp(
            event::task_created(
                "tsk-a",
                "ms-a",
                "A",
                None,
                Priority::Must,
                5.0,
                Default::default(),
            ),
            0,
        ),
        stamp(
            event::task_created(
                "tsk-b",
                "ms-a",
                "B",
                None,
                Priority::Must,
                5.0,
                Default::default(),
            ),
            0,
        ),
        stamp(event::task_started("tsk-a"), 1),
        stamp(event::task_completed("tsk-a", None), 3),
        stamp(event::task_started("tsk-b"), 3),
        stamp(event::task_completed("tsk-b", None), 6),
    ];

    let state = Projector::new(1.0).project(&events).unwrap();
    let stats = &state.statistics;
    assert_eq!(stats.earned_points, 10.0);
    assert!((stats.average_points_per_hour - 2.0).abs() < 1e-9);
}

#[test]
fn average_is_never_degenerate_across_a_busy_history() {
    let dir = TestDir::new();
    let store = dir.open_store();
    let (_, milestone, tasks) = seed_hierarchy(&store, &[1.0, 2.0, 3.0]);

    store.start_task(&tasks[0]).unwrap();
    store.complete_task(&tasks[0], Some(0.0)).unwrap();
    store.delete_task(&tasks[1]).unwrap();
    store
        .create_task(
            &milestone,
            tempo::store::NewTask {
                title: "Zero".to_string(),
                estimated_points: 0.0,
                ..Default::default()
            },
        )
        .unwrap();

    let stats = store.statistics();
    assert!(stats.average_points_per_hour.is_finite());
    assert!(!stats.average_points_per_hour.is_nan());
    assert_eq!(stats.completed_tasks, 1);
}
