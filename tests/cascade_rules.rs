//! Cascade correctness over all child status combinations.
//!
//! Enumerates every status vector for a milestone's tasks (lengths 0..=3)
//! and for a project's milestones (lengths 0..=2), checks the derived
//! composite status against the precedence rules, and verifies no-op
//! suppression of derived events through the store.

mod support;

use tempo::cascade::composite_status;
use tempo::event::{self, Event, EventKind};
use tempo::model::{Priority, Status};
use tempo::projector::Projector;

use support::{seed_hierarchy, TestDir};

const STATUSES: [Status; 4] = [
    Status::NotStarted,
    Status::InProgress,
    Status::Completed,
    Status::Blocked,
];

/// The precedence rules, stated independently of the implementation.
fn oracle(children: &[Status]) -> Status {
    if !children.is_empty() && children.iter().all(|s| *s == Status::Completed) {
        Status::Completed
    } else if children.iter().any(|s| *s == Status::InProgress) {
        Status::InProgress
    } else if children.iter().any(|s| *s == Status::Blocked) {
        Status::Blocked
    } else {
        Status::NotStarted
    }
}

fn status_vectors(len: usize) -> Vec<Vec<Status>> {
    if len == 0 {
        return vec![Vec::new()];
    }
    let mut vectors = Vec::new();
    for shorter in status_vectors(len - 1) {
        for status in STATUSES {
            let mut vector = shorter.clone();
            vector.push(status);
            vectors.push(vector);
        }
    }
    vectors
}

/// Events that drive one task to the target status via legal transitions.
fn task_events(task_id: &str, milestone_id: &str, target: Status) -> Vec<Event> {
    let mut events = vec![event::task_created(
        task_id,
        milestone_id,
        task_id,
        None,
        Priority::Must,
        1.0,
        Default::default(),
    )];
    match target {
        Status::NotStarted => {}
        Status::InProgress => events.push(event::task_started(task_id)),
        Status::Blocked => {
            events.push(event::task_started(task_id));
            events.push(event::task_blocked(task_id, "held"));
        }
        Status::Completed => {
            events.push(event::task_started(task_id));
            events.push(event::task_completed(task_id, None));
        }
    }
    events
}

#[test]
fn milestone_status_matches_oracle_for_all_task_vectors() {
    let projector = Projector::new(1.0);

    for len in 0..=3 {
        for vector in status_vectors(len) {
            let mut events = vec![
                event::project_created("prj-a", "P", None),
                event::milestone_created("ms-a", "prj-a", "M", None, None),
            ];
            for (index, target) in vector.iter().enumerate() {
                events.extend(task_events(&format!("tsk-{index}"), "ms-a", *target));
            }

            let state = projector.project(&events).unwrap();
            let expected = oracle(&vector);
            assert_eq!(
                state.milestones["ms-a"].status, expected,
                "task statuses {vector:?}"
            );
            assert_eq!(composite_status(vector.iter().copied()), expected);
        }
    }
}

#[test]
fn project_status_matches_oracle_for_all_milestone_vectors() {
    let projector = Projector::new(1.0);

    for len in 0..=2 {
        for vector in status_vectors(len) {
            let mut events = vec![event::project_created("prj-a", "P", None)];
            for (index, target) in vector.iter().enumerate() {
                let milestone_id = format!("ms-{index}");
                events.push(event::milestone_created(
                    &milestone_id,
                    "prj-a",
                    &milestone_id,
                    None,
                    None,
                ));
                events.extend(task_events(&format!("tsk-{index}"), &milestone_id, *target));
            }

            let state = projector.project(&events).unwrap();
            for (index, target) in vector.iter().enumerate() {
                assert_eq!(state.milestones[&format!("ms-{index}")].status, *target);
            }
            assert_eq!(
                state.projects["prj-a"].status,
                oracle(&vector),
                "milestone statuses {vector:?}"
            );
        }
    }
}

#[test]
fn spec_examples_hold() {
    // milestone [Completed, Completed, InProgress] -> InProgress
    assert_eq!(
        oracle(&[Status::Completed, Status::Completed, Status::InProgress]),
        Status::InProgress
    );
    // project [Completed, Blocked] -> Blocked
    assert_eq!(oracle(&[Status::Completed, Status::Blocked]), Status::Blocked);
    // zero children -> NotStarted
    assert_eq!(oracle(&[]), Status::NotStarted);

    assert_eq!(
        composite_status([Status::Completed, Status::Completed, Status::InProgress]),
        Status::InProgress
    );
    assert_eq!(
        composite_status([Status::Completed, Status::Blocked]),
        Status::Blocked
    );
    assert_eq!(composite_status([]), Status::NotStarted);
}

#[test]
fn derived_events_are_suppressed_when_status_does_not_move() {
    let dir = TestDir::new();
    let store = dir.open_store();
    let (_, _, tasks) = seed_hierarchy(&store, &[1.0, 1.0]);

    // First start flips milestone and project to InProgress.
    store.start_task(&tasks[0]).unwrap();
    let derived_after_first = count_derived(&store.events());

    // Second start changes nothing at the composite level.
    store.start_task(&tasks[1]).unwrap();
    let derived_after_second = count_derived(&store.events());

    assert_eq!(derived_after_first, 2);
    assert_eq!(derived_after_second, 2);
}

fn count_derived(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                event.kind(),
                EventKind::MilestoneStatusChanged | EventKind::ProjectStatusChanged
            )
        })
        .count()
}
