//! Status cascade and statistics for tempo.
//!
//! Composite statuses are pure functions of child statuses. When a task
//! changes, the owning milestone recomputes, then the owning project. The
//! fold applies the recomputed statuses in place and reports what changed
//! so the command layer can append matching derived events; a recomputed
//! status equal to the stored one is suppressed entirely.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::Status;
use crate::state::AppState;

/// A composite status change produced by the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub target: CascadeTarget,
    pub from: Status,
    pub to: Status,
}

/// Which composite entity a cascade change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeTarget {
    Milestone(String),
    Project(String),
}

/// Composite status from child statuses. Precedence, first match wins:
/// Completed (all of ≥1), InProgress (any), Blocked (any), NotStarted.
pub fn composite_status<I>(children: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut any = false;
    let mut all_completed = true;
    let mut any_in_progress = false;
    let mut any_blocked = false;

    for status in children {
        any = true;
        match status {
            Status::Completed => {}
            Status::InProgress => {
                all_completed = false;
                any_in_progress = true;
            }
            Status::Blocked => {
                all_completed = false;
                any_blocked = true;
            }
            Status::NotStarted => {
                all_completed = false;
            }
        }
    }

    if any && all_completed {
        Status::Completed
    } else if any_in_progress {
        Status::InProgress
    } else if any_blocked {
        Status::Blocked
    } else {
        Status::NotStarted
    }
}

/// The task transition table. Anything outside it is rejected; commands
/// run this before an event is created so illegal transitions never reach
/// the log.
pub fn check_transition(from: Status, to: Status) -> Result<()> {
    let legal = matches!(
        (from, to),
        (Status::NotStarted, Status::InProgress)
            | (Status::InProgress, Status::Blocked)
            | (Status::Blocked, Status::InProgress)
            | (Status::InProgress, Status::Completed)
    );
    if legal {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Recompute a milestone's status from its tasks, then its project's status
/// from its milestones. Mutates `state` in place and returns the changes in
/// application order (milestone first). `at` stamps `completed_date` when a
/// milestone enters Completed.
pub fn cascade_from_milestone(
    state: &mut AppState,
    milestone_id: &str,
    at: DateTime<Utc>,
) -> Vec<StatusChange> {
    let mut changes = Vec::new();

    let Some(milestone) = state.milestones.get(milestone_id) else {
        return changes;
    };
    let recomputed = composite_status(state.task_statuses(milestone));
    let current = milestone.status;

    if recomputed != current {
        if let Some(milestone) = state.milestones.get_mut(milestone_id) {
            milestone.status = recomputed;
            milestone.completed_date = if recomputed == Status::Completed {
                Some(at)
            } else {
                None
            };
            changes.push(StatusChange {
                target: CascadeTarget::Milestone(milestone_id.to_string()),
                from: current,
                to: recomputed,
            });
        }
    }

    if let Some(project_id) = state.project_of_milestone(milestone_id).map(str::to_string) {
        if let Some(change) = cascade_project(state, &project_id) {
            changes.push(change);
        }
    }

    changes
}

/// Recompute a project's status from its milestones. Returns the change if
/// the status actually moved.
pub fn cascade_project(state: &mut AppState, project_id: &str) -> Option<StatusChange> {
    let project = state.projects.get(project_id)?;
    let recomputed = composite_status(state.milestone_statuses(project));
    let current = project.status;
    if recomputed == current {
        return None;
    }

    let project = state.projects.get_mut(project_id)?;
    project.status = recomputed;
    Some(StatusChange {
        target: CascadeTarget::Project(project_id.to_string()),
        from: current,
        to: recomputed,
    })
}

/// Recompute aggregate statistics over all tasks. The average keeps its
/// prior value when no completed task carries a usable duration, so it is
/// never divided by zero and never NaN.
pub fn recompute_statistics(state: &mut AppState) {
    let mut total_tasks = 0u64;
    let mut completed_tasks = 0u64;
    let mut total_points = 0.0f64;
    let mut earned_points = 0.0f64;
    let mut hours = 0.0f64;

    for task in state.tasks.values() {
        total_tasks += 1;
        total_points += task.estimated_points;
        if task.status == Status::Completed {
            completed_tasks += 1;
            earned_points += task.earned_points();
            if let Some(duration) = task.duration_hours() {
                hours += duration;
            }
        }
    }

    let stats = &mut state.statistics;
    stats.total_tasks = total_tasks;
    stats.completed_tasks = completed_tasks;
    stats.total_points = total_points;
    stats.earned_points = earned_points;
    if hours > 0.0 {
        stats.average_points_per_hour = earned_points / hours;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status::*;

    #[test]
    fn all_completed_wins() {
        assert_eq!(composite_status([Completed, Completed]), Completed);
    }

    #[test]
    fn in_progress_beats_blocked() {
        assert_eq!(composite_status([Blocked, InProgress]), InProgress);
        assert_eq!(composite_status([Completed, Completed, InProgress]), InProgress);
    }

    #[test]
    fn blocked_without_in_progress() {
        assert_eq!(composite_status([Completed, Blocked]), Blocked);
        assert_eq!(composite_status([NotStarted, Blocked]), Blocked);
    }

    #[test]
    fn zero_children_is_not_started() {
        assert_eq!(composite_status([]), NotStarted);
    }

    #[test]
    fn completed_plus_not_started_is_not_started() {
        assert_eq!(composite_status([Completed, NotStarted]), NotStarted);
    }

    #[test]
    fn transition_table_is_closed() {
        assert!(check_transition(NotStarted, InProgress).is_ok());
        assert!(check_transition(InProgress, Blocked).is_ok());
        assert!(check_transition(Blocked, InProgress).is_ok());
        assert!(check_transition(InProgress, Completed).is_ok());

        assert!(check_transition(NotStarted, Completed).is_err());
        assert!(check_transition(NotStarted, Blocked).is_err());
        assert!(check_transition(Blocked, Completed).is_err());
        assert!(check_transition(Completed, InProgress).is_err());
        assert!(check_transition(Completed, NotStarted).is_err());
        assert!(check_transition(InProgress, NotStarted).is_err());
        for status in Status::ALL {
            assert!(check_transition(status, status).is_err());
        }
    }
}
