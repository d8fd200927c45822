//! State projection for tempo.
//!
//! `fold` applies one event to the derived state; `project` replays a whole
//! log from the canonical empty state, in log order. Append order is
//! authoritative; event timestamps are informational only.
//!
//! The fold is total over the closed event set. Events referencing entities
//! missing from the projection (for example because an earlier record was
//! corrupt and skipped) are logged and ignored rather than failing the
//! replay; an unsupported payload version is fatal (`UnknownEventError`)
//! because guessing would leave the state silently inconsistent with the
//! log.
//!
//! The status cascade runs as part of folding task events. During replay
//! the reported changes are discarded: the log already contains the derived
//! status events, and folding those is a no-op when the cascade has applied
//! them.

use tracing::warn;

use crate::cascade::{self, StatusChange};
use crate::error::{Error, Result};
use crate::event::{Event, EventBody, MilestoneEvent, ProjectEvent, TaskEvent, EVENT_VERSION};
use crate::model::{Milestone, Project, Status, Task};
use crate::state::AppState;

/// Replays events into `AppState`. Holds the statistics seed so replay from
/// empty is fully determined by the log plus configuration.
#[derive(Debug, Clone)]
pub struct Projector {
    stats_seed: f64,
}

impl Projector {
    pub fn new(stats_seed: f64) -> Self {
        Self { stats_seed }
    }

    /// The canonical empty state.
    pub fn empty(&self) -> AppState {
        AppState::empty(self.stats_seed)
    }

    /// Full replay in log order.
    pub fn project(&self, events: &[Event]) -> Result<AppState> {
        let mut state = self.empty();
        for event in events {
            self.fold(&mut state, event)?;
        }
        Ok(state)
    }

    /// Apply one event. Returns the composite status changes the cascade
    /// produced, for the command layer to turn into derived events.
    pub fn fold(&self, state: &mut AppState, event: &Event) -> Result<Vec<StatusChange>> {
        if event.version != EVENT_VERSION {
            return Err(Error::UnknownEvent {
                kind: event.kind().as_str().to_string(),
                version: event.version,
            });
        }

        match &event.body {
            EventBody::Project(body) => self.fold_project(state, event, body),
            EventBody::Milestone(body) => self.fold_milestone(state, event, body),
            EventBody::Task(body) => self.fold_task(state, event, body),
        }
    }

    fn fold_project(
        &self,
        state: &mut AppState,
        event: &Event,
        body: &ProjectEvent,
    ) -> Result<Vec<StatusChange>> {
        match body {
            ProjectEvent::ProjectCreated {
                project_id,
                title,
                description,
            } => {
                if state.projects.contains_key(project_id) {
                    warn!(project = %project_id, "duplicate project_created ignored");
                    return Ok(Vec::new());
                }
                state.projects.insert(
                    project_id.clone(),
                    Project {
                        id: project_id.clone(),
                        title: title.clone(),
                        description: description.clone(),
                        status: Status::NotStarted,
                        created_at: event.timestamp,
                        updated_at: event.timestamp,
                        milestone_ids: Vec::new(),
                    },
                );
            }
            ProjectEvent::ProjectEdited {
                project_id,
                title,
                description,
            } => {
                let Some(project) = state.projects.get_mut(project_id) else {
                    warn!(project = %project_id, "project_edited for unknown project ignored");
                    return Ok(Vec::new());
                };
                if let Some(title) = title {
                    project.title = title.clone();
                }
                if let Some(description) = description {
                    project.description = Some(description.clone());
                }
                project.updated_at = event.timestamp;
            }
            ProjectEvent::ProjectStatusChanged { project_id, status } => {
                let Some(project) = state.projects.get_mut(project_id) else {
                    warn!(project = %project_id, "project_status_changed for unknown project ignored");
                    return Ok(Vec::new());
                };
                if project.status != *status {
                    project.status = *status;
                    project.updated_at = event.timestamp;
                }
            }
            ProjectEvent::ProjectDeleted { project_id } => {
                let Some(project) = state.projects.remove(project_id) else {
                    warn!(project = %project_id, "project_deleted for unknown project ignored");
                    return Ok(Vec::new());
                };
                for milestone_id in &project.milestone_ids {
                    if let Some(milestone) = state.milestones.remove(milestone_id) {
                        for task_id in &milestone.task_ids {
                            state.tasks.remove(task_id);
                            remove_task_from_deps(state, task_id);
                            state.relations.purge_task(task_id);
                        }
                    }
                    remove_milestone_from_deps(state, milestone_id);
                    state.relations.purge_milestone(milestone_id);
                }
                cascade::recompute_statistics(state);
            }
        }
        Ok(Vec::new())
    }

    fn fold_milestone(
        &self,
        state: &mut AppState,
        event: &Event,
        body: &MilestoneEvent,
    ) -> Result<Vec<StatusChange>> {
        match body {
            MilestoneEvent::MilestoneCreated {
                milestone_id,
                project_id,
                title,
                description,
                due_date,
            } => {
                if state.milestones.contains_key(milestone_id) {
                    warn!(milestone = %milestone_id, "duplicate milestone_created ignored");
                    return Ok(Vec::new());
                }
                let Some(project) = state.projects.get_mut(project_id) else {
                    warn!(
                        milestone = %milestone_id,
                        project = %project_id,
                        "milestone_created for unknown project ignored"
                    );
                    return Ok(Vec::new());
                };
                project.milestone_ids.push(milestone_id.clone());
                project.updated_at = event.timestamp;
                state.milestones.insert(
                    milestone_id.clone(),
                    Milestone {
                        id: milestone_id.clone(),
                        title: title.clone(),
                        description: description.clone(),
                        status: Status::NotStarted,
                        due_date: *due_date,
                        completed_date: None,
                        task_ids: Vec::new(),
                        depends_on: Default::default(),
                    },
                );
                state
                    .relations
                    .project_of
                    .insert(milestone_id.clone(), project_id.clone());
                let mut changes = Vec::new();
                if let Some(change) = cascade::cascade_project(state, project_id) {
                    changes.push(change);
                }
                return Ok(changes);
            }
            MilestoneEvent::MilestoneEdited {
                milestone_id,
                title,
                description,
                due_date,
            } => {
                let Some(milestone) = state.milestones.get_mut(milestone_id) else {
                    warn!(milestone = %milestone_id, "milestone_edited for unknown milestone ignored");
                    return Ok(Vec::new());
                };
                if let Some(title) = title {
                    milestone.title = title.clone();
                }
                if let Some(description) = description {
                    milestone.description = Some(description.clone());
                }
                if let Some(due_date) = due_date {
                    milestone.due_date = Some(*due_date);
                }
            }
            MilestoneEvent::MilestoneStatusChanged {
                milestone_id,
                status,
            } => {
                let Some(milestone) = state.milestones.get_mut(milestone_id) else {
                    warn!(milestone = %milestone_id, "milestone_status_changed for unknown milestone ignored");
                    return Ok(Vec::new());
                };
                if milestone.status == *status {
                    return Ok(Vec::new());
                }
                milestone.status = *status;
                milestone.completed_date = if *status == Status::Completed {
                    Some(event.timestamp)
                } else {
                    None
                };
                // Keep the owning project consistent even when the log came
                // from a writer that did not record the project-level event.
                let mut changes = Vec::new();
                if let Some(project_id) =
                    state.project_of_milestone(milestone_id).map(str::to_string)
                {
                    if let Some(change) = cascade::cascade_project(state, &project_id) {
                        changes.push(change);
                    }
                }
                return Ok(changes);
            }
            MilestoneEvent::MilestoneDeleted { milestone_id } => {
                let Some(milestone) = state.milestones.remove(milestone_id) else {
                    warn!(milestone = %milestone_id, "milestone_deleted for unknown milestone ignored");
                    return Ok(Vec::new());
                };
                for task_id in &milestone.task_ids {
                    state.tasks.remove(task_id);
                    remove_task_from_deps(state, task_id);
                    state.relations.purge_task(task_id);
                }
                let owner = state.project_of_milestone(milestone_id).map(str::to_string);
                remove_milestone_from_deps(state, milestone_id);
                state.relations.purge_milestone(milestone_id);
                let mut changes = Vec::new();
                if let Some(project_id) = owner {
                    if let Some(project) = state.projects.get_mut(&project_id) {
                        project.milestone_ids.retain(|id| id != milestone_id);
                        project.updated_at = event.timestamp;
                    }
                    if let Some(change) = cascade::cascade_project(state, &project_id) {
                        changes.push(change);
                    }
                }
                cascade::recompute_statistics(state);
                return Ok(changes);
            }
            MilestoneEvent::MilestoneDependencyAdded {
                milestone_id,
                depends_on,
            } => {
                let Some(milestone) = state.milestones.get_mut(milestone_id) else {
                    warn!(milestone = %milestone_id, "milestone_dependency_added for unknown milestone ignored");
                    return Ok(Vec::new());
                };
                milestone.depends_on.insert(depends_on.clone());
                state
                    .relations
                    .milestone_deps
                    .entry(milestone_id.clone())
                    .or_default()
                    .insert(depends_on.clone());
            }
            MilestoneEvent::MilestoneDependencyRemoved {
                milestone_id,
                depends_on,
            } => {
                let Some(milestone) = state.milestones.get_mut(milestone_id) else {
                    warn!(milestone = %milestone_id, "milestone_dependency_removed for unknown milestone ignored");
                    return Ok(Vec::new());
                };
                milestone.depends_on.remove(depends_on);
                if let Some(deps) = state.relations.milestone_deps.get_mut(milestone_id) {
                    deps.remove(depends_on);
                    if deps.is_empty() {
                        state.relations.milestone_deps.remove(milestone_id);
                    }
                }
            }
        }
        Ok(Vec::new())
    }

    fn fold_task(
        &self,
        state: &mut AppState,
        event: &Event,
        body: &TaskEvent,
    ) -> Result<Vec<StatusChange>> {
        match body {
            TaskEvent::TaskCreated {
                task_id,
                milestone_id,
                title,
                description,
                priority,
                estimated_points,
                tags,
            } => {
                if state.tasks.contains_key(task_id) {
                    warn!(task = %task_id, "duplicate task_created ignored");
                    return Ok(Vec::new());
                }
                let Some(milestone) = state.milestones.get_mut(milestone_id) else {
                    warn!(
                        task = %task_id,
                        milestone = %milestone_id,
                        "task_created for unknown milestone ignored"
                    );
                    return Ok(Vec::new());
                };
                milestone.task_ids.push(task_id.clone());
                state.tasks.insert(
                    task_id.clone(),
                    Task {
                        id: task_id.clone(),
                        title: title.clone(),
                        description: description.clone(),
                        status: Status::NotStarted,
                        priority: *priority,
                        estimated_points: *estimated_points,
                        actual_points: None,
                        start_time: None,
                        end_time: None,
                        blocked_reason: None,
                        tags: tags.clone(),
                        depends_on: Default::default(),
                    },
                );
                state
                    .relations
                    .milestone_of
                    .insert(task_id.clone(), milestone_id.clone());
                let changes = cascade::cascade_from_milestone(state, milestone_id, event.timestamp);
                cascade::recompute_statistics(state);
                return Ok(changes);
            }
            TaskEvent::TaskEdited {
                task_id,
                title,
                description,
                estimated_points,
                tags,
            } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_edited for unknown task ignored");
                    return Ok(Vec::new());
                };
                if let Some(title) = title {
                    task.title = title.clone();
                }
                if let Some(description) = description {
                    task.description = Some(description.clone());
                }
                if let Some(points) = estimated_points {
                    task.estimated_points = *points;
                }
                if let Some(tags) = tags {
                    task.tags = tags.clone();
                }
                cascade::recompute_statistics(state);
            }
            TaskEvent::TaskStarted { task_id } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_started for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.status = Status::InProgress;
                task.start_time = Some(event.timestamp);
                return Ok(self.cascade_owner(state, task_id, event));
            }
            TaskEvent::TaskBlocked { task_id, reason } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_blocked for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.status = Status::Blocked;
                task.blocked_reason = Some(reason.clone());
                return Ok(self.cascade_owner(state, task_id, event));
            }
            TaskEvent::TaskUnblocked { task_id } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_unblocked for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.status = Status::InProgress;
                task.blocked_reason = None;
                return Ok(self.cascade_owner(state, task_id, event));
            }
            TaskEvent::TaskCompleted {
                task_id,
                actual_points,
            } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_completed for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.status = Status::Completed;
                task.end_time = Some(event.timestamp);
                task.actual_points = Some(actual_points.unwrap_or(task.estimated_points));
                let changes = self.cascade_owner(state, task_id, event);
                cascade::recompute_statistics(state);
                return Ok(changes);
            }
            TaskEvent::TaskDeleted { task_id } => {
                if state.tasks.remove(task_id).is_none() {
                    warn!(task = %task_id, "task_deleted for unknown task ignored");
                    return Ok(Vec::new());
                }
                let owner = state.milestone_of_task(task_id).map(str::to_string);
                remove_task_from_deps(state, task_id);
                state.relations.purge_task(task_id);
                let mut changes = Vec::new();
                if let Some(milestone_id) = owner {
                    if let Some(milestone) = state.milestones.get_mut(&milestone_id) {
                        milestone.task_ids.retain(|id| id != task_id);
                    }
                    changes =
                        cascade::cascade_from_milestone(state, &milestone_id, event.timestamp);
                }
                cascade::recompute_statistics(state);
                return Ok(changes);
            }
            TaskEvent::TaskDependencyAdded {
                task_id,
                depends_on,
            } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_dependency_added for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.depends_on.insert(depends_on.clone());
                state
                    .relations
                    .task_deps
                    .entry(task_id.clone())
                    .or_default()
                    .insert(depends_on.clone());
            }
            TaskEvent::TaskDependencyRemoved {
                task_id,
                depends_on,
            } => {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    warn!(task = %task_id, "task_dependency_removed for unknown task ignored");
                    return Ok(Vec::new());
                };
                task.depends_on.remove(depends_on);
                if let Some(deps) = state.relations.task_deps.get_mut(task_id) {
                    deps.remove(depends_on);
                    if deps.is_empty() {
                        state.relations.task_deps.remove(task_id);
                    }
                }
            }
        }
        Ok(Vec::new())
    }

    fn cascade_owner(&self, state: &mut AppState, task_id: &str, event: &Event) -> Vec<StatusChange> {
        match state.milestone_of_task(task_id).map(str::to_string) {
            Some(milestone_id) => {
                cascade::cascade_from_milestone(state, &milestone_id, event.timestamp)
            }
            None => Vec::new(),
        }
    }
}

/// Remove a deleted task from other tasks' `depends_on` sets.
fn remove_task_from_deps(state: &mut AppState, task_id: &str) {
    for task in state.tasks.values_mut() {
        task.depends_on.remove(task_id);
    }
}

/// Remove a deleted milestone from other milestones' `depends_on` sets.
fn remove_milestone_from_deps(state: &mut AppState, milestone_id: &str) {
    for milestone in state.milestones.values_mut() {
        milestone.depends_on.remove(milestone_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use crate::model::Priority;
    use std::collections::BTreeSet;

    fn projector() -> Projector {
        Projector::new(1.0)
    }

    fn seed_events() -> Vec<Event> {
        vec![
            event::project_created("prj-a", "Project", None),
            event::milestone_created("ms-a", "prj-a", "Milestone", None, None),
            event::task_created(
                "tsk-a",
                "ms-a",
                "Task",
                None,
                Priority::Must,
                2.0,
                BTreeSet::new(),
            ),
        ]
    }

    #[test]
    fn replay_builds_the_hierarchy() {
        let state = projector().project(&seed_events()).unwrap();
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.milestones.len(), 1);
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.projects["prj-a"].milestone_ids, vec!["ms-a"]);
        assert_eq!(state.milestones["ms-a"].task_ids, vec!["tsk-a"]);
        assert_eq!(state.relations.project_of["ms-a"], "prj-a");
        assert_eq!(state.relations.milestone_of["tsk-a"], "ms-a");
        assert_eq!(state.statistics.total_tasks, 1);
        assert_eq!(state.statistics.total_points, 2.0);
    }

    #[test]
    fn starting_a_task_cascades_up() {
        let p = projector();
        let mut state = p.project(&seed_events()).unwrap();
        let changes = p.fold(&mut state, &event::task_started("tsk-a")).unwrap();
        assert_eq!(state.tasks["tsk-a"].status, Status::InProgress);
        assert_eq!(state.milestones["ms-a"].status, Status::InProgress);
        assert_eq!(state.projects["prj-a"].status, Status::InProgress);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn derived_status_event_is_a_no_op_after_cascade() {
        let p = projector();
        let mut state = p.project(&seed_events()).unwrap();
        p.fold(&mut state, &event::task_started("tsk-a")).unwrap();
        let changes = p
            .fold(
                &mut state,
                &event::milestone_status_changed("ms-a", Status::InProgress),
            )
            .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn duplicate_create_is_tolerated() {
        let p = projector();
        let mut events = seed_events();
        events.push(event::project_created("prj-a", "Other title", None));
        let state = p.project(&events).unwrap();
        assert_eq!(state.projects["prj-a"].title, "Project");
    }

    #[test]
    fn unsupported_version_is_fatal() {
        let p = projector();
        let mut state = p.empty();
        let mut event = event::project_created("prj-a", "Project", None);
        event.version = 99;
        let err = p.fold(&mut state, &event).unwrap_err();
        assert!(matches!(err, Error::UnknownEvent { version: 99, .. }));
    }

    #[test]
    fn delete_project_tombstones_the_subtree() {
        let p = projector();
        let mut events = seed_events();
        events.push(event::project_deleted("prj-a"));
        let state = p.project(&events).unwrap();
        assert!(state.projects.is_empty());
        assert!(state.milestones.is_empty());
        assert!(state.tasks.is_empty());
        assert!(state.relations.project_of.is_empty());
        assert!(state.relations.milestone_of.is_empty());
        assert_eq!(state.statistics.total_tasks, 0);
    }

    #[test]
    fn completing_all_tasks_completes_the_chain() {
        let p = projector();
        let mut state = p.project(&seed_events()).unwrap();
        p.fold(&mut state, &event::task_started("tsk-a")).unwrap();
        let changes = p
            .fold(&mut state, &event::task_completed("tsk-a", None))
            .unwrap();
        assert_eq!(state.tasks["tsk-a"].status, Status::Completed);
        assert_eq!(state.milestones["ms-a"].status, Status::Completed);
        assert!(state.milestones["ms-a"].completed_date.is_some());
        assert_eq!(state.projects["prj-a"].status, Status::Completed);
        assert_eq!(changes.len(), 2);
        assert_eq!(state.statistics.completed_tasks, 1);
        assert_eq!(state.statistics.earned_points, 2.0);
    }
}
