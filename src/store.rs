//! Command layer for tempo.
//!
//! `Store` is the single writer over one event log. Every command follows
//! the same pipeline: validate against the current projection, create the
//! event(s), fold them on a scratch copy of the state collecting derived
//! status changes, durably append the whole batch (primary plus derived),
//! swap the scratch state in, update the snapshot, and publish
//! notifications. A persistence failure leaves memory untouched, so the
//! in-memory view never reflects writes that are not on disk.
//!
//! Rejected commands (validation, unknown id, cycle) never reach the log.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cascade::{self, CascadeTarget};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{self, Event, EventKind};
use crate::graph;
use crate::id;
use crate::log::{CorruptLine, EventLog};
use crate::model::{Milestone, Priority, Project, Statistics, Status, Task};
use crate::notify::{EventSink, Notifier};
use crate::projector::Projector;
use crate::snapshot::SnapshotStore;
use crate::state::AppState;
use crate::storage::Storage;

/// How the state was restored on open.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Restored {
    /// Snapshot was current with the log.
    Snapshot,
    /// Snapshot plus a fold of the log tail (count of tail events).
    SnapshotTail(usize),
    /// Full replay of the log.
    Replay,
}

/// What `Store::open` found and did.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpenReport {
    pub events: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrupt: Vec<CorruptLine>,
    pub restored: Restored,
}

/// New-project input.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: String,
    pub description: Option<String>,
}

/// Project edit input; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// New-milestone input.
#[derive(Debug, Clone, Default)]
pub struct NewMilestone {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Milestone edit input; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct MilestonePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// New-task input.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub estimated_points: f64,
    pub tags: BTreeSet<String>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            priority: Priority::Must,
            estimated_points: 1.0,
            tags: BTreeSet::new(),
        }
    }
}

/// Task edit input; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_points: Option<f64>,
    pub tags: Option<BTreeSet<String>>,
}

#[derive(Debug)]
struct Inner {
    log: EventLog,
    state: AppState,
    /// Events folded into `state`, i.e. the log length at last fold.
    applied: usize,
    since_snapshot: usize,
}

/// Single-writer store over one event log.
#[derive(Debug)]
pub struct Store {
    config: Config,
    projector: Projector,
    snapshots: SnapshotStore,
    notifier: Notifier,
    inner: Mutex<Inner>,
}

impl Store {
    /// Open the store rooted at `storage`, restoring state from snapshot
    /// and/or log replay.
    pub fn open(storage: &Storage, config: Config) -> Result<(Self, OpenReport)> {
        let (log, load_report) = EventLog::load(storage.events_file())?;
        let events = log.all();
        let projector = Projector::new(config.statistics.points_per_hour);
        let snapshots = SnapshotStore::new(storage.snapshot_file());

        let (state, restored, since_snapshot) = match snapshots.load()? {
            Some(snapshot) if snapshot.applied <= events.len() => {
                let tail = &events[snapshot.applied..];
                let mut state = snapshot.state;
                for event in tail {
                    projector.fold(&mut state, event)?;
                }
                if tail.is_empty() {
                    (state, Restored::Snapshot, 0)
                } else {
                    (state, Restored::SnapshotTail(tail.len()), tail.len())
                }
            }
            Some(_) => {
                // Snapshot claims more events than the log holds; the log
                // is authoritative.
                tracing::warn!("snapshot is ahead of the log, replaying from empty");
                (projector.project(&events)?, Restored::Replay, events.len())
            }
            None => (projector.project(&events)?, Restored::Replay, events.len()),
        };

        let applied = events.len();
        let report = OpenReport {
            events: applied,
            corrupt: load_report.corrupt,
            restored,
        };

        Ok((
            Self {
                config,
                projector,
                snapshots,
                notifier: Notifier::new(),
                inner: Mutex::new(Inner {
                    log,
                    state,
                    applied,
                    since_snapshot,
                }),
            },
            report,
        ))
    }

    // =========================================================================
    // Project commands
    // =========================================================================

    pub fn create_project(&self, input: NewProject) -> Result<Project> {
        let title = required_title(&input.title)?;
        let mut inner = self.lock();
        let project_id = id::generate(id::PROJECT_PREFIX, self.config.ids.suffix_len, |id| {
            inner.state.projects.contains_key(id)
        });
        self.commit(
            &mut inner,
            vec![event::project_created(
                &project_id,
                title,
                input.description,
            )],
        )?;
        self.project_snapshot(&inner, &project_id)
    }

    pub fn edit_project(&self, id_input: &str, patch: ProjectPatch) -> Result<Project> {
        let title = optional_title(patch.title)?;
        if title.is_none() && patch.description.is_none() {
            return Err(Error::Validation("nothing to edit".to_string()));
        }
        let mut inner = self.lock();
        let project_id = resolve(&inner.state.projects, "project", id_input)?;
        self.commit(
            &mut inner,
            vec![event::project_edited(&project_id, title, patch.description)],
        )?;
        self.project_snapshot(&inner, &project_id)
    }

    pub fn delete_project(&self, id_input: &str) -> Result<Project> {
        let mut inner = self.lock();
        let project_id = resolve(&inner.state.projects, "project", id_input)?;
        let removed = self.project_snapshot(&inner, &project_id)?;
        self.commit(&mut inner, vec![event::project_deleted(&project_id)])?;
        Ok(removed)
    }

    // =========================================================================
    // Milestone commands
    // =========================================================================

    pub fn create_milestone(&self, project_input: &str, input: NewMilestone) -> Result<Milestone> {
        let title = required_title(&input.title)?;
        let mut inner = self.lock();
        let project_id = resolve(&inner.state.projects, "project", project_input)?;
        let milestone_id = id::generate(id::MILESTONE_PREFIX, self.config.ids.suffix_len, |id| {
            inner.state.milestones.contains_key(id)
        });
        self.commit(
            &mut inner,
            vec![event::milestone_created(
                &milestone_id,
                &project_id,
                title,
                input.description,
                input.due_date,
            )],
        )?;
        self.milestone_snapshot(&inner, &milestone_id)
    }

    pub fn edit_milestone(&self, id_input: &str, patch: MilestonePatch) -> Result<Milestone> {
        let title = optional_title(patch.title)?;
        if title.is_none() && patch.description.is_none() && patch.due_date.is_none() {
            return Err(Error::Validation("nothing to edit".to_string()));
        }
        let mut inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", id_input)?;
        self.commit(
            &mut inner,
            vec![event::milestone_edited(
                &milestone_id,
                title,
                patch.description,
                patch.due_date,
            )],
        )?;
        self.milestone_snapshot(&inner, &milestone_id)
    }

    pub fn delete_milestone(&self, id_input: &str) -> Result<Milestone> {
        let mut inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", id_input)?;
        let removed = self.milestone_snapshot(&inner, &milestone_id)?;
        self.commit(&mut inner, vec![event::milestone_deleted(&milestone_id)])?;
        Ok(removed)
    }

    pub fn add_milestone_dependency(
        &self,
        id_input: &str,
        depends_on_input: &str,
    ) -> Result<Milestone> {
        let mut inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", id_input)?;
        let depends_on = resolve(&inner.state.milestones, "milestone", depends_on_input)?;
        let milestone = milestone_ref(&inner.state, &milestone_id)?;
        if milestone.depends_on.contains(&depends_on) {
            return Err(Error::Validation(format!(
                "{milestone_id} already depends on {depends_on}"
            )));
        }
        if graph::would_create_cycle(&inner.state.relations.milestone_deps, &milestone_id, &depends_on)
        {
            return Err(Error::Cycle {
                from: milestone_id,
                to: depends_on,
            });
        }
        self.commit(
            &mut inner,
            vec![event::milestone_dependency_added(&milestone_id, &depends_on)],
        )?;
        self.milestone_snapshot(&inner, &milestone_id)
    }

    pub fn remove_milestone_dependency(
        &self,
        id_input: &str,
        depends_on_input: &str,
    ) -> Result<Milestone> {
        let mut inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", id_input)?;
        let depends_on = resolve(&inner.state.milestones, "milestone", depends_on_input)?;
        let milestone = milestone_ref(&inner.state, &milestone_id)?;
        if !milestone.depends_on.contains(&depends_on) {
            return Err(Error::Validation(format!(
                "{milestone_id} does not depend on {depends_on}"
            )));
        }
        self.commit(
            &mut inner,
            vec![event::milestone_dependency_removed(
                &milestone_id,
                &depends_on,
            )],
        )?;
        self.milestone_snapshot(&inner, &milestone_id)
    }

    // =========================================================================
    // Task commands
    // =========================================================================

    pub fn create_task(&self, milestone_input: &str, input: NewTask) -> Result<Task> {
        let title = required_title(&input.title)?;
        check_points(input.estimated_points)?;
        let mut inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", milestone_input)?;
        let task_id = id::generate(id::TASK_PREFIX, self.config.ids.suffix_len, |id| {
            inner.state.tasks.contains_key(id)
        });
        self.commit(
            &mut inner,
            vec![event::task_created(
                &task_id,
                &milestone_id,
                title,
                input.description,
                input.priority,
                input.estimated_points,
                input.tags,
            )],
        )?;
        self.task_snapshot(&inner, &task_id)
    }

    pub fn edit_task(&self, id_input: &str, patch: TaskPatch) -> Result<Task> {
        let title = optional_title(patch.title)?;
        if title.is_none()
            && patch.description.is_none()
            && patch.estimated_points.is_none()
            && patch.tags.is_none()
        {
            return Err(Error::Validation("nothing to edit".to_string()));
        }
        if let Some(points) = patch.estimated_points {
            check_points(points)?;
        }
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        self.commit(
            &mut inner,
            vec![event::task_edited(
                &task_id,
                title,
                patch.description,
                patch.estimated_points,
                patch.tags,
            )],
        )?;
        self.task_snapshot(&inner, &task_id)
    }

    pub fn delete_task(&self, id_input: &str) -> Result<Task> {
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let removed = self.task_snapshot(&inner, &task_id)?;
        self.commit(&mut inner, vec![event::task_deleted(&task_id)])?;
        Ok(removed)
    }

    /// NotStarted -> InProgress; stamps `start_time`.
    pub fn start_task(&self, id_input: &str) -> Result<Task> {
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        match task.status {
            Status::NotStarted => {}
            Status::Blocked => {
                return Err(Error::Validation(format!(
                    "task {task_id} is blocked; unblock it instead"
                )));
            }
            other => {
                return Err(Error::InvalidTransition {
                    from: other,
                    to: Status::InProgress,
                });
            }
        }
        self.commit(&mut inner, vec![event::task_started(&task_id)])?;
        self.task_snapshot(&inner, &task_id)
    }

    /// InProgress -> Blocked; a reason is required.
    pub fn block_task(&self, id_input: &str, reason: &str) -> Result<Task> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation(
                "a reason is required to block a task".to_string(),
            ));
        }
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        cascade::check_transition(task.status, Status::Blocked)?;
        self.commit(&mut inner, vec![event::task_blocked(&task_id, reason)])?;
        self.task_snapshot(&inner, &task_id)
    }

    /// Blocked -> InProgress.
    pub fn unblock_task(&self, id_input: &str) -> Result<Task> {
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        if task.status != Status::Blocked {
            return Err(Error::Validation(format!(
                "task {task_id} is not blocked (status: {})",
                task.status
            )));
        }
        self.commit(&mut inner, vec![event::task_unblocked(&task_id)])?;
        self.task_snapshot(&inner, &task_id)
    }

    /// InProgress -> Completed; stamps `end_time`, defaults `actual_points`
    /// to the estimate.
    pub fn complete_task(&self, id_input: &str, actual_points: Option<f64>) -> Result<Task> {
        if let Some(points) = actual_points {
            check_points(points)?;
        }
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        cascade::check_transition(task.status, Status::Completed)?;
        self.commit(
            &mut inner,
            vec![event::task_completed(&task_id, actual_points)],
        )?;
        self.task_snapshot(&inner, &task_id)
    }

    pub fn add_task_dependency(&self, id_input: &str, depends_on_input: &str) -> Result<Task> {
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let depends_on = resolve(&inner.state.tasks, "task", depends_on_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        if task.depends_on.contains(&depends_on) {
            return Err(Error::Validation(format!(
                "{task_id} already depends on {depends_on}"
            )));
        }
        if graph::would_create_cycle(&inner.state.relations.task_deps, &task_id, &depends_on) {
            return Err(Error::Cycle {
                from: task_id,
                to: depends_on,
            });
        }
        self.commit(
            &mut inner,
            vec![event::task_dependency_added(&task_id, &depends_on)],
        )?;
        self.task_snapshot(&inner, &task_id)
    }

    pub fn remove_task_dependency(&self, id_input: &str, depends_on_input: &str) -> Result<Task> {
        let mut inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        let depends_on = resolve(&inner.state.tasks, "task", depends_on_input)?;
        let task = task_ref(&inner.state, &task_id)?;
        if !task.depends_on.contains(&depends_on) {
            return Err(Error::Validation(format!(
                "{task_id} does not depend on {depends_on}"
            )));
        }
        self.commit(
            &mut inner,
            vec![event::task_dependency_removed(&task_id, &depends_on)],
        )?;
        self.task_snapshot(&inner, &task_id)
    }

    // =========================================================================
    // Read API (everything returns deep copies)
    // =========================================================================

    /// Snapshot of the whole projection.
    pub fn state(&self) -> AppState {
        self.lock().state.clone()
    }

    pub fn statistics(&self) -> Statistics {
        self.lock().state.statistics.clone()
    }

    pub fn project(&self, id_input: &str) -> Result<Project> {
        let inner = self.lock();
        let project_id = resolve(&inner.state.projects, "project", id_input)?;
        self.project_snapshot(&inner, &project_id)
    }

    pub fn milestone(&self, id_input: &str) -> Result<Milestone> {
        let inner = self.lock();
        let milestone_id = resolve(&inner.state.milestones, "milestone", id_input)?;
        self.milestone_snapshot(&inner, &milestone_id)
    }

    pub fn task(&self, id_input: &str) -> Result<Task> {
        let inner = self.lock();
        let task_id = resolve(&inner.state.tasks, "task", id_input)?;
        self.task_snapshot(&inner, &task_id)
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().log.all()
    }

    pub fn event_by_id(&self, id: Uuid) -> Option<Event> {
        self.lock().log.by_id(id)
    }

    pub fn events_for_entity(&self, entity_id: &str) -> Vec<Event> {
        self.lock().log.by_entity(entity_id)
    }

    pub fn events_by_kind(&self, kind: EventKind) -> Vec<Event> {
        self.lock().log.by_kind(kind)
    }

    pub fn events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Event> {
        self.lock().log.by_time_range(start, end)
    }

    /// Subscribe to applied events (non-durable, in-process).
    pub fn subscribe(&self) -> std::sync::mpsc::Receiver<Event> {
        self.notifier.subscribe()
    }

    /// Attach a JSONL mirror for applied events.
    pub fn set_event_sink(&self, sink: Option<EventSink>) {
        self.notifier.set_sink(sink);
    }

    // =========================================================================
    // Pipeline internals
    // =========================================================================

    /// Fold the batch (collecting derived events), append everything
    /// durably, then swap the new state in. Memory is untouched on failure.
    fn commit(&self, inner: &mut Inner, primary: Vec<Event>) -> Result<Vec<Event>> {
        let mut scratch = inner.state.clone();
        let mut batch = primary;

        let mut index = 0;
        while index < batch.len() {
            let changes = self.projector.fold(&mut scratch, &batch[index])?;
            for change in changes {
                batch.push(match change.target {
                    CascadeTarget::Milestone(id) => {
                        event::milestone_status_changed(id, change.to)
                    }
                    CascadeTarget::Project(id) => event::project_status_changed(id, change.to),
                });
            }
            index += 1;
        }

        inner.log.append_batch(&batch)?;
        inner.state = scratch;
        inner.applied += batch.len();
        inner.since_snapshot += batch.len();

        if inner.since_snapshot >= self.config.snapshot.every {
            self.snapshots
                .save(&inner.state, inner.applied)
                .map_err(|err| match err {
                    Error::Persistence(message) => Error::Persistence(message),
                    other => Error::Persistence(format!("snapshot save: {other}")),
                })?;
            inner.since_snapshot = 0;
        }

        for event in &batch {
            self.notifier.publish(event);
        }

        Ok(batch)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn project_snapshot(&self, inner: &Inner, project_id: &str) -> Result<Project> {
        inner
            .state
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })
    }

    fn milestone_snapshot(&self, inner: &Inner, milestone_id: &str) -> Result<Milestone> {
        inner
            .state
            .milestones
            .get(milestone_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "milestone",
                id: milestone_id.to_string(),
            })
    }

    fn task_snapshot(&self, inner: &Inner, task_id: &str) -> Result<Task> {
        inner
            .state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
    }
}

fn required_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn optional_title(title: Option<String>) -> Result<Option<String>> {
    match title {
        Some(title) => Ok(Some(required_title(&title)?)),
        None => Ok(None),
    }
}

fn check_points(points: f64) -> Result<()> {
    if !points.is_finite() || points < 0.0 {
        return Err(Error::Validation(format!(
            "points must be a non-negative number, got {points}"
        )));
    }
    Ok(())
}

fn milestone_ref<'a>(state: &'a AppState, milestone_id: &str) -> Result<&'a Milestone> {
    state.milestones.get(milestone_id).ok_or_else(|| Error::NotFound {
        kind: "milestone",
        id: milestone_id.to_string(),
    })
}

fn task_ref<'a>(state: &'a AppState, task_id: &str) -> Result<&'a Task> {
    state.tasks.get(task_id).ok_or_else(|| Error::NotFound {
        kind: "task",
        id: task_id.to_string(),
    })
}

/// Resolve an id reference: exact match first, then unique prefix match on
/// the full id or on the part after the kind prefix.
fn resolve<V>(
    entities: &std::collections::BTreeMap<String, V>,
    kind: &'static str,
    input: &str,
) -> Result<String> {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} id cannot be empty")));
    }
    if entities.contains_key(&trimmed) {
        return Ok(trimmed);
    }

    let matches: Vec<&String> = entities
        .keys()
        .filter(|id| {
            id.starts_with(&trimmed)
                || id
                    .split_once('-')
                    .map(|(_, suffix)| suffix.starts_with(&trimmed))
                    .unwrap_or(false)
        })
        .collect();

    match matches.len() {
        0 => Err(Error::NotFound {
            kind,
            id: input.trim().to_string(),
        }),
        1 => Ok(matches[0].clone()),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous {kind} id '{}': {}",
            input.trim(),
            matches
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
