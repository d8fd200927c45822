//! Event model for tempo.
//!
//! Every change to the tracked hierarchy is a typed, immutable event.
//! The wire format is one JSON object per line:
//!
//! ```json
//! {"id":"…","type":"task_started","timestamp":"…","version":1,"payload":{…}}
//! ```
//!
//! Payloads are a closed sum type, one enum per aggregate (project,
//! milestone, task), so the projector's match is exhaustive and a new kind
//! without a fold arm is a build error. Construction never fails: all
//! validation happens at the command layer before an event is created.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::model::{Priority, Status};

/// Payload schema version stamped on every event.
pub const EVENT_VERSION: u32 = 1;

/// A single immutable event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    /// Stamp a fresh event envelope around a payload.
    pub fn new(body: EventBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: EVENT_VERSION,
            body,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// Ids of the entities this event's payload refers to.
    pub fn entity_ids(&self) -> Vec<&str> {
        self.body.entity_ids()
    }
}

/// Event payloads grouped by aggregate.
///
/// Serialization is delegated to the inner aggregate enums, each of which
/// carries the `type`/`payload` adjacent tagging; the variants' tag names
/// are disjoint (`project_*`, `milestone_*`, `task_*`) so the untagged
/// outer layer is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventBody {
    Project(ProjectEvent),
    Milestone(MilestoneEvent),
    Task(TaskEvent),
}

/// Events over the project aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ProjectEvent {
    ProjectCreated {
        project_id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    ProjectEdited {
        project_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Derived by the cascade; never produced directly by a command.
    ProjectStatusChanged { project_id: String, status: Status },
    ProjectDeleted { project_id: String },
}

/// Events over the milestone aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MilestoneEvent {
    MilestoneCreated {
        milestone_id: String,
        project_id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_date: Option<DateTime<Utc>>,
    },
    MilestoneEdited {
        milestone_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_date: Option<DateTime<Utc>>,
    },
    /// Derived by the cascade; never produced directly by a command.
    MilestoneStatusChanged { milestone_id: String, status: Status },
    MilestoneDeleted { milestone_id: String },
    MilestoneDependencyAdded {
        milestone_id: String,
        depends_on: String,
    },
    MilestoneDependencyRemoved {
        milestone_id: String,
        depends_on: String,
    },
}

/// Events over the task aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskCreated {
        task_id: String,
        milestone_id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        priority: Priority,
        estimated_points: f64,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        tags: BTreeSet<String>,
    },
    TaskEdited {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_points: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tags: Option<BTreeSet<String>>,
    },
    TaskStarted { task_id: String },
    TaskBlocked { task_id: String, reason: String },
    TaskUnblocked { task_id: String },
    TaskCompleted {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_points: Option<f64>,
    },
    TaskDeleted { task_id: String },
    TaskDependencyAdded { task_id: String, depends_on: String },
    TaskDependencyRemoved { task_id: String, depends_on: String },
}

/// The closed set of event kinds, used for `by_kind` queries and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProjectCreated,
    ProjectEdited,
    ProjectStatusChanged,
    ProjectDeleted,
    MilestoneCreated,
    MilestoneEdited,
    MilestoneStatusChanged,
    MilestoneDeleted,
    MilestoneDependencyAdded,
    MilestoneDependencyRemoved,
    TaskCreated,
    TaskEdited,
    TaskStarted,
    TaskBlocked,
    TaskUnblocked,
    TaskCompleted,
    TaskDeleted,
    TaskDependencyAdded,
    TaskDependencyRemoved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProjectCreated => "project_created",
            EventKind::ProjectEdited => "project_edited",
            EventKind::ProjectStatusChanged => "project_status_changed",
            EventKind::ProjectDeleted => "project_deleted",
            EventKind::MilestoneCreated => "milestone_created",
            EventKind::MilestoneEdited => "milestone_edited",
            EventKind::MilestoneStatusChanged => "milestone_status_changed",
            EventKind::MilestoneDeleted => "milestone_deleted",
            EventKind::MilestoneDependencyAdded => "milestone_dependency_added",
            EventKind::MilestoneDependencyRemoved => "milestone_dependency_removed",
            EventKind::TaskCreated => "task_created",
            EventKind::TaskEdited => "task_edited",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskBlocked => "task_blocked",
            EventKind::TaskUnblocked => "task_unblocked",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskDeleted => "task_deleted",
            EventKind::TaskDependencyAdded => "task_dependency_added",
            EventKind::TaskDependencyRemoved => "task_dependency_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        serde_json::from_value(serde_json::Value::String(normalized)).map_err(|_| {
            Error::InvalidArgument(format!("unknown event kind '{value}'"))
        })
    }
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Project(event) => match event {
                ProjectEvent::ProjectCreated { .. } => EventKind::ProjectCreated,
                ProjectEvent::ProjectEdited { .. } => EventKind::ProjectEdited,
                ProjectEvent::ProjectStatusChanged { .. } => EventKind::ProjectStatusChanged,
                ProjectEvent::ProjectDeleted { .. } => EventKind::ProjectDeleted,
            },
            EventBody::Milestone(event) => match event {
                MilestoneEvent::MilestoneCreated { .. } => EventKind::MilestoneCreated,
                MilestoneEvent::MilestoneEdited { .. } => EventKind::MilestoneEdited,
                MilestoneEvent::MilestoneStatusChanged { .. } => {
                    EventKind::MilestoneStatusChanged
                }
                MilestoneEvent::MilestoneDeleted { .. } => EventKind::MilestoneDeleted,
                MilestoneEvent::MilestoneDependencyAdded { .. } => {
                    EventKind::MilestoneDependencyAdded
                }
                MilestoneEvent::MilestoneDependencyRemoved { .. } => {
                    EventKind::MilestoneDependencyRemoved
                }
            },
            EventBody::Task(event) => match event {
                TaskEvent::TaskCreated { .. } => EventKind::TaskCreated,
                TaskEvent::TaskEdited { .. } => EventKind::TaskEdited,
                TaskEvent::TaskStarted { .. } => EventKind::TaskStarted,
                TaskEvent::TaskBlocked { .. } => EventKind::TaskBlocked,
                TaskEvent::TaskUnblocked { .. } => EventKind::TaskUnblocked,
                TaskEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
                TaskEvent::TaskDeleted { .. } => EventKind::TaskDeleted,
                TaskEvent::TaskDependencyAdded { .. } => EventKind::TaskDependencyAdded,
                TaskEvent::TaskDependencyRemoved { .. } => EventKind::TaskDependencyRemoved,
            },
        }
    }

    /// Every entity id the payload references, for `by_entity` queries.
    pub fn entity_ids(&self) -> Vec<&str> {
        match self {
            EventBody::Project(event) => match event {
                ProjectEvent::ProjectCreated { project_id, .. }
                | ProjectEvent::ProjectEdited { project_id, .. }
                | ProjectEvent::ProjectStatusChanged { project_id, .. }
                | ProjectEvent::ProjectDeleted { project_id } => vec![project_id],
            },
            EventBody::Milestone(event) => match event {
                MilestoneEvent::MilestoneCreated {
                    milestone_id,
                    project_id,
                    ..
                } => vec![milestone_id, project_id],
                MilestoneEvent::MilestoneEdited { milestone_id, .. }
                | MilestoneEvent::MilestoneStatusChanged { milestone_id, .. }
                | MilestoneEvent::MilestoneDeleted { milestone_id } => vec![milestone_id],
                MilestoneEvent::MilestoneDependencyAdded {
                    milestone_id,
                    depends_on,
                }
                | MilestoneEvent::MilestoneDependencyRemoved {
                    milestone_id,
                    depends_on,
                } => vec![milestone_id, depends_on],
            },
            EventBody::Task(event) => match event {
                TaskEvent::TaskCreated {
                    task_id,
                    milestone_id,
                    ..
                } => vec![task_id, milestone_id],
                TaskEvent::TaskEdited { task_id, .. }
                | TaskEvent::TaskStarted { task_id }
                | TaskEvent::TaskBlocked { task_id, .. }
                | TaskEvent::TaskUnblocked { task_id }
                | TaskEvent::TaskCompleted { task_id, .. }
                | TaskEvent::TaskDeleted { task_id } => vec![task_id],
                TaskEvent::TaskDependencyAdded {
                    task_id,
                    depends_on,
                }
                | TaskEvent::TaskDependencyRemoved {
                    task_id,
                    depends_on,
                } => vec![task_id, depends_on],
            },
        }
    }
}

// =============================================================================
// Factory functions
// =============================================================================

pub fn project_created(
    project_id: impl Into<String>,
    title: impl Into<String>,
    description: Option<String>,
) -> Event {
    Event::new(EventBody::Project(ProjectEvent::ProjectCreated {
        project_id: project_id.into(),
        title: title.into(),
        description,
    }))
}

pub fn project_edited(
    project_id: impl Into<String>,
    title: Option<String>,
    description: Option<String>,
) -> Event {
    Event::new(EventBody::Project(ProjectEvent::ProjectEdited {
        project_id: project_id.into(),
        title,
        description,
    }))
}

pub fn project_status_changed(project_id: impl Into<String>, status: Status) -> Event {
    Event::new(EventBody::Project(ProjectEvent::ProjectStatusChanged {
        project_id: project_id.into(),
        status,
    }))
}

pub fn project_deleted(project_id: impl Into<String>) -> Event {
    Event::new(EventBody::Project(ProjectEvent::ProjectDeleted {
        project_id: project_id.into(),
    }))
}

pub fn milestone_created(
    milestone_id: impl Into<String>,
    project_id: impl Into<String>,
    title: impl Into<String>,
    description: Option<String>,
    due_date: Option<DateTime<Utc>>,
) -> Event {
    Event::new(EventBody::Milestone(MilestoneEvent::MilestoneCreated {
        milestone_id: milestone_id.into(),
        project_id: project_id.into(),
        title: title.into(),
        description,
        due_date,
    }))
}

pub fn milestone_edited(
    milestone_id: impl Into<String>,
    title: Option<String>,
    description: Option<String>,
    due_date: Option<DateTime<Utc>>,
) -> Event {
    Event::new(EventBody::Milestone(MilestoneEvent::MilestoneEdited {
        milestone_id: milestone_id.into(),
        title,
        description,
        due_date,
    }))
}

pub fn milestone_status_changed(milestone_id: impl Into<String>, status: Status) -> Event {
    Event::new(EventBody::Milestone(MilestoneEvent::MilestoneStatusChanged {
        milestone_id: milestone_id.into(),
        status,
    }))
}

pub fn milestone_deleted(milestone_id: impl Into<String>) -> Event {
    Event::new(EventBody::Milestone(MilestoneEvent::MilestoneDeleted {
        milestone_id: milestone_id.into(),
    }))
}

pub fn milestone_dependency_added(
    milestone_id: impl Into<String>,
    depends_on: impl Into<String>,
) -> Event {
    Event::new(EventBody::Milestone(
        MilestoneEvent::MilestoneDependencyAdded {
            milestone_id: milestone_id.into(),
            depends_on: depends_on.into(),
        },
    ))
}

pub fn milestone_dependency_removed(
    milestone_id: impl Into<String>,
    depends_on: impl Into<String>,
) -> Event {
    Event::new(EventBody::Milestone(
        MilestoneEvent::MilestoneDependencyRemoved {
            milestone_id: milestone_id.into(),
            depends_on: depends_on.into(),
        },
    ))
}

#[allow(clippy::too_many_arguments)]
pub fn task_created(
    task_id: impl Into<String>,
    milestone_id: impl Into<String>,
    title: impl Into<String>,
    description: Option<String>,
    priority: Priority,
    estimated_points: f64,
    tags: BTreeSet<String>,
) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskCreated {
        task_id: task_id.into(),
        milestone_id: milestone_id.into(),
        title: title.into(),
        description,
        priority,
        estimated_points,
        tags,
    }))
}

pub fn task_edited(
    task_id: impl Into<String>,
    title: Option<String>,
    description: Option<String>,
    estimated_points: Option<f64>,
    tags: Option<BTreeSet<String>>,
) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskEdited {
        task_id: task_id.into(),
        title,
        description,
        estimated_points,
        tags,
    }))
}

pub fn task_started(task_id: impl Into<String>) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskStarted {
        task_id: task_id.into(),
    }))
}

pub fn task_blocked(task_id: impl Into<String>, reason: impl Into<String>) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskBlocked {
        task_id: task_id.into(),
        reason: reason.into(),
    }))
}

pub fn task_unblocked(task_id: impl Into<String>) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskUnblocked {
        task_id: task_id.into(),
    }))
}

pub fn task_completed(task_id: impl Into<String>, actual_points: Option<f64>) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskCompleted {
        task_id: task_id.into(),
        actual_points,
    }))
}

pub fn task_deleted(task_id: impl Into<String>) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskDeleted {
        task_id: task_id.into(),
    }))
}

pub fn task_dependency_added(
    task_id: impl Into<String>,
    depends_on: impl Into<String>,
) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskDependencyAdded {
        task_id: task_id.into(),
        depends_on: depends_on.into(),
    }))
}

pub fn task_dependency_removed(
    task_id: impl Into<String>,
    depends_on: impl Into<String>,
) -> Event {
    Event::new(EventBody::Task(TaskEvent::TaskDependencyRemoved {
        task_id: task_id.into(),
        depends_on: depends_on.into(),
    }))
}
