//! Domain entities for tempo.
//!
//! Projects own milestones, milestones own tasks. All three share one
//! `Status` enum; composite statuses (milestone, project) are derived from
//! children by the cascade and never set directly.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Shared status enum across projects, milestones, and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NotStarted,
        Status::InProgress,
        Status::Completed,
        Status::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Blocked => "blocked",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Must,
    Enhance,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Must => "must",
            Priority::Enhance => "enhance",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Must
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "must" => Ok(Priority::Must),
            "enhance" => Ok(Priority::Enhance),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected must or enhance)"
            ))),
        }
    }
}

/// A project: the top of the hierarchy, owning an ordered list of milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestone_ids: Vec<String>,
}

/// A milestone: owned by exactly one project, owning an ordered list of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
}

/// A task: the leaf of the hierarchy. The only entity whose status is set
/// by commands (through the transition table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    pub estimated_points: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
}

impl Task {
    /// Points credited once the task completes.
    pub fn earned_points(&self) -> f64 {
        self.actual_points.unwrap_or(self.estimated_points)
    }

    /// Duration in hours, present only when both timestamps are stamped.
    pub fn duration_hours(&self) -> Option<f64> {
        let (start, end) = (self.start_time?, self.end_time?);
        let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        if seconds <= 0.0 {
            return None;
        }
        Some(seconds / 3600.0)
    }
}

/// Aggregate statistics over the whole projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub total_points: f64,
    pub earned_points: f64,
    pub average_points_per_hour: f64,
}

impl Statistics {
    /// Empty statistics with the configured points-per-hour seed.
    pub fn seeded(points_per_hour: f64) -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            total_points: 0.0,
            earned_points: 0.0,
            average_points_per_hour: points_per_hour,
        }
    }
}
