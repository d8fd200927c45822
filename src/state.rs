//! Derived application state for tempo.
//!
//! `AppState` is the projection obtained by folding the event log. It is a
//! plain value: cloning it gives callers a deep copy they can inspect
//! without touching shared state. Maps are `BTreeMap` so iteration and
//! serialization order is deterministic: replaying the same log always
//! produces an identical document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Milestone, Project, Statistics, Task};

/// Parent/child and dependency index tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relations {
    /// milestone id -> owning project id
    #[serde(default)]
    pub project_of: BTreeMap<String, String>,
    /// task id -> owning milestone id
    #[serde(default)]
    pub milestone_of: BTreeMap<String, String>,
    /// task id -> set of task ids it depends on
    #[serde(default)]
    pub task_deps: BTreeMap<String, BTreeSet<String>>,
    /// milestone id -> set of milestone ids it depends on
    #[serde(default)]
    pub milestone_deps: BTreeMap<String, BTreeSet<String>>,
}

impl Relations {
    /// Drop every trace of a task from the index tables, including edges
    /// pointing at it from other tasks.
    pub fn purge_task(&mut self, task_id: &str) {
        self.milestone_of.remove(task_id);
        self.task_deps.remove(task_id);
        for deps in self.task_deps.values_mut() {
            deps.remove(task_id);
        }
        self.task_deps.retain(|_, deps| !deps.is_empty());
    }

    /// Drop every trace of a milestone from the index tables.
    pub fn purge_milestone(&mut self, milestone_id: &str) {
        self.project_of.remove(milestone_id);
        self.milestone_deps.remove(milestone_id);
        for deps in self.milestone_deps.values_mut() {
            deps.remove(milestone_id);
        }
        self.milestone_deps.retain(|_, deps| !deps.is_empty());
    }
}

/// The aggregate root: everything the fold derives from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub projects: BTreeMap<String, Project>,
    pub milestones: BTreeMap<String, Milestone>,
    pub tasks: BTreeMap<String, Task>,
    pub relations: Relations,
    pub statistics: Statistics,
}

impl AppState {
    /// The canonical empty state replay starts from.
    pub fn empty(points_per_hour: f64) -> Self {
        Self {
            projects: BTreeMap::new(),
            milestones: BTreeMap::new(),
            tasks: BTreeMap::new(),
            relations: Relations::default(),
            statistics: Statistics::seeded(points_per_hour),
        }
    }

    /// Statuses of the tasks owned by a milestone.
    pub fn task_statuses(&self, milestone: &Milestone) -> Vec<crate::model::Status> {
        milestone
            .task_ids
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|task| task.status)
            .collect()
    }

    /// Statuses of the milestones owned by a project.
    pub fn milestone_statuses(&self, project: &Project) -> Vec<crate::model::Status> {
        project
            .milestone_ids
            .iter()
            .filter_map(|id| self.milestones.get(id))
            .map(|milestone| milestone.status)
            .collect()
    }

    /// The project owning a milestone, via the index table.
    pub fn project_of_milestone(&self, milestone_id: &str) -> Option<&str> {
        self.relations
            .project_of
            .get(milestone_id)
            .map(String::as_str)
    }

    /// The milestone owning a task, via the index table.
    pub fn milestone_of_task(&self, task_id: &str) -> Option<&str> {
        self.relations
            .milestone_of
            .get(task_id)
            .map(String::as_str)
    }
}
