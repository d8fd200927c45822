//! tempo status command implementation
//!
//! Single-pane overview: the whole hierarchy with derived statuses, plus
//! aggregate statistics.

use serde::Serialize;

use crate::error::Result;
use crate::model::Statistics;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{OpenReport, Store};

#[derive(Serialize)]
struct StatusReport {
    projects: usize,
    milestones: usize,
    tasks: usize,
    statistics: Statistics,
    restored: crate::store::Restored,
    events: usize,
}

pub fn run(store: &Store, report: &OpenReport, options: OutputOptions) -> Result<()> {
    let state = store.state();
    let warnings = super::load_warnings(report);

    let mut human = HumanOutput::new("tempo status");
    human.push_summary("projects", state.projects.len().to_string());
    human.push_summary("milestones", state.milestones.len().to_string());
    human.push_summary("tasks", state.tasks.len().to_string());
    human.push_summary(
        "completed",
        format!(
            "{}/{} tasks, {}/{} points",
            state.statistics.completed_tasks,
            state.statistics.total_tasks,
            state.statistics.earned_points,
            state.statistics.total_points
        ),
    );
    human.push_summary(
        "points/hour",
        format!("{:.2}", state.statistics.average_points_per_hour),
    );

    for project in state.projects.values() {
        human.push_detail(format!(
            "{}  {}  [{}]",
            project.id, project.title, project.status
        ));
        for milestone_id in &project.milestone_ids {
            let Some(milestone) = state.milestones.get(milestone_id) else {
                continue;
            };
            human.push_detail(format!(
                "  {}  {}  [{}]",
                milestone.id, milestone.title, milestone.status
            ));
            for task_id in &milestone.task_ids {
                let Some(task) = state.tasks.get(task_id) else {
                    continue;
                };
                human.push_detail(format!(
                    "    {}  {}  [{}]  {} pts",
                    task.id, task.title, task.status, task.estimated_points
                ));
            }
        }
    }

    for warning in &warnings {
        human.push_warning(warning.clone());
    }

    let data = StatusReport {
        projects: state.projects.len(),
        milestones: state.milestones.len(),
        tasks: state.tasks.len(),
        statistics: state.statistics.clone(),
        restored: report.restored.clone(),
        events: report.events,
    };

    emit_success(options, "status", &data, Some(&human))
}
