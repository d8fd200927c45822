//! tempo milestone subcommand implementations.

use clap::Subcommand;
use serde::Serialize;

use crate::error::Result;
use crate::model::{Milestone, Task};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{MilestonePatch, NewMilestone, OpenReport, Store};

#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// Create a milestone inside a project
    Add {
        /// Owning project id (or unambiguous prefix)
        project: String,

        /// Milestone title
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
    },

    /// List milestones, optionally scoped to a project
    List {
        /// Only milestones of this project
        #[arg(long)]
        project: Option<String>,
    },

    /// Show one milestone with its tasks
    Show {
        /// Milestone id (or unambiguous prefix)
        id: String,
    },

    /// Edit a milestone's title, description, or due date
    Edit {
        /// Milestone id (or unambiguous prefix)
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
    },

    /// Delete a milestone and its tasks (tombstone)
    Delete {
        /// Milestone id (or unambiguous prefix)
        id: String,
    },

    /// Milestone-to-milestone dependencies
    #[command(subcommand)]
    Dep(DepCommands),
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Record that a milestone depends on another
    Add {
        /// Dependent milestone id
        id: String,
        /// Milestone it depends on
        on: String,
    },

    /// Remove a recorded dependency
    Remove {
        /// Dependent milestone id
        id: String,
        /// Milestone it no longer depends on
        on: String,
    },
}

#[derive(Serialize)]
struct MilestoneList {
    milestones: Vec<Milestone>,
    total: usize,
}

#[derive(Serialize)]
struct MilestoneDetails {
    milestone: Milestone,
    tasks: Vec<Task>,
}

pub fn run(
    store: &Store,
    report: &OpenReport,
    command: &MilestoneCommands,
    options: OutputOptions,
) -> Result<()> {
    let warnings = super::load_warnings(report);

    match command {
        MilestoneCommands::Add {
            project,
            title,
            description,
            due,
        } => {
            let due_date = super::parse_timestamp("due", due.as_deref())?;
            let milestone = store.create_milestone(
                project,
                NewMilestone {
                    title: title.clone(),
                    description: description.clone(),
                    due_date,
                },
            )?;
            let mut human =
                HumanOutput::new(format!("tempo milestone add: created {}", milestone.id));
            human.push_summary("title", milestone.title.clone());
            human.push_summary("status", milestone.status.to_string());
            if let Some(due) = milestone.due_date {
                human.push_summary("due", due.to_rfc3339());
            }
            push_warnings(&mut human, &warnings);
            emit_success(options, "milestone add", &milestone, Some(&human))
        }
        MilestoneCommands::List { project } => {
            let state = store.state();
            let milestones: Vec<Milestone> = match project {
                Some(project_input) => {
                    let project = store.project(project_input)?;
                    project
                        .milestone_ids
                        .iter()
                        .filter_map(|id| state.milestones.get(id).cloned())
                        .collect()
                }
                None => state.milestones.into_values().collect(),
            };
            let mut human = HumanOutput::new(format!("{} milestone(s)", milestones.len()));
            for milestone in &milestones {
                human.push_detail(format!(
                    "{}  {}  [{}]  {} task(s)",
                    milestone.id,
                    milestone.title,
                    milestone.status,
                    milestone.task_ids.len()
                ));
            }
            push_warnings(&mut human, &warnings);
            let report = MilestoneList {
                total: milestones.len(),
                milestones,
            };
            emit_success(options, "milestone list", &report, Some(&human))
        }
        MilestoneCommands::Show { id } => {
            let milestone = store.milestone(id)?;
            let state = store.state();
            let tasks = milestone
                .task_ids
                .iter()
                .filter_map(|id| state.tasks.get(id).cloned())
                .collect::<Vec<_>>();
            let mut human = HumanOutput::new(format!(
                "{}  {}  [{}]",
                milestone.id, milestone.title, milestone.status
            ));
            if let Some(due) = milestone.due_date {
                human.push_summary("due", due.to_rfc3339());
            }
            if let Some(completed) = milestone.completed_date {
                human.push_summary("completed", completed.to_rfc3339());
            }
            if !milestone.depends_on.is_empty() {
                human.push_summary(
                    "depends on",
                    milestone
                        .depends_on
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
            for task in &tasks {
                human.push_detail(format!(
                    "{}  {}  [{}]  {} pts",
                    task.id, task.title, task.status, task.estimated_points
                ));
            }
            push_warnings(&mut human, &warnings);
            let details = MilestoneDetails { milestone, tasks };
            emit_success(options, "milestone show", &details, Some(&human))
        }
        MilestoneCommands::Edit {
            id,
            title,
            description,
            due,
        } => {
            let due_date = super::parse_timestamp("due", due.as_deref())?;
            let milestone = store.edit_milestone(
                id,
                MilestonePatch {
                    title: title.clone(),
                    description: description.clone(),
                    due_date,
                },
            )?;
            let mut human =
                HumanOutput::new(format!("tempo milestone edit: updated {}", milestone.id));
            human.push_summary("title", milestone.title.clone());
            push_warnings(&mut human, &warnings);
            emit_success(options, "milestone edit", &milestone, Some(&human))
        }
        MilestoneCommands::Delete { id } => {
            let milestone = store.delete_milestone(id)?;
            let mut human =
                HumanOutput::new(format!("tempo milestone delete: removed {}", milestone.id));
            human.push_summary("title", milestone.title.clone());
            human.push_detail("history is preserved in the event log");
            push_warnings(&mut human, &warnings);
            emit_success(options, "milestone delete", &milestone, Some(&human))
        }
        MilestoneCommands::Dep(DepCommands::Add { id, on }) => {
            let milestone = store.add_milestone_dependency(id, on)?;
            let mut human = HumanOutput::new(format!(
                "tempo milestone dep add: {} now depends on {}",
                milestone.id, on
            ));
            push_warnings(&mut human, &warnings);
            emit_success(options, "milestone dep", &milestone, Some(&human))
        }
        MilestoneCommands::Dep(DepCommands::Remove { id, on }) => {
            let milestone = store.remove_milestone_dependency(id, on)?;
            let mut human = HumanOutput::new(format!(
                "tempo milestone dep remove: {} no longer depends on {}",
                milestone.id, on
            ));
            push_warnings(&mut human, &warnings);
            emit_success(options, "milestone dep", &milestone, Some(&human))
        }
    }
}

fn push_warnings(human: &mut HumanOutput, warnings: &[String]) {
    for warning in warnings {
        human.push_warning(warning.clone());
    }
}
