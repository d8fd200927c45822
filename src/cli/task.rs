//! tempo task subcommand implementations.

use std::collections::BTreeSet;

use clap::Subcommand;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Priority, Status, Task};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{NewTask, OpenReport, Store, TaskPatch};

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task inside a milestone
    Add {
        /// Owning milestone id (or unambiguous prefix)
        milestone: String,

        /// Task title
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Priority: must or enhance
        #[arg(long, default_value = "must")]
        priority: String,

        /// Estimated points
        #[arg(long, default_value_t = 1.0)]
        points: f64,

        /// Tags (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },

    /// List tasks, optionally filtered
    List {
        /// Only tasks of this milestone
        #[arg(long)]
        milestone: Option<String>,

        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task
    Show {
        /// Task id (or unambiguous prefix)
        id: String,
    },

    /// Edit a task's title, description, points, or tags
    Edit {
        /// Task id (or unambiguous prefix)
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// New estimated points
        #[arg(long)]
        points: Option<f64>,

        /// Replace the tag set (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },

    /// Delete a task (tombstone)
    Delete {
        /// Task id (or unambiguous prefix)
        id: String,
    },

    /// Start a task (not_started -> in_progress)
    Start {
        /// Task id (or unambiguous prefix)
        id: String,
    },

    /// Block a task (in_progress -> blocked); a reason is required
    Block {
        /// Task id (or unambiguous prefix)
        id: String,

        /// Why the task is blocked
        #[arg(long)]
        reason: String,
    },

    /// Unblock a task (blocked -> in_progress)
    Unblock {
        /// Task id (or unambiguous prefix)
        id: String,
    },

    /// Complete a task (in_progress -> completed)
    Done {
        /// Task id (or unambiguous prefix)
        id: String,

        /// Actual points earned (defaults to the estimate)
        #[arg(long)]
        points: Option<f64>,
    },

    /// Task-to-task dependencies
    #[command(subcommand)]
    Dep(DepCommands),
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Record that a task depends on another
    Add {
        /// Dependent task id
        id: String,
        /// Task it depends on
        on: String,
    },

    /// Remove a recorded dependency
    Remove {
        /// Dependent task id
        id: String,
        /// Task it no longer depends on
        on: String,
    },
}

#[derive(Serialize)]
struct TaskList {
    tasks: Vec<Task>,
    total: usize,
}

pub fn run(
    store: &Store,
    report: &OpenReport,
    command: &TaskCommands,
    options: OutputOptions,
) -> Result<()> {
    let warnings = super::load_warnings(report);

    match command {
        TaskCommands::Add {
            milestone,
            title,
            description,
            priority,
            points,
            tag,
        } => {
            let task = store.create_task(
                milestone,
                NewTask {
                    title: title.clone(),
                    description: description.clone(),
                    priority: priority.parse::<Priority>()?,
                    estimated_points: *points,
                    tags: tag.iter().cloned().collect(),
                },
            )?;
            let mut human = HumanOutput::new(format!("tempo task add: created {}", task.id));
            human.push_summary("title", task.title.clone());
            human.push_summary("priority", task.priority.to_string());
            human.push_summary("points", task.estimated_points.to_string());
            push_warnings(&mut human, &warnings);
            emit_success(options, "task add", &task, Some(&human))
        }
        TaskCommands::List { milestone, status } => {
            let status = status
                .as_deref()
                .map(parse_status)
                .transpose()?;
            let state = store.state();
            let tasks: Vec<Task> = match milestone {
                Some(milestone_input) => {
                    let milestone = store.milestone(milestone_input)?;
                    milestone
                        .task_ids
                        .iter()
                        .filter_map(|id| state.tasks.get(id).cloned())
                        .filter(|task| status.map(|s| task.status == s).unwrap_or(true))
                        .collect()
                }
                None => state
                    .tasks
                    .into_values()
                    .filter(|task| status.map(|s| task.status == s).unwrap_or(true))
                    .collect(),
            };
            let mut human = HumanOutput::new(format!("{} task(s)", tasks.len()));
            for task in &tasks {
                human.push_detail(format!(
                    "{}  {}  [{}]  {}  {} pts",
                    task.id, task.title, task.status, task.priority, task.estimated_points
                ));
            }
            push_warnings(&mut human, &warnings);
            let report = TaskList {
                total: tasks.len(),
                tasks,
            };
            emit_success(options, "task list", &report, Some(&human))
        }
        TaskCommands::Show { id } => {
            let task = store.task(id)?;
            let mut human =
                HumanOutput::new(format!("{}  {}  [{}]", task.id, task.title, task.status));
            human.push_summary("priority", task.priority.to_string());
            human.push_summary("estimated points", task.estimated_points.to_string());
            if let Some(actual) = task.actual_points {
                human.push_summary("actual points", actual.to_string());
            }
            if let Some(start) = task.start_time {
                human.push_summary("started", start.to_rfc3339());
            }
            if let Some(end) = task.end_time {
                human.push_summary("finished", end.to_rfc3339());
            }
            if let Some(reason) = &task.blocked_reason {
                human.push_summary("blocked", reason.clone());
            }
            if !task.tags.is_empty() {
                human.push_summary(
                    "tags",
                    task.tags.iter().cloned().collect::<Vec<_>>().join(", "),
                );
            }
            if !task.depends_on.is_empty() {
                human.push_summary(
                    "depends on",
                    task.depends_on.iter().cloned().collect::<Vec<_>>().join(", "),
                );
            }
            push_warnings(&mut human, &warnings);
            emit_success(options, "task show", &task, Some(&human))
        }
        TaskCommands::Edit {
            id,
            title,
            description,
            points,
            tag,
        } => {
            let tags: Option<BTreeSet<String>> = if tag.is_empty() {
                None
            } else {
                Some(tag.iter().cloned().collect())
            };
            let task = store.edit_task(
                id,
                TaskPatch {
                    title: title.clone(),
                    description: description.clone(),
                    estimated_points: *points,
                    tags,
                },
            )?;
            let mut human = HumanOutput::new(format!("tempo task edit: updated {}", task.id));
            human.push_summary("title", task.title.clone());
            push_warnings(&mut human, &warnings);
            emit_success(options, "task edit", &task, Some(&human))
        }
        TaskCommands::Delete { id } => {
            let task = store.delete_task(id)?;
            let mut human = HumanOutput::new(format!("tempo task delete: removed {}", task.id));
            human.push_summary("title", task.title.clone());
            human.push_detail("history is preserved in the event log");
            push_warnings(&mut human, &warnings);
            emit_success(options, "task delete", &task, Some(&human))
        }
        TaskCommands::Start { id } => {
            let task = store.start_task(id)?;
            let mut human = HumanOutput::new(format!("tempo task start: started {}", task.id));
            human.push_summary("status", task.status.to_string());
            push_warnings(&mut human, &warnings);
            emit_success(options, "task start", &task, Some(&human))
        }
        TaskCommands::Block { id, reason } => {
            let task = store.block_task(id, reason)?;
            let mut human = HumanOutput::new(format!("tempo task block: blocked {}", task.id));
            human.push_summary("reason", reason.clone());
            push_warnings(&mut human, &warnings);
            emit_success(options, "task block", &task, Some(&human))
        }
        TaskCommands::Unblock { id } => {
            let task = store.unblock_task(id)?;
            let mut human = HumanOutput::new(format!("tempo task unblock: unblocked {}", task.id));
            human.push_summary("status", task.status.to_string());
            push_warnings(&mut human, &warnings);
            emit_success(options, "task unblock", &task, Some(&human))
        }
        TaskCommands::Done { id, points } => {
            let task = store.complete_task(id, *points)?;
            let mut human = HumanOutput::new(format!("tempo task done: completed {}", task.id));
            if let Some(actual) = task.actual_points {
                human.push_summary("earned points", actual.to_string());
            }
            push_warnings(&mut human, &warnings);
            emit_success(options, "task done", &task, Some(&human))
        }
        TaskCommands::Dep(DepCommands::Add { id, on }) => {
            let task = store.add_task_dependency(id, on)?;
            let mut human = HumanOutput::new(format!(
                "tempo task dep add: {} now depends on {}",
                task.id, on
            ));
            push_warnings(&mut human, &warnings);
            emit_success(options, "task dep", &task, Some(&human))
        }
        TaskCommands::Dep(DepCommands::Remove { id, on }) => {
            let task = store.remove_task_dependency(id, on)?;
            let mut human = HumanOutput::new(format!(
                "tempo task dep remove: {} no longer depends on {}",
                task.id, on
            ));
            push_warnings(&mut human, &warnings);
            emit_success(options, "task dep", &task, Some(&human))
        }
    }
}

fn parse_status(value: &str) -> Result<Status> {
    match value.trim().to_ascii_lowercase().as_str() {
        "not_started" => Ok(Status::NotStarted),
        "in_progress" => Ok(Status::InProgress),
        "completed" => Ok(Status::Completed),
        "blocked" => Ok(Status::Blocked),
        other => Err(Error::InvalidArgument(format!(
            "unknown status '{other}' (expected not_started, in_progress, completed, or blocked)"
        ))),
    }
}

fn push_warnings(human: &mut HumanOutput, warnings: &[String]) {
    for warning in warnings {
        human.push_warning(warning.clone());
    }
}
