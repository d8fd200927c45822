//! tempo project subcommand implementations.

use clap::Subcommand;
use serde::Serialize;

use crate::error::Result;
use crate::model::Project;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{NewProject, OpenReport, ProjectPatch, Store};

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Add {
        /// Project title
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,
    },

    /// List all projects
    List,

    /// Show one project with its milestones
    Show {
        /// Project id (or unambiguous prefix)
        id: String,
    },

    /// Edit a project's title or description
    Edit {
        /// Project id (or unambiguous prefix)
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a project and everything under it (tombstone)
    Delete {
        /// Project id (or unambiguous prefix)
        id: String,
    },
}

#[derive(Serialize)]
struct ProjectList {
    projects: Vec<Project>,
    total: usize,
}

#[derive(Serialize)]
struct ProjectDetails {
    project: Project,
    milestones: Vec<crate::model::Milestone>,
}

pub fn run(
    store: &Store,
    report: &OpenReport,
    command: &ProjectCommands,
    options: OutputOptions,
) -> Result<()> {
    let warnings = super::load_warnings(report);

    match command {
        ProjectCommands::Add { title, description } => {
            let project = store.create_project(NewProject {
                title: title.clone(),
                description: description.clone(),
            })?;
            let mut human = HumanOutput::new(format!("tempo project add: created {}", project.id));
            human.push_summary("title", project.title.clone());
            human.push_summary("status", project.status.to_string());
            push_warnings(&mut human, &warnings);
            emit_success(options, "project add", &project, Some(&human))
        }
        ProjectCommands::List => {
            let state = store.state();
            let projects: Vec<Project> = state.projects.into_values().collect();
            let mut human = HumanOutput::new(format!("{} project(s)", projects.len()));
            for project in &projects {
                human.push_detail(format!(
                    "{}  {}  [{}]  {} milestone(s)",
                    project.id,
                    project.title,
                    project.status,
                    project.milestone_ids.len()
                ));
            }
            push_warnings(&mut human, &warnings);
            let report = ProjectList {
                total: projects.len(),
                projects,
            };
            emit_success(options, "project list", &report, Some(&human))
        }
        ProjectCommands::Show { id } => {
            let project = store.project(id)?;
            let state = store.state();
            let milestones = project
                .milestone_ids
                .iter()
                .filter_map(|id| state.milestones.get(id).cloned())
                .collect::<Vec<_>>();
            let mut human = HumanOutput::new(format!(
                "{}  {}  [{}]",
                project.id, project.title, project.status
            ));
            if let Some(description) = &project.description {
                human.push_summary("description", description.clone());
            }
            human.push_summary("created", project.created_at.to_rfc3339());
            human.push_summary("updated", project.updated_at.to_rfc3339());
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
            let details = ProjectDetails {
                project,
                milestones,
            };
            emit_success(options, "project show", &details, Some(&human))
        }
        ProjectCommands::Edit {
            id,
            title,
            description,
        } => {
            let project = store.edit_project(
                id,
                ProjectPatch {
                    title: title.clone(),
                    description: description.clone(),
                },
            )?;
            let mut human = HumanOutput::new(format!("tempo project edit: updated {}", project.id));
            human.push_summary("title", project.title.clone());
            push_warnings(&mut human, &warnings);
            emit_success(options, "project edit", &project, Some(&human))
        }
        ProjectCommands::Delete { id } => {
            let project = store.delete_project(id)?;
            let mut human =
                HumanOutput::new(format!("tempo project delete: removed {}", project.id));
            human.push_summary("title", project.title.clone());
            human.push_detail("history is preserved in the event log");
            push_warnings(&mut human, &warnings);
            emit_success(options, "project delete", &project, Some(&human))
        }
    }
}

fn push_warnings(human: &mut HumanOutput, warnings: &[String]) {
    for warning in warnings {
        human.push_warning(warning.clone());
    }
}
