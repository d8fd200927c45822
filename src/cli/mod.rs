//! Command-line interface for tempo
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::EventDestination;
use crate::output::OutputOptions;
use crate::store::{OpenReport, Store};
use crate::storage::Storage;

mod init;
mod log;
mod milestone;
mod project;
mod status;
mod task;

/// tempo - event-sourced project tracking
///
/// Tracks a project -> milestone -> task hierarchy in an append-only event
/// log, with derived statuses and statistics.
#[derive(Parser, Debug)]
#[command(name = "tempo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory to operate in (defaults to current directory)
    #[arg(long, global = true, env = "TEMPO_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Mirror applied events as JSONL to a file, or to stdout with `-`
    #[arg(long, global = true, env = "TEMPO_EVENTS")]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a tempo directory here
    Init,

    /// Project management
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Milestone management
    #[command(subcommand)]
    Milestone(milestone::MilestoneCommands),

    /// Task management
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Overview of the whole hierarchy with statistics
    Status,

    /// Inspect the event history
    Log {
        /// Only events referencing this project/milestone/task id
        #[arg(long)]
        entity: Option<String>,

        /// Only events of this kind (e.g. task_started)
        #[arg(long)]
        kind: Option<String>,

        /// Only events stamped at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,

        /// Only events stamped at or before this RFC 3339 timestamp
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of events to show (most recent last)
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let options = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match &self.command {
            Commands::Init => init::run(self.start_dir()?, options),
            Commands::Project(command) => {
                let (store, report) = self.open_store()?;
                project::run(&store, &report, command, options)
            }
            Commands::Milestone(command) => {
                let (store, report) = self.open_store()?;
                milestone::run(&store, &report, command, options)
            }
            Commands::Task(command) => {
                let (store, report) = self.open_store()?;
                task::run(&store, &report, command, options)
            }
            Commands::Status => {
                let (store, report) = self.open_store()?;
                status::run(&store, &report, options)
            }
            Commands::Log {
                entity,
                kind,
                since,
                until,
                limit,
            } => {
                let (store, report) = self.open_store()?;
                log::run(
                    &store,
                    &report,
                    log::LogOptions {
                        entity: entity.clone(),
                        kind: kind.clone(),
                        since: since.clone(),
                        until: until.clone(),
                        limit: *limit,
                    },
                    options,
                )
            }
        }
    }

    fn start_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn open_store(&self) -> Result<(Store, OpenReport)> {
        let storage = Storage::discover(self.start_dir()?)?;
        let config = Config::load(&storage.config_file())?;
        let (store, report) = Store::open(&storage, config)?;
        if let Some(destination) = EventDestination::parse(self.events.as_deref()) {
            store.set_event_sink(Some(destination.open()?));
        }
        Ok((store, report))
    }
}

/// Warnings about what open found, surfaced in command output.
pub(crate) fn load_warnings(report: &OpenReport) -> Vec<String> {
    report
        .corrupt
        .iter()
        .map(|corrupt| {
            format!(
                "skipped corrupt event record at line {}: {}",
                corrupt.line, corrupt.message
            )
        })
        .collect()
}

/// Parse an RFC 3339 timestamp CLI argument.
pub(crate) fn parse_timestamp(label: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(value).map_err(|err| {
        Error::InvalidArgument(format!("invalid {label} timestamp '{value}': {err}"))
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}
