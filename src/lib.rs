//! tempo - Event-Sourced Project Tracking Library
//!
//! This library provides the core functionality for the tempo CLI tool:
//! a project -> milestone -> task hierarchy whose current state is derived
//! from an append-only log of typed events.
//!
//! # Core Concepts
//!
//! - **Events**: immutable, versioned facts, one JSONL line each
//! - **Projection**: `AppState` obtained by folding the log in append order
//! - **Cascade**: task status changes recompute milestone and project
//!   statuses, recorded as derived events with no-op suppression
//! - **Snapshots**: materialized `AppState` so restart avoids full replay
//! - **Tombstones**: deletes remove entities from the projection only; the
//!   log keeps the full history
//!
//! # Module Organization
//!
//! - `cli`: command-line interface using clap
//! - `cascade`: composite status rules, transition table, statistics
//! - `config`: configuration loading from `.tempo.toml`
//! - `error`: error types and result aliases
//! - `event`: event model and factory functions
//! - `graph`: dependency adjacency and cycle detection
//! - `id`: entity id generation
//! - `lock`: file locking and atomic writes
//! - `log`: durable append-only event log
//! - `model`: domain entities (project, milestone, task, statistics)
//! - `notify`: pub/sub and JSONL mirroring of applied events
//! - `output`: human/JSON output envelopes for the CLI
//! - `projector`: fold and replay
//! - `snapshot`: snapshot persistence
//! - `state`: the derived `AppState`
//! - `storage`: data-directory layout
//! - `store`: command layer tying everything together

pub mod cascade;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod id;
pub mod lock;
pub mod log;
pub mod model;
pub mod notify;
pub mod output;
pub mod projector;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod store;

pub use error::{Error, Result};
