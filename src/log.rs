//! Append-only event log for tempo.
//!
//! Events are stored as JSONL in `.tempo/events.jsonl`, one event per line,
//! never rewritten in place. `append`/`append_batch` are the only mutators
//! and acknowledge success only after the line is durable on disk; an
//! append that fails to persist is not retained in memory. Appends are
//! serialized behind a mutex (and an `fs2` file lock against stray second
//! processes); reads hand back defensive copies, never references into the
//! internal buffer.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EVENT_VERSION};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// A durably appended event and its position in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Zero-based position in append order.
    pub offset: usize,
    pub event: Event,
}

/// A line skipped during load because it could not be decoded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CorruptLine {
    /// One-based line number in the log file.
    pub line: usize,
    pub message: String,
}

/// What `EventLog::load` found on disk.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrupt: Vec<CorruptLine>,
}

/// Envelope used to classify undecodable lines: if this parses, the line is
/// a well-formed event of a kind or version this build does not know:
/// fatal, because it signals a forward-incompatible writer. Otherwise the
/// line is corrupt and gets skipped.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[allow(dead_code)]
    id: Uuid,
    #[serde(rename = "type")]
    kind: String,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
    version: u32,
    #[allow(dead_code)]
    payload: serde_json::Value,
}

/// Durable, ordered event log.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    /// Open the log at `path`, replaying existing lines into memory.
    ///
    /// Corrupt lines are skipped and reported; an unknown event type or
    /// version aborts the load (`UnknownEventError`).
    pub fn load(path: impl Into<PathBuf>) -> Result<(Self, LoadReport)> {
        let path = path.into();
        let mut events = Vec::new();
        let mut report = LoadReport::default();

        if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match decode_line(trimmed, index + 1)? {
                    Decoded::Event(event) => events.push(event),
                    Decoded::Corrupt(corrupt) => {
                        warn!(
                            line = corrupt.line,
                            error = %corrupt.message,
                            "skipping corrupt event record"
                        );
                        report.corrupt.push(corrupt);
                    }
                }
            }
        }

        report.loaded = events.len();
        Ok((
            Self {
                path,
                events: Mutex::new(events),
            },
            report,
        ))
    }

    /// Path of the backing JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Durably append one event.
    pub fn append(&self, event: Event) -> Result<LogEntry> {
        let mut entries = self.entries();
        self.persist(std::slice::from_ref(&event))?;
        let offset = entries.len();
        entries.push(event.clone());
        Ok(LogEntry { offset, event })
    }

    /// Durably append several events as one write. Either the whole batch
    /// is acknowledged or none of it is retained in memory.
    pub fn append_batch(&self, events: &[Event]) -> Result<Vec<LogEntry>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut entries = self.entries();
        self.persist(events)?;
        let base = entries.len();
        entries.extend_from_slice(events);
        Ok(events
            .iter()
            .enumerate()
            .map(|(index, event)| LogEntry {
                offset: base + index,
                event: event.clone(),
            })
            .collect())
    }

    /// All events in append order.
    pub fn all(&self) -> Vec<Event> {
        self.entries().clone()
    }

    /// Look up one event by id.
    pub fn by_id(&self, id: Uuid) -> Option<Event> {
        self.entries().iter().find(|event| event.id == id).cloned()
    }

    /// Events whose payload references the given entity id.
    pub fn by_entity(&self, entity_id: &str) -> Vec<Event> {
        self.entries()
            .iter()
            .filter(|event| event.entity_ids().contains(&entity_id))
            .cloned()
            .collect()
    }

    /// Events stamped within `[start, end]`. Timestamps are advisory: the
    /// returned slice keeps append order, which is authoritative.
    pub fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Event> {
        self.entries()
            .iter()
            .filter(|event| event.timestamp >= start && event.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Events of one kind, in append order.
    pub fn by_kind(&self, kind: EventKind) -> Vec<Event> {
        self.entries()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    /// Wipe the log. Test isolation only; no command path reaches this.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries();
        let lock_path = self.lock_path();
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        entries.clear();
        Ok(())
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Write events as JSONL lines and sync before acknowledging.
    fn persist(&self, events: &[Event]) -> Result<()> {
        let mut buffer = Vec::new();
        for event in events {
            let line = serde_json::to_vec(event)
                .map_err(|err| Error::Persistence(format!("encode event: {err}")))?;
            buffer.extend_from_slice(&line);
            buffer.push(b'\n');
        }

        let lock_path = self.lock_path();
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(&buffer)?;
            file.sync_all()
        };

        write().map_err(|err| {
            Error::Persistence(format!("append to {}: {err}", self.path.display()))
        })
    }
}

enum Decoded {
    Event(Event),
    Corrupt(CorruptLine),
}

fn decode_line(line: &str, line_no: usize) -> Result<Decoded> {
    match serde_json::from_str::<Event>(line) {
        Ok(event) => {
            if event.version != EVENT_VERSION {
                return Err(Error::UnknownEvent {
                    kind: event.kind().as_str().to_string(),
                    version: event.version,
                });
            }
            Ok(Decoded::Event(event))
        }
        Err(typed_err) => match serde_json::from_str::<RawEnvelope>(line) {
            Ok(raw) => {
                if raw.kind.parse::<EventKind>().is_ok() && raw.version == EVENT_VERSION {
                    // Known kind, undecodable payload: corrupt, not a
                    // forward-incompatible writer.
                    Ok(Decoded::Corrupt(CorruptLine {
                        line: line_no,
                        message: typed_err.to_string(),
                    }))
                } else {
                    // Well-formed envelope of a kind/version this build
                    // does not know. Refuse to guess.
                    Err(Error::UnknownEvent {
                        kind: raw.kind,
                        version: raw.version,
                    })
                }
            }
            Err(_) => Ok(Decoded::Corrupt(CorruptLine {
                line: line_no,
                message: typed_err.to_string(),
            })),
        },
    }
}
