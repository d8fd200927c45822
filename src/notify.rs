//! Notification of applied events.
//!
//! Two non-durable channels for interactive front-ends (countdown timers,
//! chart renderers) that want to react without re-reading the log:
//! - in-process pub/sub: `Notifier::subscribe` hands out an mpsc receiver
//!   that gets a copy of every applied event;
//! - an optional JSONL mirror to stdout or a file, one event per line in
//!   the wire format.
//!
//! Delivery is best-effort by design: the log is the durable record, and
//! a disconnected subscriber or failing mirror never blocks a command.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::event::Event;

/// Where the JSONL mirror writes.
#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    /// Parse a `--events` value: `-` means stdout, anything else is a path,
    /// empty means no mirror.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// Sink that mirrors applied events as JSONL.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

impl EventSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as one JSON line.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Fan-out of applied events to in-process subscribers and the mirror.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Sender<Event>>>,
    sink: Mutex<Option<EventSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The receiver gets every event applied after
    /// this call; dropping it unsubscribes on the next publish.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (sender, receiver) = channel();
        self.lock_subscribers().push(sender);
        receiver
    }

    /// Attach (or replace) the JSONL mirror.
    pub fn set_sink(&self, sink: Option<EventSink>) {
        *self.lock_sink() = sink;
    }

    /// Deliver one applied event. Disconnected subscribers are dropped; a
    /// mirror write failure is logged and does not fail the command.
    pub fn publish(&self, event: &Event) {
        self.lock_subscribers()
            .retain(|sender| sender.send(event.clone()).is_ok());

        let mut sink = self.lock_sink();
        if let Some(active) = sink.as_mut() {
            if let Err(err) = active.emit(event) {
                tracing::warn!(error = %err, "event mirror write failed, detaching sink");
                *sink = None;
            }
        }
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<Event>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<EventSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
