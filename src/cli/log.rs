//! tempo log subcommand implementation.
//!
//! Displays the event history with entity, kind, and time-range filters.
//! Events are shown in append order, which is authoritative; the time-range
//! filter uses the advisory wall-clock timestamps.

use serde::Serialize;

use crate::error::Result;
use crate::event::{Event, EventKind};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{OpenReport, Store};

/// Options for the log command.
pub struct LogOptions {
    pub entity: Option<String>,
    pub kind: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: usize,
}

#[derive(Serialize)]
struct LogEntry {
    id: String,
    #[serde(rename = "type")]
    kind: EventKind,
    timestamp: String,
    payload: serde_json::Value,
}

#[derive(Serialize)]
struct LogReport {
    events: Vec<LogEntry>,
    total: usize,
    shown: usize,
}

pub fn run(
    store: &Store,
    report: &OpenReport,
    log_options: LogOptions,
    options: OutputOptions,
) -> Result<()> {
    let kind = log_options
        .kind
        .as_deref()
        .map(str::parse::<EventKind>)
        .transpose()?;
    let since = super::parse_timestamp("since", log_options.since.as_deref())?;
    let until = super::parse_timestamp("until", log_options.until.as_deref())?;

    let mut events = match &log_options.entity {
        Some(entity) => store.events_for_entity(entity),
        None => store.events(),
    };
    if let Some(kind) = kind {
        events.retain(|event| event.kind() == kind);
    }
    if let Some(since) = since {
        events.retain(|event| event.timestamp >= since);
    }
    if let Some(until) = until {
        events.retain(|event| event.timestamp <= until);
    }

    let total = events.len();
    let shown: Vec<Event> = events
        .into_iter()
        .rev()
        .take(log_options.limit)
        .rev()
        .collect();

    let mut human = HumanOutput::new(format!("{} event(s), showing {}", total, shown.len()));
    for event in &shown {
        human.push_detail(format!(
            "{}  {}  {}",
            event.timestamp.to_rfc3339(),
            event.kind(),
            event.entity_ids().join(",")
        ));
    }
    for warning in super::load_warnings(report) {
        human.push_warning(warning);
    }

    let entries: Vec<LogEntry> = shown
        .iter()
        .map(|event| {
            let payload = serde_json::to_value(event)
                .ok()
                .and_then(|value| value.get("payload").cloned())
                .unwrap_or(serde_json::Value::Null);
            LogEntry {
                id: event.id.to_string(),
                kind: event.kind(),
                timestamp: event.timestamp.to_rfc3339(),
                payload,
            }
        })
        .collect();

    let data = LogReport {
        total,
        shown: entries.len(),
        events: entries,
    };

    emit_success(options, "log", &data, Some(&human))
}
