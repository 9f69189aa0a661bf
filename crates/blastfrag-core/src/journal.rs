//! Event journal: every step outcome is recorded as `(module, event, level)`
//! and mirrored to `tracing`.

use crate::domain::{CalcError, Severity};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_JOURNAL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl EventLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl From<Severity> for EventLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => Self::Warning,
            Severity::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub timestamp_ms: u128,
    pub module: &'static str,
    pub event: String,
    pub level: EventLevel,
}

/// Receiver for calculation events. Implementations must not fail the caller.
pub trait EventSink {
    fn record(&mut self, entry: JournalEntry);

    fn emit(&mut self, module: &'static str, level: EventLevel, event: impl Into<String>)
    where
        Self: Sized,
    {
        let entry = JournalEntry {
            timestamp_ms: now_millis(),
            module,
            event: event.into(),
            level,
        };
        trace_entry(&entry);
        self.record(entry);
    }

    fn emit_error(&mut self, module: &'static str, error: &CalcError)
    where
        Self: Sized,
    {
        self.emit(
            module,
            error.category().severity().into(),
            format!("[{}] {}", error.placeholder(), error.message()),
        );
    }
}

/// Sink that only forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, _entry: JournalEntry) {}
}

#[derive(Debug, Clone)]
pub struct EventJournal {
    capacity: usize,
    entries: VecDeque<JournalEntry>,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl EventJournal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_level(&self, level: EventLevel) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let entries: Vec<&JournalEntry> = self.entries.iter().collect();
        serde_json::to_string_pretty(&entries)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let content = self.to_json().map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }
}

impl EventSink for EventJournal {
    fn record(&mut self, entry: JournalEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

fn trace_entry(entry: &JournalEntry) {
    match entry.level {
        EventLevel::Info | EventLevel::Success => {
            tracing::info!(module = entry.module, level = entry.level.as_str(), "{}", entry.event)
        }
        EventLevel::Warning => tracing::warn!(module = entry.module, "{}", entry.event),
        EventLevel::Error => tracing::error!(module = entry.module, "{}", entry.event),
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}
