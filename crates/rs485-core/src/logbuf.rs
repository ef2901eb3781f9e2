use chrono::{DateTime, Local};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Tx,
    Rx,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub kind: LogKind,
    pub message: String,
}

impl LogEntry {
    /// `HH:MM:SS - message`
    pub fn render(&self) -> String {
        format!("{} - {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Activity log shown to the user. Oldest entries fall off past `max_entries`.
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    pushed: u64,
}

impl LogStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
            pushed: 0,
        }
    }

    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        self.entries.push_back(LogEntry {
            timestamp: Local::now(),
            kind,
            message: message.into(),
        });
        self.pushed += 1;

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of entries ever pushed, including dropped and cleared ones.
    pub fn total(&self) -> u64 {
        self.pushed
    }

    /// Entries pushed after the caller had seen `seen` of them.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &LogEntry> {
        let fresh = self.pushed.saturating_sub(seen).min(self.entries.len() as u64) as usize;
        self.entries.iter().skip(self.entries.len() - fresh)
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            result.push_str(&entry.render());
            result.push('\n');
        }
        result
    }
}
