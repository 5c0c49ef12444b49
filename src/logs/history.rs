//! Bounded, time-ordered buffer of log entries seen this session.
//!
//! Entries are appended at the tail and evicted from the head. Each entry
//! remembers whether it is currently on screen, so a redraw only prints what
//! is missing.

use std::collections::VecDeque;

use super::LogEntry;

/// The default number of entries kept for browsing back.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug)]
pub struct History {
    entries: VecDeque<LogEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LogEntry> {
        self.entries.get_mut(index)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Append at the tail. Does not prune.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
    }

    /// Drop the oldest entries until at most `limit` remain.
    pub fn prune(&mut self) {
        let excess = self.entries.len().saturating_sub(self.limit);
        if excess > 0 {
            self.entries.drain(..excess);
            tracing::trace!(evicted = excess, "pruned history");
        }
    }

    /// Index of the oldest entry not yet on screen.
    pub fn first_unprinted(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_printed())
    }

    /// Mark the newest `visible` entries as no longer on screen.
    ///
    /// Called after the terminal is cleared; only as many entries as fit on
    /// screen are worth redrawing.
    pub fn mark_unprinted(&mut self, visible: usize) {
        let skip = self.entries.len().saturating_sub(visible);
        for entry in self.entries.iter_mut().skip(skip) {
            entry.set_printed(false);
        }
    }
}
