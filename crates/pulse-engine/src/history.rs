//! Bounded fire-event history log.
//!
//! Retention is an explicit parameter rather than an implicit magic
//! number: the log holds at most `max_entries` events and drops the oldest
//! first. Rotation to durable storage is a collaborator concern.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use pulse_types::FireEvent;

use crate::config::HistoryConfig;

/// Append-only, capacity-bounded log of fire events.
pub struct FireHistory {
    config: HistoryConfig,
    events: RwLock<VecDeque<FireEvent>>,
}

impl FireHistory {
    /// Create a log with the given retention.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            events: RwLock::new(VecDeque::new()),
        }
    }

    /// Append an event, dropping the oldest entries beyond retention.
    pub fn append(&self, event: FireEvent) {
        let mut events = self.events.write().unwrap();
        events.push_back(event);
        while events.len() > self.config.max_entries {
            events.pop_front();
        }
    }

    /// All retained events, oldest first.
    pub fn all(&self) -> Vec<FireEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }

    /// Retained events with `timestamp >= since`, oldest first.
    pub fn since(&self, since: DateTime<Utc>) -> Vec<FireEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
