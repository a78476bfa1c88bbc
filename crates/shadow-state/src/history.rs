//! Bounded per-channel history of transient events.
//!
//! Channel events (chat messages, hitsplats, animations, ...) do not update
//! entities; the most recent ones are kept per channel in a ring buffer so
//! callers can look back a few events. Once a channel holds `capacity`
//! events the oldest is dropped.

use std::collections::{BTreeMap, VecDeque};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of events retained per channel.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One received channel event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub channel: String,
    pub data: Value,
    /// Global arrival order across all channels.
    pub sequence: u64,
    pub received_at: SystemTime,
}

#[derive(Debug)]
pub struct EventHistory {
    capacity: usize,
    channels: BTreeMap<String, VecDeque<RecordedEvent>>,
    next_sequence: u64,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    pub fn record(&mut self, channel: String, data: Value) {
        if self.capacity == 0 {
            return;
        }
        let event = RecordedEvent {
            channel: channel.clone(),
            data,
            sequence: self.next_sequence,
            received_at: SystemTime::now(),
        };
        self.next_sequence += 1;

        let buffer = self.channels.entry(channel).or_default();
        buffer.push_back(event);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Up to `n` most recent events on `channel`, oldest first.
    pub fn recent(&self, channel: &str, n: usize) -> Vec<RecordedEvent> {
        self.channels
            .get(channel)
            .map(|buffer| {
                let skip = buffer.len().saturating_sub(n);
                buffer.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Forget every buffered event. Sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Total events ever recorded, including those since evicted.
    pub fn total_recorded(&self) -> u64 {
        self.next_sequence
    }
}
