use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One out-of-band analysis or mission event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Timestamp as sent by the producer; free-form.
    pub timestamp: String,
    pub message: String,
}

impl FeedEvent {
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
        }
    }
}

/// Bounded append-only event buffer.
///
/// Once `capacity` is reached, each push drops the oldest entry.
#[derive(Debug, Clone)]
pub struct EventFeed {
    capacity: usize,
    events: VecDeque<FeedEvent>,
    dropped: u64,
}

pub type SharedEventFeed = Arc<Mutex<EventFeed>>;

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedEventFeed {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn push(&mut self, event: FeedEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FeedEvent> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&FeedEvent> {
        self.events.back()
    }
}
