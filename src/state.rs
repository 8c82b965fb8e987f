//! Shared poll status, read by the health responder.
//!
//! The poll loop is the sole writer; the health server only takes
//! snapshots. `polls_total` counts cycles that wrote at least one point
//! from new data — duplicate-skip and empty cycles leave it untouched.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct PollStatus {
    polls_total: AtomicU64,
    last_poll: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub last_poll: Option<DateTime<Utc>>,
    pub polls_total: u64,
}

impl PollStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a successful cycle that wrote new data.
    pub fn record_poll(&self, at: DateTime<Utc>) {
        // last_poll first so a concurrent snapshot never shows a bumped
        // counter with a stale timestamp.
        if let Ok(mut guard) = self.last_poll.lock() {
            *guard = Some(at);
        }
        self.polls_total.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> PollSnapshot {
        let last_poll = self.last_poll.lock().map(|guard| *guard).unwrap_or(None);
        PollSnapshot {
            last_poll,
            polls_total: self.polls_total.load(Ordering::Acquire),
        }
    }
}
