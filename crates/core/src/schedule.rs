//! Watchlist refresh scheduling.
//!
//! The refresh normally runs on a fixed cadence. After a liquidation the
//! node keeps serving pre-liquidation state for a while, so the next
//! refresh is pushed out to a one-shot quarantine deadline; once that
//! refresh fires the regular cadence resumes from there.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Regular cadence; next refresh at `next_at`.
    Normal { next_at: Instant },
    /// One refresh at `fire_at`, then back to `Normal`.
    Quarantined { fire_at: Instant },
}

impl RefreshState {
    pub fn deadline(&self) -> Instant {
        match *self {
            RefreshState::Normal { next_at } => next_at,
            RefreshState::Quarantined { fire_at } => fire_at,
        }
    }

    pub fn is_quarantined(&self) -> bool {
        matches!(self, RefreshState::Quarantined { .. })
    }
}

/// Deadline for the next watchlist refresh, shared by the refresh task
/// (which waits on it) and the decision loop (which quarantines it).
#[derive(Debug)]
pub struct RefreshScheduler {
    state: Mutex<RefreshState>,
    interval: Duration,
    quarantine_delay: Duration,
    changed: Notify,
}

impl RefreshScheduler {
    /// The first refresh is due immediately.
    pub fn new(interval: Duration, quarantine_delay: Duration) -> Self {
        Self {
            state: Mutex::new(RefreshState::Normal {
                next_at: Instant::now(),
            }),
            interval,
            quarantine_delay,
            changed: Notify::new(),
        }
    }

    pub fn state(&self) -> RefreshState {
        *self.state.lock()
    }

    pub fn deadline(&self) -> Instant {
        self.state.lock().deadline()
    }

    /// Replace any pending refresh with a single one `quarantine_delay`
    /// after `now`. Calling it again while quarantined re-arms the timer.
    pub fn quarantine(&self, now: Instant) -> Instant {
        let fire_at = now + self.quarantine_delay;
        *self.state.lock() = RefreshState::Quarantined { fire_at };
        self.changed.notify_one();
        fire_at
    }

    /// Mark a refresh as started at `now`; the next one is due a full
    /// interval later whichever state we were in.
    pub fn fire(&self, now: Instant) -> RefreshState {
        let mut state = self.state.lock();
        let previous = *state;
        *state = RefreshState::Normal {
            next_at: now + self.interval,
        };
        previous
    }

    /// Wait until the current deadline passes. A state change while
    /// waiting moves the deadline.
    pub async fn wait_due(&self) {
        loop {
            // A change racing with the deadline read leaves a stored
            // permit, so `notified` completes right away.
            let notified = self.changed.notified();
            let deadline = self.deadline();
            if deadline <= Instant::now() {
                return;
            }
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = notified => {}
            }
        }
    }
}
