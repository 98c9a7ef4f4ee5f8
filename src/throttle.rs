//! Batching of varp change notifications.
//!
//! Varps can change every game tick. Notifications only record the varp id in
//! the pending set; the owning tick path drains the set at most once per
//! throttle window. A pending force refresh suppresses notifications because
//! the refresh re-reads every known varp anyway.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Default minimum time between flushes.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(7);

#[derive(Debug, Clone)]
pub struct UpdateThrottler {
    delay: Duration,
    pending: BTreeSet<u32>,
    last_flush: Option<Instant>,
    force_refresh: bool,
}

impl Default for UpdateThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_DELAY)
    }
}

impl UpdateThrottler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeSet::new(),
            last_flush: None,
            force_refresh: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue a varp id. Returns false when suppressed by a pending force refresh.
    pub fn notify(&mut self, varp_id: u32) -> bool {
        if self.force_refresh {
            return false;
        }
        self.pending.insert(varp_id);
        true
    }

    pub fn pending(&self) -> &BTreeSet<u32> {
        &self.pending
    }

    pub fn request_force_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn force_refresh_pending(&self) -> bool {
        self.force_refresh
    }

    /// Clear the force flag if set. Pending ids are dropped and the window
    /// restarts, since the refresh supersedes them.
    pub fn take_force_refresh(&mut self, now: Instant) -> bool {
        if !self.force_refresh {
            return false;
        }
        self.force_refresh = false;
        self.pending.clear();
        self.last_flush = Some(now);
        true
    }

    /// A flush is due once strictly more than `delay` has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.delay,
        }
    }

    /// Drain the pending set when due. An empty drain still restarts the window.
    pub fn drain_due(&mut self, now: Instant) -> Option<Vec<u32>> {
        if !self.is_due(now) {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }

    /// Drop pending ids without flushing (logout, shutdown).
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.force_refresh = false;
        dropped
    }
}
