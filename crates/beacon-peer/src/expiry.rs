//! Heartbeat expiry tracking.
//!
//! Every polled connection has a liveness deadline. Any received message
//! pushes it to `now + timeout`. A single `check_at` cursor holds the
//! nearest deadline so the event loop can tell cheaply whether a sweep is
//! due; it never sits above the smallest tracked deadline.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::connection::ConnectionId;

/// Interval at which peers are expected to emit traffic.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Silence longer than this triggers a reconnect.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest accepted heartbeat interval. Larger values are clamped.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout matching a heartbeat interval (twice the interval, after clamping
/// to [`MAX_HEARTBEAT_INTERVAL`]).
pub fn heartbeat_timeout(interval: Duration) -> Duration {
    interval.min(MAX_HEARTBEAT_INTERVAL) * 2
}

/// Outcome of handling one expired entry during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiredAction {
    /// Reconnect succeeded; the deadline moves to `now + timeout`.
    Reconnected,
    /// Reconnect failed or was not attempted; re-evaluate on the next sweep.
    Retry,
    /// The connection no longer exists; stop tracking it.
    Gone,
}

/// What a sweep did, by connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<ConnectionId>,
    pub reconnected: Vec<ConnectionId>,
    pub retrying: Vec<ConnectionId>,
    pub dropped: Vec<ConnectionId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
    }
}

/// Deadline table plus the lazily recomputed `check_at` cursor.
#[derive(Debug, Clone)]
pub struct ExpiryTracker {
    deadlines: BTreeMap<ConnectionId, Instant>,
    check_at: Instant,
    timeout: Duration,
}

impl ExpiryTracker {
    /// `timeout` is capped at twice [`MAX_HEARTBEAT_INTERVAL`].
    pub fn new(timeout: Duration, now: Instant) -> Self {
        let timeout = timeout.min(heartbeat_timeout(MAX_HEARTBEAT_INTERVAL));
        Self {
            deadlines: BTreeMap::new(),
            check_at: now + timeout,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start tracking `id` with a full timeout ahead of it.
    pub fn register(&mut self, id: ConnectionId, now: Instant) {
        self.arm(id, now + self.timeout);
    }

    /// Traffic seen on `id`: push its deadline to `now + timeout`.
    ///
    /// An id that was dropped earlier is tracked again.
    pub fn refresh(&mut self, id: ConnectionId, now: Instant) {
        self.arm(id, now + self.timeout);
    }

    /// Stop tracking `id`. Returns whether it was tracked.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.deadlines.remove(&id).is_some()
    }

    /// Whether `now` has reached the cursor.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.check_at
    }

    pub fn check_at(&self) -> Instant {
        self.check_at
    }

    pub fn deadline(&self, id: ConnectionId) -> Option<Instant> {
        self.deadlines.get(&id).copied()
    }

    pub fn min_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Walk every entry, handing expired ones to `on_expired`.
    ///
    /// The cursor is first set to `now + timeout`, then shrunk to the
    /// nearest deadline that has not passed. Entries answered with
    /// [`ExpiredAction::Retry`] keep their expired status but are re-armed
    /// to that provisional cursor, so they come up again at the next sweep.
    pub fn sweep<F>(&mut self, now: Instant, mut on_expired: F) -> SweepReport
    where
        F: FnMut(ConnectionId) -> ExpiredAction,
    {
        let mut report = SweepReport::default();
        let next = now + self.timeout;
        self.check_at = next;

        self.deadlines.retain(|&id, deadline| {
            if *deadline > now {
                if *deadline < self.check_at {
                    self.check_at = *deadline;
                }
                return true;
            }

            report.expired.push(id);
            match on_expired(id) {
                ExpiredAction::Reconnected => {
                    report.reconnected.push(id);
                    *deadline = next;
                    true
                }
                ExpiredAction::Retry => {
                    report.retrying.push(id);
                    *deadline = next;
                    true
                }
                ExpiredAction::Gone => {
                    report.dropped.push(id);
                    false
                }
            }
        });

        report
    }

    fn arm(&mut self, id: ConnectionId, deadline: Instant) {
        self.deadlines.insert(id, deadline);
        if deadline < self.check_at {
            self.check_at = deadline;
        }
    }
}
