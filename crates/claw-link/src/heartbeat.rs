//! Heartbeat tracking and staleness detection.
//!
//! The gateway pushes a `tick` event every `policy.tickIntervalMs`. The link
//! is considered stale once no tick has been seen for more than
//! `multiplier * interval` while connected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::state::ConnectionState;

/// Default multiple of the tick interval tolerated before declaring staleness.
pub const DEFAULT_STALE_MULTIPLIER: f64 = 2.0;

/// Point-in-time view of connection health, broadcast to health observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Lifecycle state when the snapshot was taken.
    pub state: ConnectionState,
    /// Wall-clock time of the last heartbeat.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Heartbeat interval declared by the gateway.
    pub tick_interval_ms: Option<u64>,
    /// Whether the heartbeat cadence has been missed.
    pub is_stale: bool,
    /// Reconnect attempts since the last successful handshake.
    pub reconnect_attempts: u32,
}

impl HealthSnapshot {
    /// Snapshot of a connection that never started.
    #[must_use]
    pub const fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_heartbeat: None,
            tick_interval_ms: None,
            is_stale: false,
            reconnect_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Beat {
    at: Instant,
    wall: DateTime<Utc>,
}

/// Tracks heartbeats for the current session.
#[derive(Debug)]
pub struct HeartbeatTracker {
    multiplier: f64,
    interval: Option<Duration>,
    last: Option<Beat>,
}

impl HeartbeatTracker {
    /// Create a tracker with no interval and no heartbeat yet.
    #[must_use]
    pub const fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            interval: None,
            last: None,
        }
    }

    /// Start tracking a fresh session.
    ///
    /// The handshake counts as the first heartbeat so a new session is never
    /// reported stale before the first tick is due.
    pub fn reset(&mut self, interval: Option<Duration>, now: Instant) {
        self.interval = interval;
        self.record(now);
    }

    /// Record a heartbeat.
    pub fn record(&mut self, now: Instant) {
        self.last = Some(Beat {
            at: now,
            wall: Utc::now(),
        });
    }

    /// Declared interval, if known.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Time since the last heartbeat, if one was recorded.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.last.map(|beat| now.saturating_duration_since(beat.at))
    }

    /// Whether the connection should be considered stale.
    #[must_use]
    pub fn is_stale(&self, state: ConnectionState, now: Instant) -> bool {
        if state != ConnectionState::Connected {
            return false;
        }
        let (Some(interval), Some(elapsed)) = (self.interval, self.elapsed(now)) else {
            return false;
        };
        elapsed > interval.mul_f64(self.multiplier)
    }

    /// Build a health snapshot.
    #[must_use]
    pub fn snapshot(
        &self,
        state: ConnectionState,
        reconnect_attempts: u32,
        now: Instant,
    ) -> HealthSnapshot {
        HealthSnapshot {
            state,
            last_heartbeat: self.last.map(|beat| beat.wall),
            tick_interval_ms: self.interval.map(|i| i.as_millis() as u64),
            is_stale: self.is_stale(state, now),
            reconnect_attempts,
        }
    }
}
