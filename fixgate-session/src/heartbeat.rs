/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Heartbeat and TestRequest supervision.
//!
//! This module handles FIX session liveness:
//! - Sending heartbeats when nothing was sent within the interval
//! - Sending a TestRequest when nothing was received within
//!   `(1 + margin) × interval`
//! - Detecting a TestRequest left unanswered for the grace window
//!
//! Time is passed in explicitly so the manager can be driven by any clock.

use std::time::Duration;
use tokio::time::Instant;

/// What the session should do after a [`HeartbeatManager::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing due.
    None,
    /// Send a Heartbeat.
    SendHeartbeat,
    /// Send a TestRequest carrying this TestReqID.
    SendTestRequest(String),
    /// The TestRequest went unanswered.
    TimedOut {
        /// Time since the last inbound message.
        silent_for: Duration,
    },
}

/// Manages heartbeat timing for a FIX session.
#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    margin: f64,
    grace: Duration,
    last_sent: Instant,
    last_received: Instant,
    /// Pending TestRequest ID, if any.
    test_request_pending: Option<String>,
    /// Time when TestRequest was sent.
    test_request_sent_at: Option<Instant>,
    test_request_counter: u64,
}

impl HeartbeatManager {
    /// Creates a manager whose clocks start at `now`.
    #[must_use]
    pub fn new(interval: Duration, margin: f64, grace: Duration, now: Instant) -> Self {
        Self {
            interval,
            margin,
            grace,
            last_sent: now,
            last_received: now,
            test_request_pending: None,
            test_request_sent_at: None,
            test_request_counter: 0,
        }
    }

    /// Records that a message was sent.
    #[inline]
    pub fn on_message_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }

    /// Records that a message was received.
    ///
    /// Any inbound traffic clears an outstanding TestRequest. Returns true
    /// when the message is a Heartbeat echoing the outstanding TestReqID.
    pub fn on_message_received(
        &mut self,
        now: Instant,
        is_heartbeat: bool,
        test_req_id: Option<&str>,
    ) -> bool {
        self.last_received = now;

        let answered = is_heartbeat
            && matches!(
                (&self.test_request_pending, test_req_id),
                (Some(pending), Some(received)) if pending == received
            );
        self.test_request_pending = None;
        self.test_request_sent_at = None;
        answered
    }

    /// Decides what is due at `now`.
    ///
    /// A TestRequest returned here is recorded as outstanding and counts as
    /// sent traffic.
    pub fn poll(&mut self, now: Instant) -> HeartbeatAction {
        if let Some(sent_at) = self.test_request_sent_at {
            if now.saturating_duration_since(sent_at) >= self.grace {
                return HeartbeatAction::TimedOut {
                    silent_for: now.saturating_duration_since(self.last_received),
                };
            }
        } else if now.saturating_duration_since(self.last_received) >= self.test_request_after() {
            self.test_request_counter += 1;
            let id = format!("TEST{}", self.test_request_counter);
            self.test_request_pending = Some(id.clone());
            self.test_request_sent_at = Some(now);
            self.last_sent = now;
            return HeartbeatAction::SendTestRequest(id);
        }

        if now.saturating_duration_since(self.last_sent) >= self.interval {
            return HeartbeatAction::SendHeartbeat;
        }
        HeartbeatAction::None
    }

    /// Silence tolerated before sending a TestRequest.
    #[must_use]
    pub fn test_request_after(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval.as_secs_f64() * (1.0 + self.margin))
            .unwrap_or(Duration::MAX)
    }

    /// Returns the pending TestRequest ID, if any.
    #[must_use]
    pub fn pending_test_request(&self) -> Option<&str> {
        self.test_request_pending.as_deref()
    }

    /// Returns the time the last message was received.
    #[must_use]
    pub const fn last_received(&self) -> Instant {
        self.last_received
    }

    /// Returns the time the last message was sent.
    #[must_use]
    pub const fn last_sent(&self) -> Instant {
        self.last_sent
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Adopts a new interval; the grace window follows it.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.grace = interval;
    }

    /// Restarts both clocks at `now` and drops any outstanding TestRequest.
    pub fn reset(&mut self, now: Instant) {
        self.last_sent = now;
        self.last_received = now;
        self.test_request_pending = None;
        self.test_request_sent_at = None;
    }
}
