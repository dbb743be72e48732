/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session lifecycle phases and the read-only state snapshot.
//!
//! `Disconnected → LogonPending → Active → LogoutPending → Disconnected`.
//! The phase is data rather than a type parameter because it changes in
//! response to the wire, inside one long-lived actor.

use crate::sequence::GapWindow;
use fixgate_core::types::{SeqNum, SessionId};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle phase of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No connection. Initial and terminal.
    Disconnected,
    /// Connected, waiting for the counterparty's Logon.
    LogonPending {
        /// When the wait started.
        since: Instant,
    },
    /// Logged on.
    Active,
    /// Logout sent or received, waiting to close.
    LogoutPending {
        /// When the Logout was sent.
        since: Instant,
        /// Whether this side sent the first Logout.
        initiated_locally: bool,
    },
}

impl SessionPhase {
    /// Short name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::LogonPending { .. } => "LogonPending",
            Self::Active => "Active",
            Self::LogoutPending { .. } => "LogoutPending",
        }
    }

    /// True while logged on, logout in progress included.
    #[must_use]
    pub const fn is_logged_on(&self) -> bool {
        matches!(self, Self::Active | Self::LogoutPending { .. })
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a connection is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Logout exchange finished.
    LogoutComplete,
    /// No Logon within the logon timeout.
    LogonTimeout,
    /// No Logout echo within the logout timeout.
    LogoutTimeout,
    /// TestRequest unanswered.
    HeartbeatTimeout,
    /// Comp ids do not match the session.
    IdentityMismatch,
    /// MsgSeqNum below expectation without PossDupFlag.
    SequenceTooLow,
    /// Logon was invalid.
    LogonRejected,
    /// The byte stream closed.
    TransportClosed,
    /// The counterparty broke the session protocol.
    ProtocolViolation,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LogoutComplete => "logout complete",
            Self::LogonTimeout => "logon timeout",
            Self::LogoutTimeout => "logout timeout",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::IdentityMismatch => "comp id mismatch",
            Self::SequenceTooLow => "sequence number too low",
            Self::LogonRejected => "logon rejected",
            Self::TransportClosed => "transport closed",
            Self::ProtocolViolation => "protocol violation",
        })
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Session identity.
    pub session_id: SessionId,
    /// Current phase.
    pub phase: SessionPhase,
    /// Next outbound MsgSeqNum.
    pub next_outbound: SeqNum,
    /// Next expected inbound MsgSeqNum.
    pub next_inbound: SeqNum,
    /// Heartbeat interval in force.
    pub heartbeat_interval: Duration,
    /// A TestRequest is outstanding.
    pub awaiting_test_response: bool,
    /// Open gap, if any.
    pub gap: Option<GapWindow>,
    /// Last outbound traffic.
    pub last_sent: Instant,
    /// Last inbound traffic.
    pub last_received: Instant,
}
