/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Session
//!
//! FIX session layer for the FixGate engine.
//!
//! This crate provides:
//! - **State machine**: [`Session`], a sans-IO session driven by inbound
//!   messages, timer ticks and application sends
//! - **Sequencing**: gap detection, queueing of early arrivals, replay of
//!   stored messages with gap fills
//! - **Heartbeat handling**: Heartbeat/TestRequest liveness supervision
//! - **Administrative messages**: typed parse/build of the seven session
//!   messages
//! - **Configuration**: [`SessionConfig`] and its builder

pub mod admin;
pub mod config;
pub mod heartbeat;
pub mod sequence;
pub mod session;
pub mod state;

pub use admin::{AdminMessage, SessionRejectReason};
pub use config::{Role, SessionConfig, SessionConfigBuilder};
pub use heartbeat::{HeartbeatAction, HeartbeatManager};
pub use sequence::{GapTracker, GapWindow};
pub use session::{Action, Session};
pub use state::{DisconnectReason, SessionPhase, SessionState};
