/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Engine
//!
//! Runs a FixGate session over a byte stream.
//!
//! This crate provides:
//! - **Engine**: the task owning a session, serializing inbound frames,
//!   timer ticks and application requests
//! - **Session handle**: cloneable sender for application messages, logout
//!   and state queries
//! - **Application trait**: Callback interface for handling FIX messages
//! - **Builder API**: Fluent configuration for engine setup

pub mod application;
pub mod builder;
pub mod engine;
pub mod handle;

pub use application::{Application, NoOpApplication};
pub use builder::EngineBuilder;
pub use engine::Engine;
pub use handle::SessionHandle;
