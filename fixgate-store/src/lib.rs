/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Store
//!
//! Sequence counters and outbound message persistence for the FixGate
//! session engine.
//!
//! This crate provides:
//! - **MessageStore trait**: Abstract interface for counters and replay log
//! - **MemoryStore**: In-memory store for testing and ephemeral sessions
//! - **FileStore**: File-based durable store keyed by session identity

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::MessageStore;
