/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Transport
//!
//! Network transport layer for the FixGate session engine.
//!
//! This crate provides:
//! - **Codec**: Tokio codec for FIX message framing that survives garbled frames
//! - **TCP transport**: Connector and acceptor helpers for TCP connections

pub mod codec;
pub mod tcp;

pub use codec::{FixCodec, InboundFrame};
pub use tcp::{Acceptor, connect};
