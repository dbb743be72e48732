/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Core
//!
//! Types shared by every fixgate crate:
//! - **Error types**: one `thiserror` enum per layer, aggregated by [`FixError`]
//! - **Fields and messages**: [`Field`], [`FixMessage`], [`MsgType`]
//! - **Identifiers**: [`SeqNum`], [`CompId`], [`SessionId`], [`Timestamp`]
//! - **Tag numbers**: the [`tags`] used by the session layer

pub mod error;
pub mod field;
pub mod message;
pub mod tags;
pub mod types;

pub use error::{
    DecodeError, EncodeError, FixError, Result, SequenceError, SessionError, StoreError,
    TransportError,
};
pub use field::Field;
pub use message::{FixMessage, MsgType};
pub use types::{CompId, SeqNum, SessionId, Timestamp};
