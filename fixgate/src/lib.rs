/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate
//!
//! A FIX session engine for Rust.
//!
//! FixGate implements the session layer shared by FIX 4.x and FIXT 1.1:
//! logon and logout, sequence numbering, gap detection and recovery,
//! Heartbeat/TestRequest liveness, and persistence of every outbound message
//! before it reaches the wire.
//!
//! ## Features
//!
//! - **Persist before send**: outbound messages are stored before they are written
//! - **Gap recovery**: early messages are queued while a ResendRequest is outstanding
//! - **Resend fidelity**: replays keep their sequence numbers and collapse
//!   administrative messages into gap fills
//! - **Sans-IO core**: the session state machine is testable without sockets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixgate::prelude::*;
//!
//! let config = SessionConfig::new(
//!     CompId::new("CLIENT").unwrap(),
//!     CompId::new("BROKER").unwrap(),
//!     "FIX.4.4",
//!     Role::Initiator,
//! );
//! let (mut engine, handle) = EngineBuilder::new()
//!     .with_application(MyApplication)
//!     .with_session(config)
//!     .build()?;
//! tokio::spawn(async move { engine.connect("127.0.0.1:9876").await });
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types and error definitions
//! - [`dictionary`]: Session dictionary, validation and message dumps
//! - [`tagvalue`]: Tag=value encoding and decoding
//! - [`session`]: Session state machine
//! - [`store`]: Sequence counters and outbound message persistence
//! - [`transport`]: Framing codec and TCP helpers
//! - [`engine`]: Task runner, handle and application interface

pub mod core {
    //! Core types and error definitions.
    pub use fixgate_core::*;
}

pub mod dictionary {
    //! Session dictionary, validation and message dumps.
    pub use fixgate_dictionary::*;
}

pub mod tagvalue {
    //! Tag=value encoding and decoding.
    pub use fixgate_tagvalue::*;
}

pub mod session {
    //! Session state machine.
    pub use fixgate_session::*;
}

pub mod store {
    //! Sequence counters and outbound message persistence.
    pub use fixgate_store::*;
}

pub mod transport {
    //! Framing codec and TCP helpers.
    pub use fixgate_transport::*;
}

pub mod engine {
    //! Task runner, handle and application interface.
    pub use fixgate_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use fixgate_core::{
        CompId, DecodeError, EncodeError, FixError, FixMessage, MsgType, Result, SeqNum,
        SequenceError, SessionError, SessionId, StoreError, Timestamp, TransportError,
    };

    // Dictionary
    pub use fixgate_dictionary::{Dictionary, ValidationError, Version};

    // Session
    pub use fixgate_session::{
        DisconnectReason, Role, SessionConfig, SessionConfigBuilder, SessionPhase, SessionState,
    };

    // Store
    pub use fixgate_store::{FileStore, MemoryStore, MessageStore};

    // Transport
    pub use fixgate_transport::{Acceptor, FixCodec, InboundFrame};

    // Engine
    pub use fixgate_engine::{Application, Engine, EngineBuilder, NoOpApplication, SessionHandle};
}
