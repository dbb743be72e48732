/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the fixgate session engine.
//!
//! Every layer has its own `thiserror` enum, and [`FixError`] aggregates them
//! so that callers crossing layers can use a single `?`:
//! - [`DecodeError`]: framing and parsing failures on inbound bytes
//! - [`EncodeError`]: refusals while serializing an outbound message
//! - [`SessionError`]: lifecycle and configuration errors
//! - [`SequenceError`]: inbound sequence-number violations
//! - [`StoreError`]: persistence failures
//! - [`TransportError`]: byte-stream failures

use thiserror::Error;

/// Result type alias using [`FixError`] as the error type.
pub type Result<T> = std::result::Result<T, FixError>;

/// Top-level error type for all fixgate operations.
#[derive(Debug, Error)]
pub enum FixError {
    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during message encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Inbound sequence violation.
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    /// Error in message store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the byte stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<std::io::Error> for FixError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::from(err))
    }
}

/// Errors that occur while framing or decoding inbound bytes.
///
/// None of these ever produce a partial message; the offending frame is
/// discarded as a whole.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes for a complete frame yet.
    #[error("truncated frame, need more data")]
    Truncated,

    /// Declared checksum does not match the computed one.
    #[error("bad checksum: calculated {calculated}, declared {declared}")]
    BadChecksum {
        /// Sum of the checksum span modulo 256.
        calculated: u8,
        /// Value carried in tag 10.
        declared: u8,
    },

    /// Declared body length does not match the body span.
    #[error("bad body length: declared {declared}, actual {actual}")]
    BadBodyLength {
        /// Value carried in tag 9.
        declared: usize,
        /// Bytes between the body-length field and the checksum field.
        actual: usize,
    },

    /// BeginString differs from the configured protocol version.
    #[error("begin string mismatch: expected {expected}, found {found}")]
    BeginStringMismatch {
        /// Configured BeginString.
        expected: String,
        /// BeginString on the wire.
        found: String,
    },

    /// Unparsable tag=value structure.
    #[error("malformed message: {reason}")]
    Malformed {
        /// Offending tag when one could be identified.
        tag: Option<u32>,
        /// What was wrong.
        reason: String,
    },

    /// Frame exceeds the configured maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Bytes buffered without finding a frame end.
        size: usize,
        /// Maximum allowed size in bytes.
        max_size: usize,
    },
}

impl DecodeError {
    /// Shorthand for a [`DecodeError::Malformed`] without a tag.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            tag: None,
            reason: reason.into(),
        }
    }

    /// Tag a session Reject should reference for this error.
    #[must_use]
    pub const fn ref_tag(&self) -> Option<u32> {
        match self {
            Self::BadChecksum { .. } => Some(10),
            Self::BadBodyLength { .. } => Some(9),
            Self::BeginStringMismatch { .. } => Some(8),
            Self::Malformed { tag, .. } => *tag,
            Self::Truncated | Self::MessageTooLarge { .. } => None,
        }
    }
}

/// Errors that occur during FIX message encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Missing required field during encoding.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Value cannot be represented on the wire.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },
}

/// Errors in FIX session layer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session is not in the correct state for the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current session state.
        current: String,
    },

    /// Application attempted to send a session-level message type.
    #[error("message type {msg_type} is administrative and cannot be sent by the application")]
    AdminMessageNotAllowed {
        /// The offending MsgType.
        msg_type: String,
    },

    /// Logon was refused.
    #[error("logon rejected: {reason}")]
    LogonRejected {
        /// Reason for rejection.
        reason: String,
    },

    /// SenderCompID/TargetCompID do not match the session.
    #[error("comp id mismatch: expected {expected}, received {received}")]
    IdentityMismatch {
        /// Identity this session expects.
        expected: String,
        /// Identity carried by the message.
        received: String,
    },

    /// Nothing received within the heartbeat grace window.
    #[error("heartbeat timeout after {elapsed_ms} milliseconds")]
    HeartbeatTimeout {
        /// Elapsed time in milliseconds since last message.
        elapsed_ms: u64,
    },

    /// Session configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The session task is gone.
    #[error("session closed")]
    Closed,
}

/// Inbound sequence-number violations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// Sequence number above expectation; a resend is needed.
    #[error("sequence gap detected: expected {expected}, received {received}")]
    Gap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Sequence number below expectation on a possible duplicate.
    #[error("duplicate discarded: expected {expected}, received {received}")]
    Duplicate {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Sequence number below expectation without PossDupFlag.
    #[error("MsgSeqNum too low, expecting {expected} but received {received}")]
    TooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

impl SequenceError {
    /// True for violations that must terminate the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::TooLow { .. })
    }
}

/// Errors in message store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to persist an outbound message.
    #[error("failed to persist message seq={seq_num}: {reason}")]
    PersistFailed {
        /// Sequence number of the message.
        seq_num: u64,
        /// Reason for failure.
        reason: String,
    },

    /// Some sequence numbers in the requested range were never persisted.
    #[error("messages not available for range {begin}..={end}, missing {missing:?}")]
    RangeUnavailable {
        /// First requested sequence number.
        begin: u64,
        /// Last requested sequence number.
        end: u64,
        /// Sequence numbers with no stored record.
        missing: Vec<u64>,
    },

    /// Compare-and-advance of the inbound counter failed.
    #[error("inbound sequence mismatch: expected {expected}, stored {stored}")]
    SequenceMismatch {
        /// Value the caller believed current.
        expected: u64,
        /// Value actually stored.
        stored: u64,
    },

    /// Store is corrupted.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// I/O error in persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors on the duplex byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Connecting did not complete in time.
    #[error("connect to {addr} timed out after {timeout_ms} milliseconds")]
    ConnectTimeout {
        /// Target address.
        addr: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// I/O error from the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
