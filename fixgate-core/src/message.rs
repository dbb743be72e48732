/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message representation.
//!
//! This module provides:
//! - [`MsgType`]: the session-level message types plus an application catch-all
//! - [`FixMessage`]: an ordered list of body fields (MsgType onward)
//!
//! The envelope (BeginString, BodyLength, CheckSum) is never stored in a
//! [`FixMessage`]. The codec writes it on encode and verifies and strips it
//! on decode; [`FixMessage::body_length`] and [`FixMessage::checksum`]
//! derive the values it would carry.

use crate::error::DecodeError;
use crate::field::Field;
use crate::tags;
use crate::types::SeqNum;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// FIX message type (tag 35).
///
/// The seven administrative types are handled by the session itself. Every
/// other value is carried verbatim in [`MsgType::App`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    /// Heartbeat (0).
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Logon (A).
    Logon,
    /// Any application message type.
    App(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            other => Self::App(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire value of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::App(s) => s.as_str(),
        }
    }

    /// Returns true for the built-in administrative types.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        !matches!(self, Self::App(_))
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered body fields of a FIX message.
///
/// Insertion order is preserved and duplicate tags are kept as-is, so
/// repeating groups pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixMessage {
    fields: SmallVec<[Field; 16]>,
}

impl FixMessage {
    /// Starts a message with the given MsgType as its first field.
    #[must_use]
    pub fn new(msg_type: &MsgType) -> Self {
        let mut msg = Self::default();
        msg.push(tags::MSG_TYPE, Bytes::copy_from_slice(msg_type.as_str().as_bytes()));
        msg
    }

    /// Builds a message from already ordered fields.
    #[must_use]
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Appends a field.
    pub fn push(&mut self, tag: u32, value: impl Into<Bytes>) -> &mut Self {
        self.fields.push(Field::new(tag, value));
        self
    }

    /// Appends an unsigned integer field.
    pub fn push_uint(&mut self, tag: u32, value: u64) -> &mut Self {
        let mut buf = itoa::Buffer::new();
        let text = Bytes::copy_from_slice(buf.format(value).as_bytes());
        self.push(tag, text)
    }

    /// Builder form of [`FixMessage::push`].
    #[must_use]
    pub fn with(mut self, tag: u32, value: impl Into<Bytes>) -> Self {
        self.push(tag, value);
        self
    }

    /// Builder form of [`FixMessage::push_uint`].
    #[must_use]
    pub fn with_uint(mut self, tag: u32, value: u64) -> Self {
        self.push_uint(tag, value);
        self
    }

    /// Replaces the first occurrence of `tag`, or appends it.
    pub fn set(&mut self, tag: u32, value: impl Into<Bytes>) -> &mut Self {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.tag == tag) {
            Some(field) => field.value = value,
            None => self.fields.push(Field::new(tag, value)),
        }
        self
    }

    /// Inserts a field right after the first occurrence of `anchor`.
    ///
    /// Appends when `anchor` is absent.
    pub fn insert_after(&mut self, anchor: u32, tag: u32, value: impl Into<Bytes>) -> &mut Self {
        let field = Field::new(tag, value);
        match self.fields.iter().position(|f| f.tag == anchor) {
            Some(idx) => self.fields.insert(idx + 1, field),
            None => self.fields.push(field),
        }
        self
    }

    /// Removes and returns the first occurrence of `tag`.
    pub fn remove(&mut self, tag: u32) -> Option<Field> {
        let idx = self.fields.iter().position(|f| f.tag == tag)?;
        Some(self.fields.remove(idx))
    }

    /// Returns the first field with `tag`.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Returns the first value of `tag` as a string, if present and UTF-8.
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.get(tag).and_then(|f| f.as_str().ok())
    }

    /// Returns true if `tag` is present.
    #[must_use]
    pub fn contains(&self, tag: u32) -> bool {
        self.get(tag).is_some()
    }

    /// All fields in order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Message type from tag 35.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        self.get_str(tags::MSG_TYPE)
            .and_then(|s| s.parse::<MsgType>().ok())
    }

    /// Sequence number from tag 34.
    ///
    /// # Errors
    /// `Malformed` when tag 34 is absent or not a valid integer.
    pub fn seq_num(&self) -> Result<SeqNum, DecodeError> {
        let field = self.get(tags::MSG_SEQ_NUM).ok_or(DecodeError::Malformed {
            tag: Some(tags::MSG_SEQ_NUM),
            reason: "MsgSeqNum missing".to_string(),
        })?;
        field.as_u64().map(SeqNum::new)
    }

    /// SenderCompID (tag 49).
    #[must_use]
    pub fn sender_comp_id(&self) -> Option<&str> {
        self.get_str(tags::SENDER_COMP_ID)
    }

    /// TargetCompID (tag 56).
    #[must_use]
    pub fn target_comp_id(&self) -> Option<&str> {
        self.get_str(tags::TARGET_COMP_ID)
    }

    /// True when PossDupFlag (43) is `Y`.
    #[must_use]
    pub fn is_possible_duplicate(&self) -> bool {
        self.get(tags::POSS_DUP_FLAG)
            .is_some_and(|f| f.as_bool().unwrap_or(false))
    }

    /// Value tag 9 carries once encoded.
    #[must_use]
    pub fn body_length(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| !tags::ENVELOPE.contains(&f.tag))
            .map(Field::wire_len)
            .sum()
    }

    /// Value tag 10 carries once encoded under `begin_string`.
    #[must_use]
    pub fn checksum(&self, begin_string: &str) -> u8 {
        let mut itoa_buf = itoa::Buffer::new();
        let mut sum: u32 = 0;
        let mut add = |bytes: &[u8]| {
            sum = bytes
                .iter()
                .fold(sum, |acc, &b| acc.wrapping_add(u32::from(b)));
        };
        add(b"8=");
        add(begin_string.as_bytes());
        add(b"\x019=");
        add(itoa_buf.format(self.body_length()).as_bytes());
        add(b"\x01");
        for field in self
            .fields
            .iter()
            .filter(|f| !tags::ENVELOPE.contains(&f.tag))
        {
            add(itoa_buf.format(field.tag).as_bytes());
            add(b"=");
            add(&field.value);
            add(b"\x01");
        }
        (sum % 256) as u8
    }
}

impl fmt::Display for FixMessage {
    /// Pipe-delimited rendering for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}
