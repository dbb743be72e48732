/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! A single tag=value pair.
//!
//! Values stay opaque bytes on the wire; [`Field`] offers typed views that
//! coerce on demand and report failures as [`DecodeError::Malformed`] naming
//! the tag.

use crate::error::DecodeError;
use crate::types::Timestamp;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Owned tag=value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// The field tag number.
    pub tag: u32,
    /// Value bytes, without delimiters.
    pub value: Bytes,
}

impl Field {
    /// Creates a new field.
    ///
    /// # Arguments
    /// * `tag` - The field tag number
    /// * `value` - The value bytes
    #[inline]
    #[must_use]
    pub fn new(tag: u32, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            tag: Some(self.tag),
            reason: reason.into(),
        }
    }

    /// Returns the value as a string slice.
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if the value is not valid UTF-8.
    pub fn as_str(&self) -> Result<&str, DecodeError> {
        std::str::from_utf8(&self.value).map_err(|_| self.invalid("value is not valid utf-8"))
    }

    /// Parses the value as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if parsing fails.
    pub fn parse<T: FromStr>(&self) -> Result<T, DecodeError> {
        let s = self.as_str()?;
        s.parse().map_err(|_| {
            self.invalid(format!(
                "failed to parse '{}' as {}",
                s,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Returns the value as a u64.
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if the value is not a valid integer.
    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        self.parse()
    }

    /// Returns the value as a bool (FIX uses 'Y'/'N').
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if the value is not 'Y' or 'N'.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self.value.as_ref() {
            b"Y" => Ok(true),
            b"N" => Ok(false),
            _ => Err(self.invalid("expected 'Y' or 'N'")),
        }
    }

    /// Returns the value as a single character.
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` if the value is not a single ASCII character.
    pub fn as_char(&self) -> Result<char, DecodeError> {
        match self.value.as_ref() {
            [b] if b.is_ascii() => Ok(*b as char),
            _ => Err(self.invalid("expected single ASCII character")),
        }
    }

    /// Returns the value as a UTCTimestamp.
    ///
    /// # Errors
    /// Returns `DecodeError::Malformed` unless the value reads as
    /// `YYYYMMDD-HH:MM:SS[.sss]`.
    pub fn as_timestamp(&self) -> Result<Timestamp, DecodeError> {
        Timestamp::parse_fix(self.as_str()?).ok_or_else(|| self.invalid("expected UTCTimestamp"))
    }

    /// Returns the raw bytes of the value.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Bytes this field occupies on the wire, `tag=value<SOH>` included.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        let mut buf = itoa::Buffer::new();
        buf.format(self.tag).len() + 1 + self.value.len() + 1
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag, String::from_utf8_lossy(&self.value))
    }
}
