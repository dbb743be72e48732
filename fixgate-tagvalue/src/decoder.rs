/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message decoder.
//!
//! Decoding happens in two steps. [`Decoder::frame_len`] finds where the next
//! frame ends without validating it, so a stream reader can cut exactly one
//! frame out of its buffer. [`Decoder::decode`] then validates that frame in
//! this order: checksum, body length, BeginString, body structure. Checking
//! the checksum first means any corrupted byte inside the checksum span is
//! reported as `BadChecksum`.
//!
//! Field values are sliced out of the input [`Bytes`] without copying.

use crate::checksum::{calculate_checksum, parse_checksum};
use crate::encoder::SOH;
use bytes::Bytes;
use fixgate_core::error::DecodeError;
use fixgate_core::field::Field;
use fixgate_core::message::FixMessage;
use fixgate_core::tags;
use fixgate_core::types::SeqNum;
use memchr::{memchr, memmem};
use smallvec::SmallVec;
use std::ops::Range;

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// Default cap on a single frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// `<SOH>10=`, the start of the trailer.
const TRAILER: &[u8] = b"\x0110=";

/// Bytes in `10=ddd<SOH>`.
const CHECKSUM_FIELD_LEN: usize = 7;

/// Decoder bound to one BeginString.
#[derive(Debug, Clone)]
pub struct Decoder {
    begin_string: String,
    max_message_size: usize,
}

impl Decoder {
    /// Creates a decoder accepting only `begin_string`.
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            begin_string: begin_string.into(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Overrides the maximum frame size.
    #[must_use]
    pub const fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Configured BeginString.
    #[must_use]
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Configured maximum frame size.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Length of the frame at the start of `buf`.
    ///
    /// The end declared by BodyLength is used when it lands on a `10=ddd<SOH>`
    /// trailer. Otherwise the buffer is scanned for the first trailer, so a
    /// frame with a damaged BodyLength is still cut out on its own.
    ///
    /// # Errors
    /// - `Truncated` when the frame end is not buffered yet
    /// - `Malformed` when `buf` does not start with `8=`
    /// - `MessageTooLarge` when no frame end exists within the size cap
    pub fn frame_len(&self, buf: &[u8]) -> Result<usize, DecodeError> {
        let prefix = &b"8="[..buf.len().min(2)];
        if !buf.starts_with(prefix) {
            return Err(DecodeError::Malformed {
                tag: Some(tags::BEGIN_STRING),
                reason: "frame does not start with BeginString".to_string(),
            });
        }

        if let Some(end) = declared_end(buf).filter(|end| *end <= self.max_message_size) {
            match buf.get(..end) {
                None => return Err(DecodeError::Truncated),
                Some(frame) if trailer_start(frame).is_some() => return Ok(end),
                Some(_) => {}
            }
        }

        let end = memchr(SOH, buf)
            .and_then(|first_soh| {
                memmem::find(&buf[first_soh..], TRAILER).map(|p| first_soh + p + 1)
            })
            .and_then(|trailer| {
                let digits = trailer + 3;
                buf.get(digits..)
                    .and_then(|rest| memchr(SOH, rest))
                    .map(|soh| digits + soh + 1)
            });

        match end {
            Some(len) if len > self.max_message_size => Err(DecodeError::MessageTooLarge {
                size: len,
                max_size: self.max_message_size,
            }),
            Some(len) => Ok(len),
            None if buf.len() > self.max_message_size => Err(DecodeError::MessageTooLarge {
                size: buf.len(),
                max_size: self.max_message_size,
            }),
            None => Err(DecodeError::Truncated),
        }
    }

    /// Decodes exactly one complete frame.
    ///
    /// The trailer is read from the end of `frame` and the checksum verified
    /// before anything else is looked at.
    ///
    /// # Errors
    /// `Truncated`, `BadChecksum`, `BadBodyLength`, `BeginStringMismatch`,
    /// `MessageTooLarge` or `Malformed`; never a partial message.
    pub fn decode(&self, frame: impl Into<Bytes>) -> Result<FixMessage, DecodeError> {
        let frame: Bytes = frame.into();
        let len = frame.len();
        if len > self.max_message_size {
            return Err(DecodeError::MessageTooLarge {
                size: len,
                max_size: self.max_message_size,
            });
        }
        let Some(trailer) = trailer_start(&frame) else {
            return Err(match self.frame_len(&frame) {
                Ok(_) => DecodeError::Malformed {
                    tag: Some(tags::CHECKSUM),
                    reason: "frame must end with the CheckSum field".to_string(),
                },
                Err(error) => error,
            });
        };

        let declared_checksum =
            parse_checksum(&frame[trailer + 3..len - 1]).ok_or(DecodeError::Malformed {
                tag: Some(tags::CHECKSUM),
                reason: "CheckSum must be three digits".to_string(),
            })?;
        let calculated = calculate_checksum(&frame[..trailer]);
        if calculated != declared_checksum {
            return Err(DecodeError::BadChecksum {
                calculated,
                declared: declared_checksum,
            });
        }

        if !frame.starts_with(b"8=") {
            return Err(DecodeError::Malformed {
                tag: Some(tags::BEGIN_STRING),
                reason: "frame does not start with BeginString".to_string(),
            });
        }
        let first_soh = memchr(SOH, &frame[..trailer])
            .ok_or_else(|| DecodeError::malformed("BeginString field missing SOH"))?;

        let length_field = split_field(&frame, first_soh + 1)?;
        if length_field.tag != tags::BODY_LENGTH {
            return Err(DecodeError::Malformed {
                tag: Some(tags::BODY_LENGTH),
                reason: "BodyLength must be the second field".to_string(),
            });
        }
        let declared_len = parse_usize(&frame[length_field.value]).ok_or(DecodeError::Malformed {
            tag: Some(tags::BODY_LENGTH),
            reason: "BodyLength is not a number".to_string(),
        })?;
        let body_start = length_field.next;
        let actual_len = trailer.saturating_sub(body_start);
        if declared_len != actual_len {
            return Err(DecodeError::BadBodyLength {
                declared: declared_len,
                actual: actual_len,
            });
        }

        let begin_string = &frame[2..first_soh];
        if begin_string != self.begin_string.as_bytes() {
            return Err(DecodeError::BeginStringMismatch {
                expected: self.begin_string.clone(),
                found: String::from_utf8_lossy(begin_string).into_owned(),
            });
        }

        let mut fields: SmallVec<[Field; 16]> = SmallVec::new();
        let mut offset = body_start;
        while offset < trailer {
            let raw = split_field(&frame[..trailer], offset)?;
            if raw.tag == tags::BEGIN_STRING || raw.tag == tags::BODY_LENGTH {
                return Err(DecodeError::Malformed {
                    tag: Some(raw.tag),
                    reason: "envelope field repeated inside body".to_string(),
                });
            }
            fields.push(Field {
                tag: raw.tag,
                value: frame.slice(raw.value),
            });
            offset = raw.next;
        }

        if fields.first().map(|f| f.tag) != Some(tags::MSG_TYPE) {
            return Err(DecodeError::Malformed {
                tag: Some(tags::MSG_TYPE),
                reason: "MsgType must be the first body field".to_string(),
            });
        }
        Ok(FixMessage::from_fields(fields))
    }
}

/// Offset of `10=` when `frame` ends with a complete `10=ddd<SOH>` field.
fn trailer_start(frame: &[u8]) -> Option<usize> {
    let start = frame.len().checked_sub(CHECKSUM_FIELD_LEN)?;
    (frame[start..].starts_with(b"10=") && frame.last() == Some(&SOH)).then_some(start)
}

/// Frame end implied by BodyLength, once `8=...<SOH>9=n<SOH>` is buffered.
fn declared_end(buf: &[u8]) -> Option<usize> {
    let length_start = memchr(SOH, buf)? + 1;
    let value = buf.get(length_start..)?.strip_prefix(b"9=")?;
    let soh = memchr(SOH, value)?;
    let body_len = parse_usize(&value[..soh])?;
    Some(length_start + 2 + soh + 1 + body_len + CHECKSUM_FIELD_LEN)
}

/// Absolute positions of one `tag=value<SOH>` field.
struct RawField {
    tag: u32,
    value: Range<usize>,
    /// Offset just past the SOH.
    next: usize,
}

fn split_field(buf: &[u8], offset: usize) -> Result<RawField, DecodeError> {
    let rest = buf
        .get(offset..)
        .ok_or_else(|| DecodeError::malformed("field starts past end of frame"))?;
    let soh = memchr(SOH, rest).ok_or_else(|| DecodeError::malformed("field missing SOH"))?;
    let eq = memchr(EQUALS, &rest[..soh])
        .ok_or_else(|| DecodeError::malformed("field missing '=' separator"))?;
    let tag = parse_tag(&rest[..eq])?;
    if eq + 1 == soh {
        return Err(DecodeError::Malformed {
            tag: Some(tag),
            reason: "empty value".to_string(),
        });
    }
    Ok(RawField {
        tag,
        value: offset + eq + 1..offset + soh,
        next: offset + soh + 1,
    })
}

/// Parses a tag number: ASCII digits, no sign, greater than zero.
#[inline]
fn parse_tag(bytes: &[u8]) -> Result<u32, DecodeError> {
    let invalid = || {
        DecodeError::malformed(format!(
            "invalid tag '{}'",
            String::from_utf8_lossy(bytes)
        ))
    };
    if bytes.is_empty() || bytes.len() > 9 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let tag = bytes
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0'));
    if tag == 0 { Err(invalid()) } else { Ok(tag) }
}

fn parse_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.len() > 9 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        bytes
            .iter()
            .fold(0usize, |acc, &b| acc * 10 + usize::from(b - b'0')),
    )
}

/// Best-effort MsgSeqNum from raw bytes that failed to decode.
///
/// Used to reference a garbled frame in a Reject.
#[must_use]
pub fn peek_seq_num(raw: &[u8]) -> Option<SeqNum> {
    peek_value(raw, b"\x0134=").and_then(parse_usize).map(|n| SeqNum::new(n as u64))
}

/// Best-effort MsgType from raw bytes that failed to decode.
#[must_use]
pub fn peek_msg_type(raw: &[u8]) -> Option<&str> {
    peek_value(raw, b"\x0135=").and_then(|v| std::str::from_utf8(v).ok())
}

fn peek_value<'a>(raw: &'a [u8], needle: &[u8]) -> Option<&'a [u8]> {
    let start = memmem::find(raw, needle)? + needle.len();
    let len = memchr(SOH, &raw[start..])?;
    Some(&raw[start..start + len])
}

/// One-shot decode against `begin_string`.
///
/// # Errors
/// See [`Decoder::decode`].
pub fn decode(begin_string: &str, frame: impl Into<Bytes>) -> Result<FixMessage, DecodeError> {
    Decoder::new(begin_string).decode(frame)
}
