/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message encoder.
//!
//! Serializes a [`FixMessage`] as `8=..|9=..|35=..|<rest>|10=XXX|`. The
//! envelope is always computed here; envelope tags present in the message are
//! ignored.

use crate::checksum::{calculate_checksum, format_checksum};
use bytes::{BufMut, Bytes, BytesMut};
use fixgate_core::error::EncodeError;
use fixgate_core::message::FixMessage;
use fixgate_core::tags;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Reusable encoder bound to one BeginString.
#[derive(Debug, Clone)]
pub struct Encoder {
    /// Scratch buffer for the body (MsgType through the last field).
    body: BytesMut,
    begin_string: String,
}

impl Encoder {
    /// Creates an encoder for `begin_string` (e.g. `FIX.4.4`).
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            body: BytesMut::with_capacity(256),
            begin_string: begin_string.into(),
        }
    }

    /// The BeginString written on every message.
    #[must_use]
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Encodes `message` into a complete frame.
    ///
    /// MsgType is written first regardless of where it sits in `message`;
    /// every other field keeps its relative order.
    ///
    /// # Errors
    /// - `MissingRequiredField` when tag 35 is absent
    /// - `InvalidFieldValue` for a zero tag, an empty value, or a value
    ///   containing SOH
    pub fn encode(&mut self, message: &FixMessage) -> Result<Bytes, EncodeError> {
        self.body.clear();

        let fields = message.fields();
        let msg_type_idx = fields
            .iter()
            .position(|f| f.tag == tags::MSG_TYPE)
            .ok_or(EncodeError::MissingRequiredField {
                tag: tags::MSG_TYPE,
            })?;

        let ordered = std::iter::once(&fields[msg_type_idx]).chain(
            fields
                .iter()
                .enumerate()
                .filter(|(i, f)| *i != msg_type_idx && !tags::ENVELOPE.contains(&f.tag))
                .map(|(_, f)| f),
        );

        for field in ordered {
            validate(field.tag, &field.value)?;
            self.put_raw(field.tag, &field.value);
        }

        Ok(self.finish())
    }

    #[inline]
    fn put_raw(&mut self, tag: u32, value: &[u8]) {
        let mut tag_buf = itoa::Buffer::new();
        self.body.put_slice(tag_buf.format(tag).as_bytes());
        self.body.put_u8(b'=');
        self.body.put_slice(value);
        self.body.put_u8(SOH);
    }

    /// Prepends BeginString/BodyLength and appends CheckSum.
    fn finish(&mut self) -> Bytes {
        let body_len = self.body.len();
        let mut len_buf = itoa::Buffer::new();
        let len_str = len_buf.format(body_len);

        let mut frame =
            BytesMut::with_capacity(self.begin_string.len() + len_str.len() + body_len + 14);
        frame.put_slice(b"8=");
        frame.put_slice(self.begin_string.as_bytes());
        frame.put_u8(SOH);
        frame.put_slice(b"9=");
        frame.put_slice(len_str.as_bytes());
        frame.put_u8(SOH);
        frame.put_slice(&self.body);

        let checksum = format_checksum(calculate_checksum(&frame));
        frame.put_slice(b"10=");
        frame.put_slice(&checksum);
        frame.put_u8(SOH);

        self.body.clear();
        frame.freeze()
    }
}

fn validate(tag: u32, value: &[u8]) -> Result<(), EncodeError> {
    let reason = if tag == 0 {
        "tag must be positive"
    } else if value.is_empty() {
        "value is empty"
    } else if memchr::memchr(SOH, value).is_some() {
        "value contains the field delimiter"
    } else {
        return Ok(());
    };
    Err(EncodeError::InvalidFieldValue {
        tag,
        reason: reason.to_string(),
    })
}

/// One-shot encode under `begin_string`.
///
/// # Errors
/// See [`Encoder::encode`].
pub fn encode(begin_string: &str, message: &FixMessage) -> Result<Bytes, EncodeError> {
    Encoder::new(begin_string).encode(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_core::message::MsgType;

    #[test]
    fn test_encode_known_frame() {
        let msg = FixMessage::new(&MsgType::Heartbeat)
            .with(tags::SENDER_COMP_ID, "A")
            .with(tags::TARGET_COMP_ID, "B")
            .with_uint(tags::MSG_SEQ_NUM, 2);

        let frame = encode("FIX.4.4", &msg).unwrap();
        let body = "35=0\x0149=A\x0156=B\x0134=2\x01";
        let head = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body);
        let checksum = calculate_checksum(head.as_bytes());
        let expected = format!("{head}10={:03}\x01", checksum);

        assert_eq!(frame.as_ref(), expected.as_bytes());
        assert_eq!(msg.checksum("FIX.4.4"), checksum);
        assert_eq!(msg.body_length(), body.len());
    }

    #[test]
    fn test_msg_type_moved_first() {
        let msg = FixMessage::from_fields([
            fixgate_core::Field::new(tags::SENDER_COMP_ID, "A"),
            fixgate_core::Field::new(tags::MSG_TYPE, "D"),
            fixgate_core::Field::new(11, "X"),
        ]);
        let frame = encode("FIX.4.2", &msg).unwrap();
        let text = String::from_utf8_lossy(&frame);
        assert!(text.starts_with("8=FIX.4.2\x019=15\x0135=D\x0149=A\x0111=X\x01"));
    }

    #[test]
    fn test_envelope_tags_recomputed() {
        let msg = FixMessage::new(&MsgType::Heartbeat)
            .with(tags::BODY_LENGTH, "999")
            .with(tags::CHECKSUM, "000");
        let frame = encode("FIX.4.4", &msg).unwrap();
        let text = String::from_utf8_lossy(&frame);
        assert!(text.starts_with("8=FIX.4.4\x019=5\x0135=0\x0110="));
    }

    #[test]
    fn test_missing_msg_type() {
        let msg = FixMessage::default().with(tags::TEXT, "hi");
        assert_eq!(
            encode("FIX.4.4", &msg),
            Err(EncodeError::MissingRequiredField { tag: 35 })
        );
    }

    #[test]
    fn test_rejects_soh_and_empty_values() {
        let with_soh = FixMessage::new(&MsgType::Logout).with(tags::TEXT, "a\x01b");
        assert!(matches!(
            encode("FIX.4.4", &with_soh),
            Err(EncodeError::InvalidFieldValue { tag: 58, .. })
        ));

        let empty = FixMessage::new(&MsgType::Logout).with(tags::TEXT, "");
        assert!(matches!(
            encode("FIX.4.4", &empty),
            Err(EncodeError::InvalidFieldValue { tag: 58, .. })
        ));
    }

    #[test]
    fn test_encoder_reusable() {
        let mut encoder = Encoder::new("FIX.4.4");
        let first = encoder.encode(&FixMessage::new(&MsgType::Heartbeat)).unwrap();
        let second = encoder.encode(&FixMessage::new(&MsgType::Heartbeat)).unwrap();
        assert_eq!(first, second);
        assert_eq!(encoder.begin_string(), "FIX.4.4");
    }
}
