/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-level validation against a [`Dictionary`].
//!
//! Checks the standard header and, for message types the dictionary
//! declares, that required fields are present. Integer and timestamp
//! values must parse and enumerated values must be known. Business rules
//! are out of reach here.

use crate::schema::{Dictionary, FieldType};
use fixgate_core::message::FixMessage;
use fixgate_core::tags;
use std::fmt;
use thiserror::Error;

/// Why a message failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A required tag is absent.
    RequiredTagMissing,
    /// Value outside the enumerated set.
    ValueIncorrect,
    /// Value does not parse as the declared type.
    IncorrectDataFormat,
}

impl ValidationKind {
    /// SessionRejectReason (373) code for this failure.
    #[must_use]
    pub const fn session_reject_reason(&self) -> u32 {
        match self {
            Self::RequiredTagMissing => 1,
            Self::ValueIncorrect => 5,
            Self::IncorrectDataFormat => 6,
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RequiredTagMissing => "required tag missing",
            Self::ValueIncorrect => "value is incorrect",
            Self::IncorrectDataFormat => "incorrect data format for value",
        })
    }
}

/// A validation failure naming the offending tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (tag {tag})")]
pub struct ValidationError {
    /// Offending tag.
    pub tag: u32,
    /// Failure kind.
    pub kind: ValidationKind,
}

impl Dictionary {
    /// Validates `message` at session level.
    ///
    /// Envelope tags are skipped since the codec has already verified them.
    ///
    /// # Errors
    /// The first [`ValidationError`] found, header before body.
    pub fn validate(&self, message: &FixMessage) -> Result<(), ValidationError> {
        let required = self
            .required_header()
            .filter(|t| !tags::ENVELOPE.contains(t))
            .chain(
                message
                    .get_str(tags::MSG_TYPE)
                    .map(|mt| self.required_fields(mt))
                    .into_iter()
                    .flatten(),
            );
        for tag in required {
            if !message.contains(tag) {
                return Err(ValidationError {
                    tag,
                    kind: ValidationKind::RequiredTagMissing,
                });
            }
        }

        for field in message.fields() {
            let Some(def) = self.get_field(field.tag) else {
                continue;
            };
            let well_formed = match def.field_type {
                t if t.is_integer() => field.as_u64().is_ok(),
                FieldType::UtcTimestamp => field.as_timestamp().is_ok(),
                _ => true,
            };
            if !well_formed {
                return Err(ValidationError {
                    tag: field.tag,
                    kind: ValidationKind::IncorrectDataFormat,
                });
            }
            // MsgType lists only the session values; application types pass
            if field.tag == tags::MSG_TYPE {
                continue;
            }
            let known = match (&def.values, field.as_str()) {
                (Some(values), Ok(value)) => values.contains_key(value),
                (Some(_), Err(_)) => false,
                (None, _) => true,
            };
            if !known {
                return Err(ValidationError {
                    tag: field.tag,
                    kind: ValidationKind::ValueIncorrect,
                });
            }
            if def.field_type == FieldType::Boolean && field.as_bool().is_err() {
                return Err(ValidationError {
                    tag: field.tag,
                    kind: ValidationKind::ValueIncorrect,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Version;
    use fixgate_core::message::MsgType;

    fn header(msg_type: &MsgType) -> FixMessage {
        FixMessage::new(msg_type)
            .with(tags::SENDER_COMP_ID, "A")
            .with(tags::TARGET_COMP_ID, "B")
            .with_uint(tags::MSG_SEQ_NUM, 4)
            .with(tags::SENDING_TIME, "20260127-10:00:00.000")
    }

    #[test]
    fn test_valid_logon() {
        let dict = Dictionary::session(Version::Fix44);
        let logon = header(&MsgType::Logon)
            .with(tags::ENCRYPT_METHOD, "0")
            .with_uint(tags::HEART_BT_INT, 30);
        assert_eq!(dict.validate(&logon), Ok(()));
    }

    #[test]
    fn test_missing_header_field() {
        let dict = Dictionary::session(Version::Fix44);
        let mut msg = header(&MsgType::Heartbeat);
        msg.remove(tags::SENDING_TIME);
        assert_eq!(
            dict.validate(&msg),
            Err(ValidationError {
                tag: tags::SENDING_TIME,
                kind: ValidationKind::RequiredTagMissing,
            })
        );
    }

    #[test]
    fn test_missing_admin_field() {
        let dict = Dictionary::session(Version::Fix44);
        let resend = header(&MsgType::ResendRequest).with_uint(tags::BEGIN_SEQ_NO, 1);
        let err = dict.validate(&resend).unwrap_err();
        assert_eq!(err.tag, tags::END_SEQ_NO);
        assert_eq!(err.kind.session_reject_reason(), 1);
    }

    #[test]
    fn test_bad_integer_and_enum() {
        let dict = Dictionary::session(Version::Fix44);
        let bad_int = header(&MsgType::SequenceReset).with(tags::NEW_SEQ_NO, "ten");
        assert_eq!(
            dict.validate(&bad_int).unwrap_err().kind,
            ValidationKind::IncorrectDataFormat
        );

        let bad_flag = header(&MsgType::SequenceReset)
            .with(tags::GAP_FILL_FLAG, "X")
            .with_uint(tags::NEW_SEQ_NO, 10);
        assert_eq!(
            dict.validate(&bad_flag),
            Err(ValidationError {
                tag: tags::GAP_FILL_FLAG,
                kind: ValidationKind::ValueIncorrect,
            })
        );
    }

    #[test]
    fn test_bad_sending_time() {
        let dict = Dictionary::session(Version::Fix44);
        let msg = header(&MsgType::Heartbeat).with(tags::ORIG_SENDING_TIME, "27/01/2026");
        assert_eq!(
            dict.validate(&msg),
            Err(ValidationError {
                tag: tags::ORIG_SENDING_TIME,
                kind: ValidationKind::IncorrectDataFormat,
            })
        );
    }

    #[test]
    fn test_application_messages_only_need_header() {
        let dict = Dictionary::session(Version::Fix44);
        let order = header(&MsgType::App("D".to_string())).with(11, "ORD-1");
        assert_eq!(dict.validate(&order), Ok(()));
        assert_eq!(
            ValidationError {
                tag: 11,
                kind: ValidationKind::ValueIncorrect
            }
            .to_string(),
            "value is incorrect (tag 11)"
        );
    }
}
