/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Typed administrative messages.
//!
//! The seven session-level message types form a closed set; the session
//! parses them into [`AdminMessage`] and matches exhaustively.

use fixgate_core::message::{FixMessage, MsgType};
use fixgate_core::tags;
use fixgate_core::types::SeqNum;
use fixgate_dictionary::{ValidationError, ValidationKind};

/// SessionRejectReason (373) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRejectReason {
    /// 0
    InvalidTagNumber,
    /// 1
    RequiredTagMissing,
    /// 2
    TagNotDefinedForMessageType,
    /// 4
    TagSpecifiedWithoutValue,
    /// 5
    ValueIncorrect,
    /// 6
    IncorrectDataFormat,
    /// 9
    CompIdProblem,
    /// 10
    SendingTimeAccuracyProblem,
    /// 11
    InvalidMsgType,
    /// 99
    Other,
}

impl SessionRejectReason {
    /// Wire code.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::InvalidTagNumber => 0,
            Self::RequiredTagMissing => 1,
            Self::TagNotDefinedForMessageType => 2,
            Self::TagSpecifiedWithoutValue => 4,
            Self::ValueIncorrect => 5,
            Self::IncorrectDataFormat => 6,
            Self::CompIdProblem => 9,
            Self::SendingTimeAccuracyProblem => 10,
            Self::InvalidMsgType => 11,
            Self::Other => 99,
        }
    }

    /// Reverse of [`SessionRejectReason::code`].
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::InvalidTagNumber,
            1 => Self::RequiredTagMissing,
            2 => Self::TagNotDefinedForMessageType,
            4 => Self::TagSpecifiedWithoutValue,
            5 => Self::ValueIncorrect,
            6 => Self::IncorrectDataFormat,
            9 => Self::CompIdProblem,
            10 => Self::SendingTimeAccuracyProblem,
            11 => Self::InvalidMsgType,
            99 => Self::Other,
            _ => return None,
        })
    }
}

impl From<ValidationKind> for SessionRejectReason {
    fn from(kind: ValidationKind) -> Self {
        match kind {
            ValidationKind::RequiredTagMissing => Self::RequiredTagMissing,
            ValidationKind::ValueIncorrect => Self::ValueIncorrect,
            ValidationKind::IncorrectDataFormat => Self::IncorrectDataFormat,
        }
    }
}

/// A parsed administrative message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    /// MsgType 0.
    Heartbeat {
        /// Echoed TestReqID.
        test_req_id: Option<String>,
    },
    /// MsgType 1.
    TestRequest {
        /// Identifier to echo.
        test_req_id: String,
    },
    /// MsgType 2. `end` of 0 means through the last message sent.
    ResendRequest {
        /// BeginSeqNo (7).
        begin: SeqNum,
        /// EndSeqNo (16).
        end: SeqNum,
    },
    /// MsgType 3.
    Reject {
        /// RefSeqNum (45).
        ref_seq_num: SeqNum,
        /// RefTagID (371).
        ref_tag_id: Option<u32>,
        /// RefMsgType (372).
        ref_msg_type: Option<String>,
        /// SessionRejectReason (373).
        reason: Option<SessionRejectReason>,
        /// Text (58).
        text: Option<String>,
    },
    /// MsgType 4.
    SequenceReset {
        /// NewSeqNo (36).
        new_seq_no: SeqNum,
        /// GapFillFlag (123).
        gap_fill: bool,
    },
    /// MsgType 5.
    Logout {
        /// Text (58).
        text: Option<String>,
    },
    /// MsgType A.
    Logon {
        /// HeartBtInt (108), seconds.
        heart_bt_int: u64,
        /// ResetSeqNumFlag (141).
        reset_seq_num: bool,
    },
}

impl AdminMessage {
    /// Parses `message` if it is administrative.
    ///
    /// Returns `Ok(None)` for application messages.
    ///
    /// # Errors
    /// A [`ValidationError`] naming the missing or unparsable field.
    pub fn parse(message: &FixMessage) -> Result<Option<Self>, ValidationError> {
        let msg_type = message
            .msg_type()
            .ok_or_else(|| missing(tags::MSG_TYPE))?;

        let parsed = match msg_type {
            MsgType::Heartbeat => Self::Heartbeat {
                test_req_id: optional_str(message, tags::TEST_REQ_ID)?,
            },
            MsgType::TestRequest => Self::TestRequest {
                test_req_id: optional_str(message, tags::TEST_REQ_ID)?
                    .ok_or_else(|| missing(tags::TEST_REQ_ID))?,
            },
            MsgType::ResendRequest => Self::ResendRequest {
                begin: required_seq(message, tags::BEGIN_SEQ_NO)?,
                end: required_seq(message, tags::END_SEQ_NO)?,
            },
            MsgType::Reject => Self::Reject {
                ref_seq_num: required_seq(message, tags::REF_SEQ_NUM)?,
                ref_tag_id: optional_uint(message, tags::REF_TAG_ID)?
                    .map(|tag| u32::try_from(tag).map_err(|_| bad_format(tags::REF_TAG_ID)))
                    .transpose()?,
                ref_msg_type: optional_str(message, tags::REF_MSG_TYPE)?,
                reason: optional_uint(message, tags::SESSION_REJECT_REASON)?
                    .and_then(SessionRejectReason::from_code),
                text: optional_str(message, tags::TEXT)?,
            },
            MsgType::SequenceReset => Self::SequenceReset {
                new_seq_no: required_seq(message, tags::NEW_SEQ_NO)?,
                gap_fill: optional_bool(message, tags::GAP_FILL_FLAG)?.unwrap_or(false),
            },
            MsgType::Logout => Self::Logout {
                text: optional_str(message, tags::TEXT)?,
            },
            MsgType::Logon => Self::Logon {
                heart_bt_int: optional_uint(message, tags::HEART_BT_INT)?
                    .ok_or_else(|| missing(tags::HEART_BT_INT))?,
                reset_seq_num: optional_bool(message, tags::RESET_SEQ_NUM_FLAG)?.unwrap_or(false),
            },
            MsgType::App(_) => return Ok(None),
        };
        Ok(Some(parsed))
    }

    /// MsgType of this message.
    #[must_use]
    pub const fn msg_type(&self) -> MsgType {
        match self {
            Self::Heartbeat { .. } => MsgType::Heartbeat,
            Self::TestRequest { .. } => MsgType::TestRequest,
            Self::ResendRequest { .. } => MsgType::ResendRequest,
            Self::Reject { .. } => MsgType::Reject,
            Self::SequenceReset { .. } => MsgType::SequenceReset,
            Self::Logout { .. } => MsgType::Logout,
            Self::Logon { .. } => MsgType::Logon,
        }
    }

    /// Body fields, MsgType first. The session adds the header.
    #[must_use]
    pub fn to_message(&self) -> FixMessage {
        let mut msg = FixMessage::new(&self.msg_type());
        match self {
            Self::Heartbeat { test_req_id } => {
                if let Some(id) = test_req_id {
                    msg.push(tags::TEST_REQ_ID, id.clone());
                }
            }
            Self::TestRequest { test_req_id } => {
                msg.push(tags::TEST_REQ_ID, test_req_id.clone());
            }
            Self::ResendRequest { begin, end } => {
                msg.push_uint(tags::BEGIN_SEQ_NO, begin.value())
                    .push_uint(tags::END_SEQ_NO, end.value());
            }
            Self::Reject {
                ref_seq_num,
                ref_tag_id,
                ref_msg_type,
                reason,
                text,
            } => {
                msg.push_uint(tags::REF_SEQ_NUM, ref_seq_num.value());
                if let Some(tag) = ref_tag_id {
                    msg.push_uint(tags::REF_TAG_ID, u64::from(*tag));
                }
                if let Some(msg_type) = ref_msg_type {
                    msg.push(tags::REF_MSG_TYPE, msg_type.clone());
                }
                if let Some(reason) = reason {
                    msg.push_uint(tags::SESSION_REJECT_REASON, u64::from(reason.code()));
                }
                if let Some(text) = text {
                    msg.push(tags::TEXT, text.clone());
                }
            }
            Self::SequenceReset {
                new_seq_no,
                gap_fill,
            } => {
                if *gap_fill {
                    msg.push(tags::GAP_FILL_FLAG, "Y");
                }
                msg.push_uint(tags::NEW_SEQ_NO, new_seq_no.value());
            }
            Self::Logout { text } => {
                if let Some(text) = text {
                    msg.push(tags::TEXT, text.clone());
                }
            }
            Self::Logon {
                heart_bt_int,
                reset_seq_num,
            } => {
                msg.push(tags::ENCRYPT_METHOD, "0")
                    .push_uint(tags::HEART_BT_INT, *heart_bt_int);
                if *reset_seq_num {
                    msg.push(tags::RESET_SEQ_NUM_FLAG, "Y");
                }
            }
        }
        msg
    }
}

const fn missing(tag: u32) -> ValidationError {
    ValidationError {
        tag,
        kind: ValidationKind::RequiredTagMissing,
    }
}

const fn bad_format(tag: u32) -> ValidationError {
    ValidationError {
        tag,
        kind: ValidationKind::IncorrectDataFormat,
    }
}

fn optional_str(message: &FixMessage, tag: u32) -> Result<Option<String>, ValidationError> {
    message
        .get(tag)
        .map(|f| f.as_str().map(str::to_string).map_err(|_| bad_format(tag)))
        .transpose()
}

fn optional_uint(message: &FixMessage, tag: u32) -> Result<Option<u64>, ValidationError> {
    message
        .get(tag)
        .map(|f| f.as_u64().map_err(|_| bad_format(tag)))
        .transpose()
}

fn optional_bool(message: &FixMessage, tag: u32) -> Result<Option<bool>, ValidationError> {
    message
        .get(tag)
        .map(|f| {
            f.as_bool().map_err(|_| ValidationError {
                tag,
                kind: ValidationKind::ValueIncorrect,
            })
        })
        .transpose()
}

fn required_seq(message: &FixMessage, tag: u32) -> Result<SeqNum, ValidationError> {
    optional_uint(message, tag)?
        .map(SeqNum::new)
        .ok_or_else(|| missing(tag))
}
