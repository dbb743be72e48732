/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Built-in session-level dictionary.
//!
//! Covers the standard header and trailer plus the seven administrative
//! messages. Application messages are left undeclared.

use crate::schema::{
    Dictionary, FieldDef, FieldRef, FieldType, MessageCategory, MessageDef, Version,
};
use fixgate_core::tags;

impl Dictionary {
    /// Session dictionary for `version`.
    #[must_use]
    pub fn session(version: Version) -> Self {
        let mut dict = Self::new(version);

        for field in session_fields() {
            dict.add_field(field);
        }

        dict.header = vec![
            FieldRef::required(tags::BEGIN_STRING),
            FieldRef::required(tags::BODY_LENGTH),
            FieldRef::required(tags::MSG_TYPE),
            FieldRef::required(tags::SENDER_COMP_ID),
            FieldRef::required(tags::TARGET_COMP_ID),
            FieldRef::required(tags::MSG_SEQ_NUM),
            FieldRef::required(tags::SENDING_TIME),
            FieldRef::optional(tags::POSS_DUP_FLAG),
            FieldRef::optional(tags::POSS_RESEND),
            FieldRef::optional(tags::ORIG_SENDING_TIME),
        ];
        dict.trailer = vec![FieldRef::required(tags::CHECKSUM)];

        let admin = |msg_type: &str, name: &str, fields: Vec<FieldRef>| {
            MessageDef::new(msg_type, name, MessageCategory::Admin, fields)
        };
        for def in [
            admin("0", "Heartbeat", vec![FieldRef::optional(tags::TEST_REQ_ID)]),
            admin("1", "TestRequest", vec![FieldRef::required(tags::TEST_REQ_ID)]),
            admin(
                "2",
                "ResendRequest",
                vec![
                    FieldRef::required(tags::BEGIN_SEQ_NO),
                    FieldRef::required(tags::END_SEQ_NO),
                ],
            ),
            admin(
                "3",
                "Reject",
                vec![
                    FieldRef::required(tags::REF_SEQ_NUM),
                    FieldRef::optional(tags::REF_TAG_ID),
                    FieldRef::optional(tags::REF_MSG_TYPE),
                    FieldRef::optional(tags::SESSION_REJECT_REASON),
                    FieldRef::optional(tags::TEXT),
                ],
            ),
            admin(
                "4",
                "SequenceReset",
                vec![
                    FieldRef::optional(tags::GAP_FILL_FLAG),
                    FieldRef::required(tags::NEW_SEQ_NO),
                ],
            ),
            admin("5", "Logout", vec![FieldRef::optional(tags::TEXT)]),
            admin(
                "A",
                "Logon",
                vec![
                    FieldRef::required(tags::ENCRYPT_METHOD),
                    FieldRef::required(tags::HEART_BT_INT),
                    FieldRef::optional(tags::RESET_SEQ_NUM_FLAG),
                ],
            ),
        ] {
            dict.add_message(def);
        }

        dict
    }
}

fn session_fields() -> Vec<FieldDef> {
    const YES_NO: [(&str, &str); 2] = [("Y", "YES"), ("N", "NO")];
    vec![
        FieldDef::new(tags::BEGIN_SEQ_NO, "BeginSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::BEGIN_STRING, "BeginString", FieldType::String),
        FieldDef::new(tags::BODY_LENGTH, "BodyLength", FieldType::Length),
        FieldDef::new(tags::CHECKSUM, "CheckSum", FieldType::String),
        FieldDef::new(tags::END_SEQ_NO, "EndSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::MSG_SEQ_NUM, "MsgSeqNum", FieldType::SeqNum),
        FieldDef::new(tags::MSG_TYPE, "MsgType", FieldType::String).with_values([
            ("0", "HEARTBEAT"),
            ("1", "TEST_REQUEST"),
            ("2", "RESEND_REQUEST"),
            ("3", "REJECT"),
            ("4", "SEQUENCE_RESET"),
            ("5", "LOGOUT"),
            ("A", "LOGON"),
        ]),
        FieldDef::new(tags::NEW_SEQ_NO, "NewSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::POSS_DUP_FLAG, "PossDupFlag", FieldType::Boolean)
            .with_values(YES_NO),
        FieldDef::new(tags::REF_SEQ_NUM, "RefSeqNum", FieldType::SeqNum),
        FieldDef::new(tags::SENDER_COMP_ID, "SenderCompID", FieldType::String),
        FieldDef::new(tags::SENDING_TIME, "SendingTime", FieldType::UtcTimestamp),
        FieldDef::new(tags::TARGET_COMP_ID, "TargetCompID", FieldType::String),
        FieldDef::new(tags::TEXT, "Text", FieldType::String),
        FieldDef::new(tags::POSS_RESEND, "PossResend", FieldType::Boolean).with_values(YES_NO),
        FieldDef::new(tags::ENCRYPT_METHOD, "EncryptMethod", FieldType::Int)
            .with_values([("0", "NONE_OTHER")]),
        FieldDef::new(tags::HEART_BT_INT, "HeartBtInt", FieldType::Int),
        FieldDef::new(tags::TEST_REQ_ID, "TestReqID", FieldType::String),
        FieldDef::new(tags::ORIG_SENDING_TIME, "OrigSendingTime", FieldType::UtcTimestamp),
        FieldDef::new(tags::GAP_FILL_FLAG, "GapFillFlag", FieldType::Boolean)
            .with_values([("Y", "GAP_FILL"), ("N", "SEQUENCE_RESET")]),
        FieldDef::new(tags::RESET_SEQ_NUM_FLAG, "ResetSeqNumFlag", FieldType::Boolean)
            .with_values(YES_NO),
        FieldDef::new(tags::REF_TAG_ID, "RefTagID", FieldType::Int),
        FieldDef::new(tags::REF_MSG_TYPE, "RefMsgType", FieldType::String),
        FieldDef::new(tags::SESSION_REJECT_REASON, "SessionRejectReason", FieldType::Int)
            .with_values([
                ("0", "INVALID_TAG_NUMBER"),
                ("1", "REQUIRED_TAG_MISSING"),
                ("2", "TAG_NOT_DEFINED_FOR_THIS_MESSAGE_TYPE"),
                ("4", "TAG_SPECIFIED_WITHOUT_A_VALUE"),
                ("5", "VALUE_IS_INCORRECT"),
                ("6", "INCORRECT_DATA_FORMAT_FOR_VALUE"),
                ("9", "COMPID_PROBLEM"),
                ("10", "SENDINGTIME_ACCURACY_PROBLEM"),
                ("11", "INVALID_MSGTYPE"),
                ("99", "OTHER"),
            ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_core::message::MsgType;

    #[test]
    fn test_session_dictionary_admin_set() {
        let dict = Dictionary::session(Version::Fix44);
        for msg_type in ["0", "1", "2", "3", "4", "5", "A"] {
            let parsed: MsgType = msg_type.parse().unwrap();
            assert!(dict.is_admin(&parsed), "{msg_type}");
        }
        assert!(!dict.is_admin(&"8".parse().unwrap()));
        assert_eq!(dict.get_message("A").unwrap().name, "Logon");
    }

    #[test]
    fn test_session_dictionary_required_fields() {
        let dict = Dictionary::session(Version::Fix42);
        assert_eq!(
            dict.required_fields("2").collect::<Vec<_>>(),
            vec![tags::BEGIN_SEQ_NO, tags::END_SEQ_NO]
        );
        assert_eq!(dict.required_fields("4").collect::<Vec<_>>(), vec![tags::NEW_SEQ_NO]);
        assert!(dict.required_header().any(|t| t == tags::SENDING_TIME));
        assert_eq!(dict.field_name(tags::HEART_BT_INT), Some("HeartBtInt"));
    }
}
