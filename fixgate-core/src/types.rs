/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core value types:
//! - [`SeqNum`]: message sequence number
//! - [`Timestamp`]: UTC instant rendered in FIX format
//! - [`CompId`]: SenderCompID / TargetCompID value
//! - [`SessionId`]: identity triple keying a session and its store

use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest SenderCompID / TargetCompID accepted, in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// Wire layout of SendingTime and OrigSendingTime.
const FIX_TIMESTAMP: &str = "%Y%m%d-%H:%M:%S%.3f";

/// MsgSeqNum (34) value. Numbering starts at 1 for a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Wraps a raw sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The number that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for SeqNum {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u64> for SeqNum {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SeqNum> for u64 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// UTC instant carried by SendingTime (52) and OrigSendingTime (122).
///
/// Written as `YYYYMMDD-HH:MM:SS.sss`; the fractional part is optional when
/// reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Instant `millis` milliseconds after the Unix epoch, if representable.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Parses a FIX UTCTimestamp with or without fractional seconds.
    #[must_use]
    pub fn parse_fix(value: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(value, "%Y%m%d-%H:%M:%S%.f")
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }

    /// Underlying chrono value.
    #[must_use]
    pub const fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Millisecond-precision wire rendering.
    #[must_use]
    pub fn to_wire(self) -> ArrayString<21> {
        let mut buf = ArrayString::new();
        // 21 bytes always fit the layout
        let _ = fmt::write(&mut buf, format_args!("{}", self.0.format(FIX_TIMESTAMP)));
        buf
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// SenderCompID / TargetCompID, stored inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// `None` when `s` is longer than [`COMP_ID_MAX_LEN`].
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// String form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// True for the empty id, which configuration rejects.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one logical session: protocol version plus the comp id pair,
/// seen from the local side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// BeginString (FIX version).
    pub begin_string: String,
    /// Local SenderCompID.
    pub sender_comp_id: CompId,
    /// Counterparty TargetCompID.
    pub target_comp_id: CompId,
}

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub fn new(begin_string: impl Into<String>, sender_comp_id: CompId, target_comp_id: CompId) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id,
            target_comp_id,
        }
    }

    /// File-name friendly rendering, e.g. `FIX.4.4-CLIENT-BROKER`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}-{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_ordering() {
        let seq = SeqNum::new(5);
        assert_eq!(seq.next(), SeqNum::new(6));
        assert!(seq < seq.next());
        assert_eq!(SeqNum::default(), SeqNum::new(1));
        assert_eq!(u64::from(seq), 5);
    }

    #[test]
    fn test_timestamp_wire_format() {
        let ts = Timestamp::from_unix_millis(1_500).unwrap();
        assert_eq!(ts.to_wire().as_str(), "19700101-00:00:01.500");
        assert_eq!(ts.to_string(), "19700101-00:00:01.500");
    }

    #[test]
    fn test_timestamp_parse() {
        let ts = Timestamp::parse_fix("20260127-10:00:00.250").unwrap();
        assert_eq!(ts.to_wire().as_str(), "20260127-10:00:00.250");

        let whole = Timestamp::parse_fix("20260127-10:00:00").unwrap();
        assert!(whole < ts);

        assert!(Timestamp::parse_fix("2026-01-27T10:00:00").is_none());
        assert!(Timestamp::parse_fix("").is_none());
    }

    #[test]
    fn test_comp_id() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert!(!id.is_empty());
        assert!(CompId::new("").unwrap().is_empty());
        assert!(CompId::new(&"A".repeat(COMP_ID_MAX_LEN + 1)).is_none());
    }

    #[test]
    fn test_session_id_rendering() {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("CLIENT").unwrap(),
            CompId::new("BROKER/1").unwrap(),
        );
        assert_eq!(id.to_string(), "FIX.4.4:CLIENT->BROKER/1");
        assert_eq!(id.file_stem(), "FIX.4.4-CLIENT-BROKER_1");
    }
}
