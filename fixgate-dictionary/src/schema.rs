/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Schema definitions for FIX dictionaries.
//!
//! This module defines the pre-parsed schema the session consumes:
//! - [`FieldDef`]: Field definitions with tag, name, type and enumerated values
//! - [`MessageDef`]: Message definitions with required/optional fields
//! - [`Dictionary`]: Header, trailer, fields and messages for one version
//!
//! Loading a dictionary from a vendor file is left to the caller; the schema
//! round-trips through JSON with [`Dictionary::from_json`] and
//! [`Dictionary::to_json`].

use fixgate_core::message::MsgType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while loading a dictionary.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// The serialized schema could not be parsed.
    #[error("invalid dictionary: {0}")]
    Parse(#[from] serde_json::Error),
}

/// FIX protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// FIX 4.0
    Fix40,
    /// FIX 4.1
    Fix41,
    /// FIX 4.2
    Fix42,
    /// FIX 4.3
    Fix43,
    /// FIX 4.4
    Fix44,
    /// FIXT 1.1 (session layer for FIX 5.0+)
    Fixt11,
}

impl Version {
    /// Returns the BeginString value for this version.
    #[must_use]
    pub const fn begin_string(&self) -> &'static str {
        match self {
            Self::Fix40 => "FIX.4.0",
            Self::Fix41 => "FIX.4.1",
            Self::Fix42 => "FIX.4.2",
            Self::Fix43 => "FIX.4.3",
            Self::Fix44 => "FIX.4.4",
            Self::Fixt11 => "FIXT.1.1",
        }
    }

    /// Reverse of [`Version::begin_string`].
    #[must_use]
    pub fn from_begin_string(value: &str) -> Option<Self> {
        [
            Self::Fix40,
            Self::Fix41,
            Self::Fix42,
            Self::Fix43,
            Self::Fix44,
            Self::Fixt11,
        ]
        .into_iter()
        .find(|v| v.begin_string() == value)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.begin_string())
    }
}

/// Semantic type of a field, as far as the session layer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Integer value.
    Int,
    /// Length field.
    Length,
    /// Sequence number.
    SeqNum,
    /// Single character.
    Char,
    /// Boolean (Y/N).
    Boolean,
    /// Free text.
    String,
    /// UTC timestamp.
    UtcTimestamp,
}

impl FieldType {
    /// Returns true if values must be unsigned integers.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int | Self::Length | Self::SeqNum)
    }
}

impl std::str::FromStr for FieldType {
    type Err = std::convert::Infallible;

    /// Maps a dictionary type name; unknown names fall back to `String`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_uppercase().as_str() {
            "INT" | "NUMINGROUP" | "TAGNUM" => Self::Int,
            "LENGTH" => Self::Length,
            "SEQNUM" => Self::SeqNum,
            "CHAR" => Self::Char,
            "BOOLEAN" => Self::Boolean,
            "UTCTIMESTAMP" => Self::UtcTimestamp,
            _ => Self::String,
        })
    }
}

/// Definition of a FIX field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field tag number.
    pub tag: u32,
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Valid values for enumerated fields, value to description.
    pub values: Option<HashMap<String, String>>,
}

impl FieldDef {
    /// Creates a new field definition.
    #[must_use]
    pub fn new(tag: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            tag,
            name: name.into(),
            field_type,
            values: None,
        }
    }

    /// Adds enumerated values.
    #[must_use]
    pub fn with_values<'a>(mut self, values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.values = Some(
            values
                .into_iter()
                .map(|(v, d)| (v.to_string(), d.to_string()))
                .collect(),
        );
        self
    }

    /// Description of an enumerated value, if any.
    #[must_use]
    pub fn describe_value(&self, value: &str) -> Option<&str> {
        self.values
            .as_ref()
            .and_then(|values| values.get(value))
            .map(String::as_str)
    }
}

/// Reference to a field within a message, header or trailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Field tag number.
    pub tag: u32,
    /// Whether the field is required.
    pub required: bool,
}

impl FieldRef {
    /// Required field.
    #[must_use]
    pub const fn required(tag: u32) -> Self {
        Self {
            tag,
            required: true,
        }
    }

    /// Optional field.
    #[must_use]
    pub const fn optional(tag: u32) -> Self {
        Self {
            tag,
            required: false,
        }
    }
}

/// Message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageCategory {
    /// Administrative message (session level).
    Admin,
    /// Application message.
    App,
}

/// Definition of a FIX message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDef {
    /// Message type value (tag 35).
    pub msg_type: String,
    /// Message name.
    pub name: String,
    /// Message category (admin or app).
    pub category: MessageCategory,
    /// Fields in this message, header excluded.
    pub fields: Vec<FieldRef>,
}

impl MessageDef {
    /// Creates a message definition.
    #[must_use]
    pub fn new(
        msg_type: impl Into<String>,
        name: impl Into<String>,
        category: MessageCategory,
        fields: Vec<FieldRef>,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            name: name.into(),
            category,
            fields,
        }
    }
}

/// Pre-parsed FIX dictionary for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    /// FIX version.
    pub version: Version,
    /// Field definitions indexed by tag.
    pub fields: HashMap<u32, FieldDef>,
    /// Message definitions indexed by msg_type.
    pub messages: HashMap<String, MessageDef>,
    /// Header fields.
    pub header: Vec<FieldRef>,
    /// Trailer fields.
    pub trailer: Vec<FieldRef>,
}

impl Dictionary {
    /// Creates a new empty dictionary for the specified version.
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            fields: HashMap::new(),
            messages: HashMap::new(),
            header: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Parses a dictionary previously written by [`Dictionary::to_json`].
    ///
    /// # Errors
    /// `DictionaryError::Parse` on malformed input.
    pub fn from_json(text: &str) -> Result<Self, DictionaryError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the dictionary as JSON.
    ///
    /// # Errors
    /// `DictionaryError::Parse` if serialization fails.
    pub fn to_json(&self) -> Result<String, DictionaryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Adds a field definition.
    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.insert(field.tag, field);
    }

    /// Adds a message definition.
    pub fn add_message(&mut self, message: MessageDef) {
        self.messages.insert(message.msg_type.clone(), message);
    }

    /// Gets a field definition by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&FieldDef> {
        self.fields.get(&tag)
    }

    /// Gets a message definition by type.
    #[must_use]
    pub fn get_message(&self, msg_type: &str) -> Option<&MessageDef> {
        self.messages.get(msg_type)
    }

    /// Field name, or `None` for tags the dictionary does not know.
    #[must_use]
    pub fn field_name(&self, tag: u32) -> Option<&str> {
        self.get_field(tag).map(|f| f.name.as_str())
    }

    /// Whether `msg_type` belongs to the administrative set.
    ///
    /// The dictionary's category wins; types it does not declare fall back to
    /// the built-in session set.
    #[must_use]
    pub fn is_admin(&self, msg_type: &MsgType) -> bool {
        match self.get_message(msg_type.as_str()) {
            Some(def) => def.category == MessageCategory::Admin,
            None => msg_type.is_admin(),
        }
    }

    /// Tags the header requires, envelope included.
    pub fn required_header(&self) -> impl Iterator<Item = u32> + '_ {
        self.header.iter().filter(|f| f.required).map(|f| f.tag)
    }

    /// Tags `msg_type` requires in its body.
    pub fn required_fields<'a>(&'a self, msg_type: &str) -> impl Iterator<Item = u32> + 'a {
        self.get_message(msg_type)
            .into_iter()
            .flat_map(|def| def.fields.iter())
            .filter(|f| f.required)
            .map(|f| f.tag)
    }
}
