/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Human-readable rendering of messages for logs and tooling.

use crate::schema::Dictionary;
use fixgate_core::message::FixMessage;
use std::fmt::Write;

impl Dictionary {
    /// Renders one field per line as `Name(tag)=value`, followed by the
    /// enumerated value's description when the dictionary has one.
    ///
    /// Tags the dictionary does not know render as `(tag)=value`.
    #[must_use]
    pub fn describe(&self, message: &FixMessage) -> String {
        let mut out = String::new();
        for field in message.fields() {
            let value = String::from_utf8_lossy(field.as_bytes());
            let def = self.get_field(field.tag);
            let name = def.map_or("", |d| d.name.as_str());
            let _ = write!(out, "{name}({})={value}", field.tag);
            if let Some(desc) = def.and_then(|d| d.describe_value(&value)) {
                let _ = write!(out, " [{desc}]");
            }
            out.push('\n');
        }
        out
    }
}
