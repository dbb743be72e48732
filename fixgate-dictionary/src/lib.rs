/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Dictionary
//!
//! Pre-parsed FIX dictionaries for the FixGate session engine.
//!
//! This crate provides:
//! - **Schema definitions**: Field and message definitions, JSON round trip
//! - **Built-in session dictionary**: Header, trailer and the admin messages
//! - **Runtime validation**: Session-level checks mapped to reject reasons
//! - **Rendering**: Named, one-field-per-line dumps for logs

pub mod builtin;
pub mod describe;
pub mod schema;
pub mod validate;

pub use schema::{
    Dictionary, DictionaryError, FieldDef, FieldRef, FieldType, MessageCategory, MessageDef,
    Version,
};
pub use validate::{ValidationError, ValidationKind};
