/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixGate Tag-Value
//!
//! The wire codec: SOH-delimited `tag=value` frames bounded by BeginString
//! and CheckSum.
//!
//! - **Encoding** computes BodyLength and CheckSum and places MsgType first
//! - **Decoding** verifies CheckSum, BodyLength and BeginString, in that order
//! - **Framing** finds frame boundaries in a stream buffer without decoding
//!
//! Both directions are stateless apart from configuration.

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::calculate_checksum;
pub use decoder::{Decoder, decode, peek_msg_type, peek_seq_num};
pub use encoder::{Encoder, SOH, encode};
