/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codec for FIX message framing.
//!
//! The decoder never fails on a bad frame. A frame that cannot be decoded is
//! yielded as [`InboundFrame::Garbled`] with its raw bytes so the session can
//! reference it in a Reject, and the stream carries on with the next frame.

use bytes::{BufMut, Bytes, BytesMut};
use fixgate_core::error::{DecodeError, TransportError};
use fixgate_core::message::FixMessage;
use fixgate_tagvalue::Decoder as FrameDecoder;
use memchr::memmem;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

const FRAME_START: &[u8] = b"8=";

/// One item read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A fully decoded message.
    Message(FixMessage),
    /// A frame that failed to decode.
    Garbled {
        /// Why decoding failed.
        error: DecodeError,
        /// The discarded bytes.
        raw: Bytes,
    },
}

/// Tokio codec for FIX message framing.
///
/// Frames are located with [`FrameDecoder::frame_len`] and decoded with
/// checksum, body length and BeginString verification.
#[derive(Debug, Clone)]
pub struct FixCodec {
    decoder: FrameDecoder,
}

impl FixCodec {
    /// Creates a codec accepting frames for `begin_string`.
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            decoder: FrameDecoder::new(begin_string),
        }
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.decoder = self.decoder.with_max_message_size(size);
        self
    }

    /// Drops bytes preceding the next `8=`. Returns false when none is
    /// buffered yet.
    fn resync(src: &mut BytesMut) -> bool {
        if src.starts_with(FRAME_START) {
            return true;
        }
        match memmem::find(src, FRAME_START) {
            Some(pos) => {
                warn!(skipped = pos, "discarding bytes before frame start");
                let _ = src.split_to(pos);
                true
            }
            None => {
                // a trailing '8' may be the start of the next frame
                let keep = usize::from(src.last() == Some(&b'8'));
                let skipped = src.len() - keep;
                if skipped > 0 {
                    warn!(skipped, "discarding bytes before frame start");
                    let _ = src.split_to(skipped);
                }
                false
            }
        }
    }
}

impl Decoder for FixCodec {
    type Item = InboundFrame;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() || !Self::resync(src) {
            return Ok(None);
        }

        let len = match self.decoder.frame_len(src) {
            Ok(len) => len,
            Err(DecodeError::Truncated) => return Ok(None),
            Err(error @ DecodeError::MessageTooLarge { size, .. }) => {
                let raw = src.split_to(size.min(src.len())).freeze();
                return Ok(Some(InboundFrame::Garbled { error, raw }));
            }
            Err(error) => {
                // resync guarantees the prefix, drop one byte to make progress
                let raw = src.split_to(1).freeze();
                return Ok(Some(InboundFrame::Garbled { error, raw }));
            }
        };

        let raw = src.split_to(len).freeze();
        Ok(Some(match self.decoder.decode(raw.clone()) {
            Ok(message) => InboundFrame::Message(message),
            Err(error) => InboundFrame::Garbled { error, raw },
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = self.decode(src)?;
        if frame.is_none() && !src.is_empty() {
            debug!(remaining = src.len(), "partial frame dropped at end of stream");
            src.clear();
        }
        Ok(frame)
    }
}

impl Encoder<Bytes> for FixCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}
