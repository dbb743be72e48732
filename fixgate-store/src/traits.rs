/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store trait definition.
//!
//! A store holds the two session counters and the replay log of every
//! outbound message, keyed by sequence number. Sequence numbers here are the
//! raw `u64` values; the session wraps them in `SeqNum`.

use async_trait::async_trait;
use bytes::Bytes;
use fixgate_core::error::StoreError;

/// Durable session state: counters plus outbound replay log.
///
/// Every method takes `&self`; implementations serialize internally so that
/// concurrent callers never allocate the same outbound number twice.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends an encoded outbound message.
    ///
    /// Must be durable before returning; the caller writes to the transport
    /// only afterwards.
    ///
    /// # Errors
    /// `StoreError::PersistFailed` if `seq_num` is already stored or the
    /// write fails.
    async fn persist_outbound(&self, seq_num: u64, message: Bytes) -> Result<(), StoreError>;

    /// Allocates the next outbound sequence number.
    ///
    /// Returns the current value and durably increments the counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn next_outbound_seq(&self) -> Result<u64, StoreError>;

    /// Next outbound sequence number, without allocating it.
    async fn outbound_seq(&self) -> u64;

    /// Next expected inbound sequence number.
    async fn inbound_seq(&self) -> u64;

    /// Advances the inbound counter from `expected` to `expected + 1`.
    ///
    /// # Errors
    /// `StoreError::SequenceMismatch` when the stored counter is not
    /// `expected`.
    async fn advance_inbound_seq(&self, expected: u64) -> Result<u64, StoreError>;

    /// Sets the next expected inbound sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn set_inbound_seq(&self, seq: u64) -> Result<(), StoreError>;

    /// Stored messages for `begin..=end`, in sequence order.
    ///
    /// # Errors
    /// `StoreError::RangeUnavailable` naming every sequence number in the
    /// range that has no record.
    async fn fetch_range(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError>;

    /// A single stored message.
    ///
    /// # Errors
    /// Returns `StoreError` if the log cannot be read.
    async fn get(&self, seq_num: u64) -> Result<Option<Bytes>, StoreError>;

    /// Sets both counters, clearing the replay log when `clear_history`.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset cannot be persisted.
    async fn reset(
        &self,
        next_outbound: u64,
        next_inbound: u64,
        clear_history: bool,
    ) -> Result<(), StoreError>;
}

/// Sequence numbers in `begin..=end` for which `has` is false.
pub(crate) fn missing_in_range(begin: u64, end: u64, has: impl Fn(u64) -> bool) -> Vec<u64> {
    (begin..=end).filter(|seq| !has(*seq)).collect()
}
