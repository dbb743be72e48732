/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! Suitable for tests and sessions that reset on every logon. Nothing
//! survives the process.

use crate::traits::{MessageStore, missing_in_range};
use async_trait::async_trait;
use bytes::Bytes;
use fixgate_core::error::StoreError;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug)]
struct State {
    next_outbound: u64,
    next_inbound: u64,
    messages: BTreeMap<u64, Bytes>,
}

/// In-memory message store.
///
/// Counters and log share one lock so every operation is atomic.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store with both counters at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_seqs(1, 1)
    }

    /// Creates an empty store with the given next outbound and inbound numbers.
    #[must_use]
    pub fn with_initial_seqs(next_outbound: u64, next_inbound: u64) -> Self {
        Self {
            state: Mutex::new(State {
                next_outbound,
                next_inbound,
                messages: BTreeMap::new(),
            }),
        }
    }

    /// Number of stored messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Checks if a message with the given sequence number is stored.
    #[must_use]
    pub fn contains(&self, seq_num: u64) -> bool {
        self.state.lock().messages.contains_key(&seq_num)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn persist_outbound(&self, seq_num: u64, message: Bytes) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.messages.contains_key(&seq_num) {
            return Err(StoreError::PersistFailed {
                seq_num,
                reason: "sequence number already stored".to_string(),
            });
        }
        state.messages.insert(seq_num, message);
        Ok(())
    }

    async fn next_outbound_seq(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let seq = state.next_outbound;
        state.next_outbound += 1;
        Ok(seq)
    }

    async fn outbound_seq(&self) -> u64 {
        self.state.lock().next_outbound
    }

    async fn inbound_seq(&self) -> u64 {
        self.state.lock().next_inbound
    }

    async fn advance_inbound_seq(&self, expected: u64) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        if state.next_inbound != expected {
            return Err(StoreError::SequenceMismatch {
                expected,
                stored: state.next_inbound,
            });
        }
        state.next_inbound += 1;
        Ok(state.next_inbound)
    }

    async fn set_inbound_seq(&self, seq: u64) -> Result<(), StoreError> {
        self.state.lock().next_inbound = seq;
        Ok(())
    }

    async fn fetch_range(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let state = self.state.lock();
        let missing = missing_in_range(begin, end, |seq| state.messages.contains_key(&seq));
        if !missing.is_empty() {
            return Err(StoreError::RangeUnavailable {
                begin,
                end,
                missing,
            });
        }
        Ok(state
            .messages
            .range(begin..=end)
            .map(|(seq, bytes)| (*seq, bytes.clone()))
            .collect())
    }

    async fn get(&self, seq_num: u64) -> Result<Option<Bytes>, StoreError> {
        Ok(self.state.lock().messages.get(&seq_num).cloned())
    }

    async fn reset(
        &self,
        next_outbound: u64,
        next_inbound: u64,
        clear_history: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.next_outbound = next_outbound;
        state.next_inbound = next_inbound;
        if clear_history {
            state.messages.clear();
        }
        Ok(())
    }
}
