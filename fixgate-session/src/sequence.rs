/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Inbound sequence classification and gap bookkeeping.
//!
//! The counters themselves live in the store; this module only decides what
//! an inbound number means and remembers what arrived ahead of a hole.

use fixgate_core::error::SequenceError;
use fixgate_core::message::FixMessage;
use fixgate_core::types::SeqNum;
use std::collections::BTreeMap;

/// Classifies `received` against the next expected inbound number.
///
/// # Errors
/// - `SequenceError::Gap` when `received` is ahead
/// - `SequenceError::Duplicate` when behind and marked possible duplicate
/// - `SequenceError::TooLow` when behind without the mark
pub fn check(expected: SeqNum, received: SeqNum, possible_duplicate: bool) -> Result<(), SequenceError> {
    let (expected, received) = (expected.value(), received.value());
    if received == expected {
        Ok(())
    } else if received > expected {
        Err(SequenceError::Gap { expected, received })
    } else if possible_duplicate {
        Err(SequenceError::Duplicate { expected, received })
    } else {
        Err(SequenceError::TooLow { expected, received })
    }
}

/// A hole in the inbound stream, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapWindow {
    /// First missing sequence number.
    pub begin: SeqNum,
    /// Last missing sequence number.
    pub end: SeqNum,
}

impl std::fmt::Display for GapWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// Open gap plus the messages that arrived beyond it.
///
/// A queued `None` marks a number already consumed out of order (a Logon or
/// a ResendRequest served on arrival) that only needs skipping.
#[derive(Debug, Default)]
pub struct GapTracker {
    window: Option<GapWindow>,
    queued: BTreeMap<u64, Option<FixMessage>>,
}

impl GapTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an early arrival at `received` while `expected` is missing.
    ///
    /// Returns the hole that still needs requesting, or `None` when
    /// `received` is contiguous with what is already known.
    pub fn on_early(
        &mut self,
        expected: SeqNum,
        received: SeqNum,
        message: Option<FixMessage>,
    ) -> Option<GapWindow> {
        let first_unknown = match self.window {
            Some(window) => self.highest_known().max(window.end.value()) + 1,
            None => expected.value(),
        };
        self.queued.insert(received.value(), message);

        if received.value() <= first_unknown {
            return None;
        }
        let hole = GapWindow {
            begin: SeqNum::new(first_unknown),
            end: SeqNum::new(received.value() - 1),
        };
        self.window = Some(match self.window {
            Some(window) => GapWindow {
                begin: window.begin,
                end: hole.end,
            },
            None => hole,
        });
        Some(hole)
    }

    /// Takes the queued entry for `expected`, dropping anything older.
    pub fn take_next(&mut self, expected: SeqNum) -> Option<Option<FixMessage>> {
        while let Some(entry) = self.queued.first_entry() {
            match (*entry.key()).cmp(&expected.value()) {
                std::cmp::Ordering::Less => {
                    entry.remove();
                }
                std::cmp::Ordering::Equal => return Some(entry.remove()),
                std::cmp::Ordering::Greater => break,
            }
        }
        None
    }

    /// Closes the window once `expected` has moved past it. Returns the
    /// window that was closed.
    pub fn close_through(&mut self, expected: SeqNum) -> Option<GapWindow> {
        match self.window {
            Some(window) if expected > window.end => self.window.take(),
            _ => None,
        }
    }

    /// The open window, if any.
    #[must_use]
    pub const fn window(&self) -> Option<GapWindow> {
        self.window
    }

    /// Number of entries waiting for the hole to close.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Forgets the window and every queued entry.
    pub fn clear(&mut self) {
        self.window = None;
        self.queued.clear();
    }

    fn highest_known(&self) -> u64 {
        self.queued.last_key_value().map_or(0, |(seq, _)| *seq)
    }
}
