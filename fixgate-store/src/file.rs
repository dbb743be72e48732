/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Durable file-backed message store.
//!
//! Two files per session, named after [`SessionId::file_stem`]:
//! - `<stem>.seqnums`: JSON `{"outbound": n, "inbound": m}`, replaced
//!   atomically through a temporary file and a rename
//! - `<stem>.body`: append-only log of `seq,len\n<bytes>\n` records, synced
//!   before [`MessageStore::persist_outbound`] returns
//!
//! The log is indexed in memory on open. A failed append is cut back to the
//! last complete record before the error is returned, so damage can only sit
//! at the tail: a torn tail is truncated away with a warning, while an
//! unreadable record followed by complete ones is reported as corruption.

use crate::traits::{MessageStore, missing_in_range};
use async_trait::async_trait;
use bytes::Bytes;
use fixgate_core::error::StoreError;
use fixgate_core::types::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Counters {
    outbound: u64,
    inbound: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            outbound: 1,
            inbound: 1,
        }
    }
}

#[derive(Debug)]
struct Inner {
    counters: Counters,
    messages: BTreeMap<u64, Bytes>,
    log: File,
    /// Length of the log up to the last complete record.
    log_len: u64,
    /// Set when a failed append could not be cut back yet.
    torn: bool,
}

impl Inner {
    async fn rollback(&mut self) -> io::Result<()> {
        self.log.set_len(self.log_len).await?;
        self.log.sync_all().await?;
        self.torn = false;
        Ok(())
    }
}

/// File-backed message store keyed by session identity.
#[derive(Debug)]
pub struct FileStore {
    seqnums_path: PathBuf,
    body_path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Opens (or creates) the store for `session` under `dir`.
    ///
    /// # Errors
    /// - `StoreError::Corrupted` if the counters file cannot be parsed, or the
    ///   message log holds an unreadable record before complete ones
    /// - `StoreError::Io` on any filesystem failure
    pub async fn open(dir: impl AsRef<Path>, session: &SessionId) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;

        let stem = session.file_stem();
        let seqnums_path = dir.join(format!("{stem}.seqnums"));
        let body_path = dir.join(format!("{stem}.body"));

        let counters = load_counters(&seqnums_path).await?;
        let raw = match fs::read(&body_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let (messages, valid_len) = parse_log(&raw).map_err(|offset| StoreError::Corrupted {
            reason: format!(
                "{}: unreadable record at byte {offset} followed by complete records",
                body_path.display()
            ),
        })?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&body_path)
            .await?;
        if valid_len < raw.len() {
            warn!(
                path = %body_path.display(),
                discarded = raw.len() - valid_len,
                "truncating torn record at end of message log"
            );
            log.set_len(valid_len as u64).await?;
            log.sync_all().await?;
        }

        debug!(
            session = %session,
            outbound = counters.outbound,
            inbound = counters.inbound,
            stored = messages.len(),
            "opened file store"
        );

        Ok(Self {
            seqnums_path,
            body_path,
            inner: Mutex::new(Inner {
                counters,
                messages,
                log,
                log_len: valid_len as u64,
                torn: false,
            }),
        })
    }

    /// Path of the counters file.
    #[must_use]
    pub fn seqnums_path(&self) -> &Path {
        &self.seqnums_path
    }

    /// Path of the message log.
    #[must_use]
    pub fn body_path(&self) -> &Path {
        &self.body_path
    }

    async fn store_counters(&self, inner: &mut Inner, counters: Counters) -> Result<(), StoreError> {
        write_counters(&self.seqnums_path, counters).await?;
        inner.counters = counters;
        Ok(())
    }
}

async fn load_counters(path: &Path) -> Result<Counters, StoreError> {
    match fs::read(path).await {
        Ok(raw) => serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupted {
            reason: format!("{}: {e}", path.display()),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Counters::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_counters(path: &Path, counters: Counters) -> Result<(), StoreError> {
    let json = serde_json::to_vec(&counters).map_err(|e| StoreError::Io(e.to_string()))?;
    let tmp = path.with_extension("seqnums.tmp");
    let mut file = File::create(&tmp).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Indexes every complete record; returns the index and the byte length of
/// the valid prefix.
///
/// Unreadable bytes are a torn tail only when no complete record follows
/// them. Otherwise the offset of the first unreadable byte is the error.
fn parse_log(raw: &[u8]) -> Result<(BTreeMap<u64, Bytes>, usize), usize> {
    let mut messages = BTreeMap::new();
    let mut pos = 0;
    while pos < raw.len() {
        let Some((seq, body, consumed)) = parse_record(&raw[pos..]) else {
            if has_later_record(&raw[pos..]) {
                return Err(pos);
            }
            break;
        };
        messages.insert(seq, Bytes::copy_from_slice(body));
        pos += consumed;
    }
    Ok((messages, pos))
}

fn has_later_record(rest: &[u8]) -> bool {
    // a record appended after a torn one starts wherever the torn bytes stop
    (1..rest.len())
        .filter(|&i| rest[i].is_ascii_digit() && !rest[i - 1].is_ascii_digit())
        .any(|i| parse_record(&rest[i..]).is_some())
}

fn parse_record(buf: &[u8]) -> Option<(u64, &[u8], usize)> {
    let header_end = buf.iter().position(|b| *b == b'\n')?;
    let header = std::str::from_utf8(&buf[..header_end]).ok()?;
    let (seq, len) = header.split_once(',')?;
    let seq: u64 = seq.parse().ok()?;
    let len: usize = len.parse().ok()?;

    let start = header_end + 1;
    let end = start.checked_add(len)?;
    if buf.get(end) != Some(&b'\n') {
        return None;
    }
    Some((seq, &buf[start..end], end + 1))
}

fn encode_record(seq_num: u64, message: &[u8]) -> Vec<u8> {
    let header = format!("{seq_num},{}\n", message.len());
    let mut record = Vec::with_capacity(header.len() + message.len() + 1);
    record.extend_from_slice(header.as_bytes());
    record.extend_from_slice(message);
    record.push(b'\n');
    record
}

#[async_trait]
impl MessageStore for FileStore {
    async fn persist_outbound(&self, seq_num: u64, message: Bytes) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.messages.contains_key(&seq_num) {
            return Err(StoreError::PersistFailed {
                seq_num,
                reason: "sequence number already stored".to_string(),
            });
        }

        let persist_failed = |e: io::Error| StoreError::PersistFailed {
            seq_num,
            reason: e.to_string(),
        };
        if inner.torn {
            inner.rollback().await.map_err(persist_failed)?;
        }

        let record = encode_record(seq_num, &message);
        let appended = match inner.log.write_all(&record).await {
            Ok(()) => inner.log.sync_data().await,
            Err(e) => Err(e),
        };
        if let Err(e) = appended {
            inner.torn = true;
            if let Err(rollback) = inner.rollback().await {
                warn!(
                    path = %self.body_path.display(),
                    error = %rollback,
                    "could not cut failed append from message log"
                );
            }
            return Err(persist_failed(e));
        }

        inner.log_len += record.len() as u64;
        inner.messages.insert(seq_num, message);
        Ok(())
    }

    async fn next_outbound_seq(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let seq = inner.counters.outbound;
        let updated = Counters {
            outbound: seq + 1,
            ..inner.counters
        };
        self.store_counters(&mut inner, updated).await?;
        Ok(seq)
    }

    async fn outbound_seq(&self) -> u64 {
        self.inner.lock().await.counters.outbound
    }

    async fn inbound_seq(&self) -> u64 {
        self.inner.lock().await.counters.inbound
    }

    async fn advance_inbound_seq(&self, expected: u64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.counters.inbound != expected {
            return Err(StoreError::SequenceMismatch {
                expected,
                stored: inner.counters.inbound,
            });
        }
        let updated = Counters {
            inbound: expected + 1,
            ..inner.counters
        };
        self.store_counters(&mut inner, updated).await?;
        Ok(updated.inbound)
    }

    async fn set_inbound_seq(&self, seq: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let updated = Counters {
            inbound: seq,
            ..inner.counters
        };
        self.store_counters(&mut inner, updated).await
    }

    async fn fetch_range(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let inner = self.inner.lock().await;
        let missing = missing_in_range(begin, end, |seq| inner.messages.contains_key(&seq));
        if !missing.is_empty() {
            return Err(StoreError::RangeUnavailable {
                begin,
                end,
                missing,
            });
        }
        Ok(inner
            .messages
            .range(begin..=end)
            .map(|(seq, bytes)| (*seq, bytes.clone()))
            .collect())
    }

    async fn get(&self, seq_num: u64) -> Result<Option<Bytes>, StoreError> {
        Ok(self.inner.lock().await.messages.get(&seq_num).cloned())
    }

    async fn reset(
        &self,
        next_outbound: u64,
        next_inbound: u64,
        clear_history: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if clear_history {
            inner.log.set_len(0).await?;
            inner.log.sync_all().await?;
            inner.log_len = 0;
            inner.torn = false;
            inner.messages.clear();
        }
        let updated = Counters {
            outbound: next_outbound,
            inbound: next_inbound,
        };
        self.store_counters(&mut inner, updated).await
    }
}
