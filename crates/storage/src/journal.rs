// SPDX-License-Identifier: MIT

//! Append-only transaction journal with group commit support.
//!
//! One record per transaction state: a full snapshot of the durable fields,
//! keyed by transaction id. A newer record supersedes older ones for the
//! same id; recovery keeps the latest per id. Compaction rewrites the file
//! with only the records the scheduler still considers live.
//!
//! On-disk format: an 10-byte header (`CHEFJRNL` magic + u16 LE version)
//! followed by framed records: `[len: u32 LE][crc32: u32 LE][payload]`,
//! where the payload is the JSON encoding of the transaction record and the
//! checksum covers the payload bytes.

use chef_core::{Transaction, TxnId};
use crc::{Crc, CRC_32_ISO_HDLC};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

const MAGIC: &[u8; 8] = b"CHEFJRNL";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 10;

/// Upper bound on a single record frame; larger lengths mean corruption.
const MAX_RECORD_BYTES: u32 = 16 * 1024 * 1024;

/// Flush interval for group commit (~10ms batches)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum records to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Errors that can occur in journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only journal of transaction records.
///
/// Records are buffered in memory and flushed to disk either when
/// [`Journal::needs_flush`] reports true (interval elapsed or buffer full)
/// or explicitly via [`Journal::flush`]. State-entry records use
/// [`Journal::append_sync`]: they must be durable before the state's action
/// runs.
pub struct Journal {
    file: File,
    path: PathBuf,
    /// Buffered frames waiting to be flushed
    write_buffer: Vec<Vec<u8>>,
    /// Last flush timestamp for interval checking
    last_flush: Instant,
}

impl Journal {
    /// Open or create a journal, returning it together with the latest
    /// record per transaction id.
    ///
    /// A corrupt tail (torn write, bad checksum, undecodable payload) is
    /// rotated to a `.bak` file and the valid prefix preserved, so a crash
    /// mid-append loses at most the torn record.
    pub fn open(path: &Path) -> Result<(Self, BTreeMap<TxnId, Transaction>), JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let scan = scan(&bytes);

        if scan.corrupt {
            let bak_path = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_bytes = scan.valid_end,
                records = scan.records.len(),
                "corrupt journal tail detected, rotating to .bak and preserving valid prefix",
            );
            if path.exists() {
                std::fs::rename(path, &bak_path)?;
            }
            let mut fresh = File::create(path)?;
            if scan.valid_end > 0 {
                fresh.write_all(&bytes[..scan.valid_end])?;
            } else {
                write_header(&mut fresh)?;
            }
            fresh.sync_all()?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            write_header(&mut file)?;
            file.sync_all()?;
        }

        Ok((
            Self {
                file,
                path: path.to_owned(),
                write_buffer: Vec::new(),
                last_flush: Instant::now(),
            },
            scan.records,
        ))
    }

    /// Append a transaction snapshot to the write buffer.
    ///
    /// The record is NOT durable until [`Journal::flush`] is called.
    pub fn append(&mut self, txn: &Transaction) -> Result<(), JournalError> {
        let payload = serde_json::to_vec(txn)?;
        let mut frame = Vec::with_capacity(payload.len() + 8);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&CRC32.checksum(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        self.write_buffer.push(frame);
        Ok(())
    }

    /// Append and immediately make durable. Used for the pre-action
    /// persistence hook: a state-entry record commits strictly before the
    /// state's action is invoked.
    pub fn append_sync(&mut self, txn: &Transaction) -> Result<(), JournalError> {
        self.append(txn)?;
        self.flush()
    }

    /// Check if flush is needed (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered records to disk with a single fsync.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        for frame in self.write_buffer.drain(..) {
            self.file.write_all(&frame)?;
        }
        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Rewrite the journal with exactly the given records, dropping all
    /// superseded and purged ones. Safe against crashes: written to a temp
    /// file, fsynced, then atomically renamed into place.
    pub fn compact<'a, I>(&mut self, records: I) -> Result<(), JournalError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        self.flush()?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            write_header(&mut tmp)?;
            for txn in records {
                let payload = serde_json::to_vec(txn)?;
                tmp.write_all(&(payload.len() as u32).to_le_bytes())?;
                tmp.write_all(&CRC32.checksum(&payload).to_le_bytes())?;
                tmp.write_all(&payload)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Highest transaction id present in a record map; used to floor the id
    /// allocator so ids never regress.
    pub fn max_id(records: &BTreeMap<TxnId, Transaction>) -> u64 {
        records.keys().next_back().map(|id| id.as_u64()).unwrap_or(0)
    }
}

fn write_header(file: &mut File) -> io::Result<()> {
    file.write_all(MAGIC)?;
    file.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

struct Scan {
    records: BTreeMap<TxnId, Transaction>,
    /// Byte offset just past the last valid frame (including the header).
    valid_end: usize,
    corrupt: bool,
}

/// Walk the journal bytes, collecting the latest record per id and the
/// offset of the first corruption (if any).
fn scan(bytes: &[u8]) -> Scan {
    let mut records = BTreeMap::new();

    if bytes.is_empty() {
        return Scan {
            records,
            valid_end: 0,
            corrupt: false,
        };
    }
    if bytes.len() < HEADER_LEN
        || &bytes[..8] != MAGIC
        || u16::from_le_bytes([bytes[8], bytes[9]]) != VERSION
    {
        // Unrecognized header: treat the whole file as corrupt.
        return Scan {
            records,
            valid_end: 0,
            corrupt: true,
        };
    }

    let mut offset = HEADER_LEN;
    loop {
        if offset == bytes.len() {
            return Scan {
                records,
                valid_end: offset,
                corrupt: false,
            };
        }
        if bytes.len() - offset < 8 {
            break; // torn frame header
        }
        let len = u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        let crc = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]);
        if len > MAX_RECORD_BYTES || bytes.len() - offset - 8 < len as usize {
            break; // implausible length or torn payload
        }
        let payload = &bytes[offset + 8..offset + 8 + len as usize];
        if CRC32.checksum(payload) != crc {
            break;
        }
        let txn: Transaction = match serde_json::from_slice(payload) {
            Ok(txn) => txn,
            Err(_) => break,
        };
        records.insert(txn.id, txn);
        offset += 8 + len as usize;
    }

    Scan {
        records,
        valid_end: offset,
        corrupt: true,
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = std::fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = std::fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
