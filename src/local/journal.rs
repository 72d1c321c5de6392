//! Per-collection journal file.
//!
//! Layout: a 5-byte header (magic + version) followed by frames of
//! `[len: u32 LE][MessagePack op][crc32: u32 LE]`. Every append is flushed and
//! fsynced before returning. A frame that is truncated or fails its checksum
//! ends replay; the file is cut back to the last good frame.
//!
//! The file always ends on a frame boundary: an append that fails partway is
//! cut back off before the error is returned.

use crate::error::{Result, StoreError};
use crate::types::{Record, RecordKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Magic bytes for journal files.
const JOURNAL_MAGIC: &[u8; 4] = b"CJL\0";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

const HEADER_LEN: u64 = 5;

/// Frames above this size are treated as corruption.
const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// A single journaled mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Upsert one record.
    Put { key: RecordKey, record: Record },
    /// Remove one record.
    Delete(RecordKey),
    /// Remove every record.
    Clear,
    /// Replace the whole collection.
    Replace(Vec<(RecordKey, Record)>),
}

impl JournalOp {
    /// Apply this op to an in-memory view of the collection.
    pub fn apply(self, records: &mut BTreeMap<RecordKey, Record>) {
        match self {
            JournalOp::Put { key, record } => {
                records.insert(key, record);
            }
            JournalOp::Delete(key) => {
                records.remove(&key);
            }
            JournalOp::Clear => records.clear(),
            JournalOp::Replace(entries) => {
                records.clear();
                records.extend(entries);
            }
        }
    }
}

/// Append-only journal for one collection.
pub struct Journal {
    path: PathBuf,
    file: File,
    /// Offset just past the last complete frame.
    end: u64,
    frames: u64,
    /// Set when a failed append could not be cut back off.
    poisoned: bool,
}

impl Journal {
    /// Open or create a journal, returning it with the ops it already holds.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<JournalOp>)> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            Self::write_fresh(&path, None)?;
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid journal magic".into()));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != JOURNAL_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                version[0]
            )));
        }

        let mut ops = Vec::new();
        let mut good_end = HEADER_LEN;
        loop {
            match Self::read_frame(&mut reader) {
                Ok(Some((op, len))) => {
                    ops.push(op);
                    good_end += len;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), offset = good_end, error = %e, "discarding torn journal tail");
                    break;
                }
            }
        }

        let mut file = reader.into_inner();
        if file.metadata()?.len() != good_end {
            file.set_len(good_end)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(good_end))?;

        let frames = ops.len() as u64;
        Ok((
            Self {
                path,
                file,
                end: good_end,
                frames,
                poisoned: false,
            },
            ops,
        ))
    }

    /// Append one op and fsync.
    pub fn append(&mut self, op: &JournalOp) -> Result<()> {
        self.append_with(op, |file, frame| {
            file.write_all(frame)?;
            file.sync_all()
        })
    }

    fn append_with(
        &mut self,
        op: &JournalOp,
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> Result<()> {
        if self.poisoned {
            return Err(StoreError::StorageUnavailable(format!(
                "{}: journal tail could not be repaired",
                self.path.display()
            )));
        }

        let frame = Self::encode_frame(op)?;
        if let Err(e) = write(&mut self.file, &frame) {
            self.cut_back();
            return Err(e.into());
        }

        self.end += frame.len() as u64;
        self.frames += 1;
        Ok(())
    }

    /// Drop anything past the last complete frame.
    fn cut_back(&mut self) {
        let end = self.end;
        let repaired = self
            .file
            .set_len(end)
            .and_then(|()| self.file.seek(SeekFrom::Start(end)).map(|_| ()))
            .and_then(|()| self.file.sync_all());
        if let Err(e) = repaired {
            warn!(path = %self.path.display(), offset = end, error = %e, "failed to cut back journal tail");
            self.poisoned = true;
        }
    }

    /// Rewrite the journal as a single `Replace` frame.
    ///
    /// The new file is written next to the old one and renamed over it. On
    /// error the existing journal stays in place and usable.
    pub fn compact(&mut self, entries: Vec<(RecordKey, Record)>) -> Result<()> {
        let (file, end) = Self::write_fresh(&self.path, Some(&JournalOp::Replace(entries)))?;
        self.file = file;
        self.end = end;
        self.frames = 1;
        self.poisoned = false;
        Ok(())
    }

    /// Number of frames currently in the file.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a new journal beside `path` and rename it into place.
    ///
    /// Returns the new file positioned at its end, plus that offset.
    fn write_fresh(path: &Path, op: Option<&JournalOp>) -> Result<(File, u64)> {
        let file_name = path
            .file_name()
            .ok_or_else(|| StoreError::InvalidFormat("journal path has no file name".into()))?;
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(JOURNAL_MAGIC)?;
        writer.write_all(&[JOURNAL_VERSION])?;
        let mut end = HEADER_LEN;
        if let Some(op) = op {
            let frame = Self::encode_frame(op)?;
            writer.write_all(&frame)?;
            end += frame.len() as u64;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        // The handle follows the file across the rename.
        fs::rename(&tmp_path, path)?;
        Ok((file, end))
    }

    fn encode_frame(op: &JournalOp) -> Result<Vec<u8>> {
        let encoded = rmp_serde::to_vec(op)?;

        let mut frame = Vec::with_capacity(encoded.len() + 8);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&crc32fast::hash(&encoded).to_le_bytes());
        Ok(frame)
    }

    /// Read one frame. `Ok(None)` at a clean end of file.
    fn read_frame(reader: &mut impl Read) -> Result<Option<(JournalOp, u64)>> {
        let mut len_bytes = [0u8; 4];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_LEN {
            return Err(StoreError::Corruption("journal frame too large".into()));
        }

        let mut encoded = vec![0u8; len];
        reader.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes)?;
        let expected = u32::from_le_bytes(checksum_bytes);
        let got = crc32fast::hash(&encoded);
        if expected != got {
            return Err(StoreError::ChecksumMismatch { expected, got });
        }

        let op = rmp_serde::from_slice(&encoded)?;
        Ok(Some((op, len as u64 + 8)))
    }
}
