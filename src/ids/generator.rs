//! Live and frozen id generators with persisted state.
//!
//! A live generator allocates from its free-list first and bumps `high_id`
//! otherwise, bounded by `max_id`. State persists to a small per-space file
//! (magic, high id, free-list, crc32 trailer); `open` treats a missing,
//! truncated, or checksum-mismatching file as stale and falls back to the
//! caller-supplied high-id scanner instead.
//!
//! A frozen generator is a pure read-mirror of a scanned high id, used only
//! during store migration. It rejects every mutation with
//! [`StoreError::ReadOnlyIdSpace`] and never changes after construction.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::ids::{IdSequence, IdType};

const ID_FILE_MAGIC: &[u8; 8] = b"TNBRIDS\0";

/// Allocator for one entity type's identifier space.
#[derive(Debug)]
pub struct IdGenerator {
    id_type: IdType,
    max_id: u64,
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    Live(Mutex<LiveState>),
    Frozen(u64),
}

#[derive(Debug)]
struct LiveState {
    high_id: u64,
    free_list: VecDeque<u64>,
    file: Option<File>,
}

impl IdGenerator {
    /// In-memory live generator with no persisted state.
    pub fn new(id_type: IdType, high_id: u64, max_id: u64) -> Self {
        Self {
            id_type,
            max_id,
            mode: Mode::Live(Mutex::new(LiveState {
                high_id,
                free_list: VecDeque::new(),
                file: None,
            })),
        }
    }

    /// Frozen read-only generator reporting a scanned high id forever.
    pub fn frozen(id_type: IdType, high_id: u64) -> Self {
        Self {
            id_type,
            max_id: high_id,
            mode: Mode::Frozen(high_id),
        }
    }

    /// Opens a live generator against persisted state at `path`, invoking
    /// `high_id_scanner` when that state is absent or stale. The id file is
    /// created if missing and held under an exclusive file lock while the
    /// generator lives.
    pub fn open(
        path: impl AsRef<Path>,
        id_type: IdType,
        high_id_scanner: impl FnOnce() -> u64,
        max_id: u64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (high_id, free_list) = match read_state(path, id_type) {
            Some((high_id, free_list)) => {
                debug!(
                    "restored {} id space from {}: high id {}, {} free ids",
                    id_type,
                    path.display(),
                    high_id,
                    free_list.len()
                );
                (high_id, free_list)
            }
            None => {
                let high_id = high_id_scanner();
                debug!(
                    "no usable id state at {}; scanned {} high id {}",
                    path.display(),
                    id_type,
                    high_id
                );
                (high_id, VecDeque::new())
            }
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        file.try_lock_exclusive()?;
        Ok(Self {
            id_type,
            max_id,
            mode: Mode::Live(Mutex::new(LiveState {
                high_id,
                free_list,
                file: Some(file),
            })),
        })
    }

    /// Establishes a fresh id space at `high_id`, discarding any persisted
    /// state unless `throw_if_exists` is set.
    pub fn create(
        path: impl AsRef<Path>,
        id_type: IdType,
        high_id: u64,
        throw_if_exists: bool,
        max_id: u64,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            if throw_if_exists {
                return Err(StoreError::InvalidArgument(format!(
                    "id state for {} already exists at {}",
                    id_type,
                    path.display()
                )));
            }
            fs::remove_file(path)?;
        }
        Self::open(path, id_type, || high_id, max_id)
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.mode, Mode::Frozen(_))
    }

    pub fn high_id(&self) -> u64 {
        match &self.mode {
            Mode::Live(state) => state.lock().high_id,
            Mode::Frozen(high_id) => *high_id,
        }
    }

    fn live(&self) -> Result<&Mutex<LiveState>> {
        match &self.mode {
            Mode::Live(state) => Ok(state),
            Mode::Frozen(_) => Err(StoreError::ReadOnlyIdSpace(self.id_type)),
        }
    }

    /// Allocates the next id: free-list first, high-id bump otherwise.
    pub fn next_id(&self) -> Result<u64> {
        let mut state = self.live()?.lock();
        if let Some(id) = state.free_list.pop_front() {
            return Ok(id);
        }
        if state.high_id > self.max_id {
            return Err(StoreError::IdSpaceExhausted {
                id_type: self.id_type,
                max_id: self.max_id,
            });
        }
        let id = state.high_id;
        state.high_id += 1;
        Ok(id)
    }

    /// Reserves a contiguous run of `count` ids, never satisfied from the
    /// free-list. Used by [`BatchingIdSequence`](crate::ids::BatchingIdSequence).
    pub fn next_id_range(&self, count: u64) -> Result<u64> {
        if count == 0 {
            return Err(StoreError::InvalidArgument(
                "id range must be non-empty".into(),
            ));
        }
        let mut state = self.live()?.lock();
        if state.high_id.saturating_add(count - 1) > self.max_id {
            return Err(StoreError::IdSpaceExhausted {
                id_type: self.id_type,
                max_id: self.max_id,
            });
        }
        let start = state.high_id;
        state.high_id += count;
        Ok(start)
    }

    /// Returns an id to the free-list for future reuse.
    pub fn free_id(&self, id: u64) -> Result<()> {
        let mut state = self.live()?.lock();
        if id >= state.high_id {
            return Err(StoreError::InvalidArgument(format!(
                "cannot free {} id {} at or above high id {}",
                self.id_type, id, state.high_id
            )));
        }
        state.free_list.push_back(id);
        Ok(())
    }

    /// Raises the high id to `id` if it is currently lower. The high id
    /// never decreases.
    pub fn set_high_id(&self, id: u64) -> Result<()> {
        let mut state = self.live()?.lock();
        if id > state.high_id {
            state.high_id = id;
        }
        Ok(())
    }

    /// Persists high id and free-list to the backing id file, if any.
    /// No-op for in-memory and frozen generators.
    pub fn checkpoint(&self) -> Result<()> {
        let state = match &self.mode {
            Mode::Live(state) => state.lock(),
            Mode::Frozen(_) => return Ok(()),
        };
        let Some(file) = &state.file else {
            return Ok(());
        };
        let buf = encode_state(self.id_type, state.high_id, &state.free_list);
        file.set_len(0)?;
        let mut writer = file;
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&buf)?;
        writer.sync_data()?;
        Ok(())
    }

    /// Persists state and releases the id file and its lock. Later
    /// allocations still work in memory but are no longer persisted.
    pub fn close(&self) -> Result<()> {
        self.checkpoint()?;
        if let Mode::Live(state) = &self.mode {
            state.lock().file = None;
        }
        Ok(())
    }
}

impl IdSequence for &IdGenerator {
    fn next(&mut self) -> Result<u64> {
        self.next_id()
    }
}

fn encode_state(id_type: IdType, high_id: u64, free_list: &VecDeque<u64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(25 + free_list.len() * 8);
    buf.extend_from_slice(ID_FILE_MAGIC);
    buf.push(id_type.tag());
    buf.extend_from_slice(&high_id.to_le_bytes());
    buf.extend_from_slice(&(free_list.len() as u32).to_le_bytes());
    for id in free_list {
        buf.extend_from_slice(&id.to_le_bytes());
    }
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());
    buf
}

/// Restores persisted id state. Any structural problem means the state is
/// stale: we log it and return `None` so `open` falls back to scanning.
fn read_state(path: &Path, id_type: IdType) -> Option<(u64, VecDeque<u64>)> {
    let bytes = fs::read(path).ok()?;
    if bytes.len() < 25 {
        if !bytes.is_empty() {
            warn!(
                "id state at {} truncated ({} bytes); rescanning",
                path.display(),
                bytes.len()
            );
        }
        return None;
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes(trailer.try_into().ok()?);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != stored_crc {
        warn!("id state at {} failed checksum; rescanning", path.display());
        return None;
    }
    if &payload[..8] != ID_FILE_MAGIC {
        warn!("id state at {} has bad magic; rescanning", path.display());
        return None;
    }
    if payload[8] != id_type.tag() {
        warn!(
            "id state at {} belongs to a different id space; rescanning",
            path.display()
        );
        return None;
    }
    let high_id = u64::from_le_bytes(payload[9..17].try_into().ok()?);
    let count = u32::from_le_bytes(payload[17..21].try_into().ok()?) as usize;
    let ids = &payload[21..];
    if ids.len() != count * 8 {
        warn!(
            "id state at {} free-list length mismatch; rescanning",
            path.display()
        );
        return None;
    }
    let free_list = ids
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect();
    Some((high_id, free_list))
}
