//! In-memory paged file with optimistic read snapshots.
//!
//! Pages carry a version counter. A write cursor holds the page's mutex for
//! as long as it stays on the page and bumps the version before releasing
//! it; a read cursor copies the page bytes under that mutex and compares
//! versions in `should_retry`, re-snapshotting when a writer raced it. A
//! completed read therefore always reflects one whole write, never an
//! interleaving of two writers' byte ranges.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};

use crate::error::Result;
use crate::page::{CursorMode, PageCursor, PagedFile};

#[derive(Debug)]
struct PageSlot {
    data: Arc<Mutex<Vec<u8>>>,
    version: AtomicU64,
}

impl PageSlot {
    fn new(page_size: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(vec![0; page_size])),
            version: AtomicU64::new(0),
        }
    }
}

/// Heap-backed [`PagedFile`] with no durability. Shared freely across
/// threads; one writer per page, lock-free readers with retry.
#[derive(Debug)]
pub struct EphemeralPageFile {
    page_size: usize,
    pages: RwLock<Vec<Arc<PageSlot>>>,
}

impl EphemeralPageFile {
    pub fn new(page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be non-zero");
        Self {
            page_size,
            pages: RwLock::new(Vec::new()),
        }
    }

    fn slot(&self, page_id: u64) -> Option<Arc<PageSlot>> {
        self.pages.read().get(page_id as usize).cloned()
    }

    /// Grows the file so `page_id` exists, then returns its slot.
    fn slot_or_grow(&self, page_id: u64) -> Arc<PageSlot> {
        if let Some(slot) = self.slot(page_id) {
            return slot;
        }
        let mut pages = self.pages.write();
        while pages.len() <= page_id as usize {
            pages.push(Arc::new(PageSlot::new(self.page_size)));
        }
        pages[page_id as usize].clone()
    }
}

impl PagedFile for EphemeralPageFile {
    type Cursor<'a> = EphemeralCursor<'a>;

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u64 {
        self.pages.read().len() as u64
    }

    fn io(&self, initial_page: u64, mode: CursorMode) -> Result<EphemeralCursor<'_>> {
        let mut cursor = EphemeralCursor {
            file: self,
            mode,
            page_id: initial_page,
            offset: 0,
            out_of_bounds: false,
            snapshot: None,
            snapshot_version: 0,
            write_slot: None,
            write_guard: None,
            linked: None,
        };
        cursor.goto_page(initial_page)?;
        Ok(cursor)
    }
}

pub struct EphemeralCursor<'a> {
    file: &'a EphemeralPageFile,
    mode: CursorMode,
    page_id: u64,
    offset: usize,
    out_of_bounds: bool,
    // Read state: a copy of the page taken under its mutex.
    snapshot: Option<(Arc<PageSlot>, Vec<u8>)>,
    snapshot_version: u64,
    // Write state: the page mutex is held until the cursor moves or drops.
    write_slot: Option<Arc<PageSlot>>,
    write_guard: Option<ArcMutexGuard<RawMutex, Vec<u8>>>,
    // Continuation-unit cursor; released after this cursor's own page.
    linked: Option<Box<EphemeralCursor<'a>>>,
}

impl EphemeralCursor<'_> {
    fn release_write(&mut self) {
        if let Some(slot) = self.write_slot.take() {
            slot.version.fetch_add(1, Ordering::SeqCst);
            self.write_guard = None;
        }
    }

    fn in_bounds(&mut self, width: usize) -> bool {
        let pinned = self.snapshot.is_some() || self.write_guard.is_some();
        if !pinned || self.offset + width > self.file.page_size {
            self.out_of_bounds = true;
            return false;
        }
        true
    }

    fn read_fixed<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        if self.in_bounds(N) {
            if let Some((_, buf)) = &self.snapshot {
                bytes.copy_from_slice(&buf[self.offset..self.offset + N]);
            } else if let Some(guard) = self.write_guard.as_ref() {
                bytes.copy_from_slice(&guard[self.offset..self.offset + N]);
            }
        }
        self.offset += N;
        bytes
    }

    fn write_fixed(&mut self, bytes: &[u8]) {
        if self.in_bounds(bytes.len()) {
            if let Some(guard) = self.write_guard.as_mut() {
                guard[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        self.offset += bytes.len();
    }
}

impl PageCursor for EphemeralCursor<'_> {
    fn goto_page(&mut self, page_id: u64) -> Result<bool> {
        self.page_id = page_id;
        self.offset = 0;
        self.linked = None;
        match self.mode {
            CursorMode::Read => {
                self.snapshot = None;
                let Some(slot) = self.file.slot(page_id) else {
                    return Ok(false);
                };
                let data = slot.data.clone();
                let guard = data.lock();
                self.snapshot_version = slot.version.load(Ordering::SeqCst);
                let copy = guard.clone();
                drop(guard);
                self.snapshot = Some((slot, copy));
                Ok(true)
            }
            CursorMode::Write => {
                self.release_write();
                let slot = self.file.slot_or_grow(page_id);
                self.write_guard = Some(Mutex::lock_arc(&slot.data));
                self.write_slot = Some(slot);
                Ok(true)
            }
        }
    }

    fn current_page(&self) -> u64 {
        self.page_id
    }

    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn read_u8(&mut self) -> u8 {
        self.read_fixed::<1>()[0]
    }

    fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.read_fixed::<4>())
    }

    fn read_u64(&mut self) -> u64 {
        u64::from_le_bytes(self.read_fixed::<8>())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) {
        if self.in_bounds(buf.len()) {
            if let Some((_, page)) = &self.snapshot {
                buf.copy_from_slice(&page[self.offset..self.offset + buf.len()]);
            } else if let Some(guard) = self.write_guard.as_ref() {
                buf.copy_from_slice(&guard[self.offset..self.offset + buf.len()]);
            }
        } else {
            buf.fill(0);
        }
        self.offset += buf.len();
    }

    fn write_u8(&mut self, value: u8) {
        self.write_fixed(&[value]);
    }

    fn write_u32(&mut self, value: u32) {
        self.write_fixed(&value.to_le_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.write_fixed(&value.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_fixed(bytes);
    }

    fn open_linked_cursor(&mut self, page_id: u64) -> Result<&mut Self> {
        let linked = Box::new(self.file.io(page_id, self.mode)?);
        Ok(&mut **self.linked.insert(linked))
    }

    fn should_retry(&mut self) -> Result<bool> {
        let linked_raced = match self.linked.as_mut() {
            Some(linked) => linked.should_retry()?,
            None => false,
        };
        let own_raced = match &self.snapshot {
            Some((slot, _)) => slot.version.load(Ordering::SeqCst) != self.snapshot_version,
            None => false,
        };
        if own_raced {
            if let Some((slot, _)) = self.snapshot.take() {
                // A writer moved the page under us; take a fresh snapshot
                // and ask the caller to re-run the read.
                let guard = slot.data.lock();
                self.snapshot_version = slot.version.load(Ordering::SeqCst);
                let copy = guard.clone();
                drop(guard);
                self.snapshot = Some((slot, copy));
            }
        }
        if linked_raced || own_raced {
            // The re-run starts over from the primary unit, so any linked
            // cursor and stale bounds flag from the torn pass are dropped.
            self.linked = None;
            self.out_of_bounds = false;
            return Ok(true);
        }
        Ok(false)
    }

    fn check_and_clear_bounds_flag(&mut self) -> bool {
        let linked_flagged = match self.linked.as_mut() {
            Some(linked) => linked.check_and_clear_bounds_flag(),
            None => false,
        };
        let flagged = self.out_of_bounds;
        self.out_of_bounds = false;
        flagged || linked_flagged
    }
}

impl Drop for EphemeralCursor<'_> {
    fn drop(&mut self) {
        self.release_write();
    }
}
