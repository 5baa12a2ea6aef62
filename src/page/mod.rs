//! Minimal contract consumed from the external page cache.
//!
//! The storage engine never maps files or evicts pages itself; it drives a
//! [`PageCursor`] obtained from a [`PagedFile`] through the write/read
//! protocol and honors two signals the cursor reports:
//!
//! - `should_retry()` - a concurrent write may have torn the just-completed
//!   read; re-seek and repeat the full read.
//! - `check_and_clear_bounds_flag()` - the cursor was driven outside the
//!   mapped page. Never retried; callers treat it as corruption.
//!
//! Out-of-bounds accesses do not fail eagerly: reads return zeroes, writes
//! are dropped, and the flag latches until checked. That lets a caller run a
//! whole record through the cursor and perform a single post-check.
//!
//! [`EphemeralPageFile`] is the in-memory implementation used by this
//! crate's tests and by embedders that want a throwaway store.

pub mod ephemeral;

pub use ephemeral::EphemeralPageFile;

use crate::error::Result;

/// Page access mode: shared readers or one exclusive writer per page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorMode {
    Read,
    Write,
}

/// A positioned view over one page of a paged file.
///
/// Multi-byte values are little-endian. Every read/write advances the
/// cursor offset by the width of the access, in or out of bounds alike.
pub trait PageCursor {
    /// Pins the given page. Returns `Ok(false)` when a read cursor is asked
    /// for a page beyond the end of the file; a write cursor extends the
    /// file instead.
    fn goto_page(&mut self, page_id: u64) -> Result<bool>;

    fn current_page(&self) -> u64;

    fn set_offset(&mut self, offset: usize);

    fn offset(&self) -> usize;

    fn read_u8(&mut self) -> u8;

    fn read_u32(&mut self) -> u32;

    fn read_u64(&mut self) -> u64;

    fn read_bytes(&mut self, buf: &mut [u8]);

    fn write_u8(&mut self, value: u8);

    fn write_u32(&mut self, value: u32);

    fn write_u64(&mut self, value: u64);

    fn write_bytes(&mut self, bytes: &[u8]);

    /// Opens (or replaces) this cursor's linked cursor: a second cursor
    /// over the same file in the same mode, pinned to `page_id`. Used when
    /// a record continues on another page; the primary page stays pinned,
    /// and the linked cursor's retry and bounds state folds into this
    /// cursor's [`should_retry`](PageCursor::should_retry) and
    /// [`check_and_clear_bounds_flag`](PageCursor::check_and_clear_bounds_flag).
    fn open_linked_cursor(&mut self, page_id: u64) -> Result<&mut Self>
    where
        Self: Sized;

    /// After a read: did a concurrent writer race this cursor's snapshot
    /// or its linked cursor's? A `true` return re-snapshots the page and
    /// drops the linked cursor; the caller must re-seek and repeat the
    /// full read. Always `false` for write cursors.
    fn should_retry(&mut self) -> Result<bool>;

    /// Reports and clears the out-of-page access flag, including the
    /// linked cursor's.
    fn check_and_clear_bounds_flag(&mut self) -> bool;
}

/// Handle to a store file mapped with a fixed page size.
pub trait PagedFile {
    type Cursor<'a>: PageCursor
    where
        Self: 'a;

    fn page_size(&self) -> usize;

    /// Number of pages currently in the file.
    fn page_count(&self) -> u64;

    /// Obtains a cursor pinned to `initial_page` in the requested mode.
    fn io(&self, initial_page: u64, mode: CursorMode) -> Result<Self::Cursor<'_>>;
}
