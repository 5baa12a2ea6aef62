//! Store accessor: the public get/put surface over one record store.
//!
//! A [`RecordStore`] binds together a paged file, the record format for its
//! variant, and the id generator for its identifier space, and drives the
//! cursor through the write/read protocol: reads loop while the cursor
//! signals that a concurrent write may have torn them, then perform one
//! out-of-page check which is fatal and never retried.

pub mod header;

pub use header::StoreHeader;

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::ids::IdGenerator;
use crate::page::{CursorMode, PageCursor, PagedFile};
use crate::records::{offset_for_id, page_for_id, Record, RecordFormat, RecordLoad, RecordType};

/// Accessor for one record store (one variant, one id space, one file).
#[derive(Debug)]
pub struct RecordStore<F: PagedFile> {
    file: F,
    format: RecordFormat,
    header: StoreHeader,
    record_size: usize,
    records_per_page: usize,
    ids: Arc<IdGenerator>,
}

impl<F: PagedFile> RecordStore<F> {
    /// Binds `file` to the given variant. The id generator must belong to
    /// the variant's identifier space.
    pub fn open(
        file: F,
        record_type: RecordType,
        header: StoreHeader,
        ids: Arc<IdGenerator>,
    ) -> Result<Self> {
        if ids.id_type() != record_type.id_type() {
            return Err(StoreError::InvalidArgument(format!(
                "{} store cannot use the {} id space",
                record_type,
                ids.id_type()
            )));
        }
        let format = RecordFormat::new(record_type);
        let record_size = format.record_size(&header);
        if record_size > file.page_size() {
            return Err(StoreError::InvalidArgument(format!(
                "{} record size {} exceeds page size {}",
                record_type,
                record_size,
                file.page_size()
            )));
        }
        let records_per_page = file.page_size() / record_size;
        debug!(
            "opened {} store: record size {}, {} records per page",
            record_type, record_size, records_per_page
        );
        Ok(Self {
            file,
            format,
            header,
            record_size,
            records_per_page,
            ids,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn records_per_page(&self) -> usize {
        self.records_per_page
    }

    pub fn store_header(&self) -> StoreHeader {
        self.header
    }

    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    pub fn id_generator(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    pub fn high_id(&self) -> u64 {
        self.ids.high_id()
    }

    /// Allocates a fresh id for a record about to be written.
    pub fn allocate_id(&self) -> Result<u64> {
        self.ids.next_id()
    }

    /// Produces an empty, not-in-use record of this store's variant.
    pub fn new_record(&self, id: u64) -> Record {
        self.format.new_record(id)
    }

    /// Writes `record` at the slot its id names. An in-use record that
    /// overflows one unit gets a secondary unit allocated here; a
    /// not-in-use record is a deletion. Deletion releases ids only for a
    /// slot that was actually in use, and only after the tombstone write
    /// passes the bounds check, so a failed delete leaks nothing onto the
    /// free-list.
    pub fn put(&self, record: &mut Record) -> Result<()> {
        if record.payload.record_type() != self.format.record_type() {
            return Err(StoreError::InvalidArgument(format!(
                "cannot put {} record into {} store",
                record.payload.record_type(),
                self.format.record_type()
            )));
        }
        let page = page_for_id(record.id, self.records_per_page);
        let mut cursor = self.file.io(page, CursorMode::Write)?;
        let mut release = None;
        if record.in_use {
            self.format
                .prepare(record, self.record_size, &mut &*self.ids)?;
        } else {
            let was_in_use = self.format.slot_in_use(
                &mut cursor,
                record.id,
                self.record_size,
                self.records_per_page,
            )?;
            let secondary = record.secondary_unit_id.take();
            if was_in_use {
                release = Some((record.id, secondary));
            }
        }
        self.format
            .write(record, &mut cursor, self.record_size, self.records_per_page)?;
        if let Some((_, Some(secondary))) = release {
            let secondary_page = page_for_id(secondary, self.records_per_page);
            if cursor.current_page() != secondary_page {
                cursor.goto_page(secondary_page)?;
            }
            cursor.set_offset(offset_for_id(secondary, self.record_size, self.records_per_page));
            cursor.write_bytes(&vec![0; self.record_size]);
        }
        if cursor.check_and_clear_bounds_flag() {
            return Err(StoreError::Corruption(format!(
                "out-of-page access writing {} record {}",
                self.format.record_type(),
                record.id
            )));
        }
        if let Some((primary, secondary)) = release {
            if let Some(secondary) = secondary {
                self.ids.free_id(secondary)?;
            }
            self.ids.free_id(primary)?;
        }
        Ok(())
    }

    /// Reads the record at `id` under the given load mode, absorbing torn
    /// reads via the cursor's retry signal.
    pub fn get(&self, id: u64, mode: RecordLoad) -> Result<Record> {
        let mut record = self.format.new_record(id);
        let page = page_for_id(id, self.records_per_page);
        if page >= self.file.page_count() {
            // Slot was never written; an empty record, not an error.
            return Ok(record);
        }
        let mut cursor = self.file.io(page, CursorMode::Read)?;
        loop {
            // A decode failure inside the retry window may be a torn read;
            // it only counts once the cursor stands by the bytes.
            match self.format.read(
                &mut record,
                &mut cursor,
                mode,
                self.record_size,
                self.records_per_page,
            ) {
                Ok(()) => {
                    if !cursor.should_retry()? {
                        break;
                    }
                }
                Err(error) => {
                    if !cursor.should_retry()? {
                        return Err(error);
                    }
                }
            }
        }
        if cursor.check_and_clear_bounds_flag() {
            return Err(StoreError::Corruption(format!(
                "out-of-page access reading {} record {}",
                self.format.record_type(),
                id
            )));
        }
        Ok(record)
    }

    /// Probes for the highest in-use id, scanning from the tail of the
    /// file. This is the factory's high-id scanner during migration, when
    /// persisted id state cannot be trusted.
    pub fn scan_high_id(&self) -> Result<u64> {
        for page in (0..self.file.page_count()).rev() {
            let first_id = page * self.records_per_page as u64;
            for slot in (0..self.records_per_page).rev() {
                let id = first_id + slot as u64;
                let record = self.get(id, RecordLoad::Force)?;
                if record.in_use {
                    return Ok(id + 1);
                }
            }
        }
        Ok(0)
    }

    /// Persists the id space's state.
    pub fn checkpoint(&self) -> Result<()> {
        self.ids.checkpoint()
    }
}
