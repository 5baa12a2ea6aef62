//! Record-oriented storage engine for the Tenebra embedded graph database.
//!
//! Tenebra maps fixed-identity entities (nodes, relationships, properties,
//! tokens, dynamic overflow blocks) onto slots inside page-cached files and
//! manages the identifier spaces that name those entities. The page cache
//! itself is an external collaborator: this crate consumes the narrow
//! cursor contract in [`page`] and ships an in-memory implementation for
//! tests and throwaway stores.
//!
//! # Layers
//!
//! - [`ids`] - id generators, factories, and batched allocation
//! - [`records`] - the record model and fixed-layout formats
//! - [`store`] - the get/put accessor tying the layers together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenebra::{
//!     CursorMode, EphemeralPageFile, IdGenerator, IdType, NodeRecord, Record, RecordLoad,
//!     RecordPayload, RecordStore, RecordType, StoreHeader,
//! };
//!
//! fn main() -> tenebra::Result<()> {
//!     let ids = Arc::new(IdGenerator::new(IdType::Node, 0, 1 << 35));
//!     let store = RecordStore::open(
//!         EphemeralPageFile::new(8192),
//!         RecordType::Node,
//!         StoreHeader::default(),
//!         ids,
//!     )?;
//!     let id = store.allocate_id()?;
//!     let mut record = Record::new(
//!         id,
//!         RecordPayload::Node(NodeRecord {
//!             labels: 0b101,
//!             ..NodeRecord::default()
//!         }),
//!     );
//!     store.put(&mut record)?;
//!     let read = store.get(id, RecordLoad::Normal)?;
//!     assert!(read.in_use);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod ids;
pub mod logging;
pub mod page;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use ids::{
    BatchingIdSequence, DefaultIdGeneratorFactory, IdGenerator, IdGeneratorFactory, IdSequence,
    IdType, ScanOnOpenIdGeneratorFactory,
};
pub use page::{CursorMode, EphemeralPageFile, PageCursor, PagedFile};
pub use records::{
    offset_for_id, page_for_id, DynamicRecord, LabelScanIndexDescriptor, NodeRecord,
    PropertyKeyTokenRecord, PropertyRecord, PropertyValue, Record, RecordFormat, RecordLoad,
    RecordPayload, RecordType, RelationshipGroupRecord, RelationshipRecord, TokenRecord,
    NULL_REFERENCE,
};
pub use store::{RecordStore, StoreHeader};
