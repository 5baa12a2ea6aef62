//! Error handling for the Tenebra storage engine.
//!
//! This module defines the error types used throughout the record storage
//! layer. All public APIs return `Result<T, StoreError>` so callers can
//! distinguish the failure classes that matter to a transaction layer:
//! transient conditions are absorbed internally (the read-retry loop never
//! surfaces), everything else maps to a dedicated variant.
//!
//! # Error Types
//!
//! - [`StoreError`] - Main error enum with variants for different failure modes
//! - [`Result`] - Result type alias for convenience

use std::io;
use thiserror::Error;

use crate::ids::IdType;
use crate::records::RecordType;

/// Result type for storage engine operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during record store operations.
///
/// Each variant corresponds to one failure classification so that upper
/// layers can decide between aborting the surrounding transaction and
/// escalating to a consistency-check tool.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the underlying filesystem.
    ///
    /// Raised while reading or writing persisted id-space state, or by a
    /// paged-file implementation that touches disk.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected.
    ///
    /// The storage layer raises this when a cursor reports an out-of-page
    /// access, or when persisted state fails structural validation beyond
    /// the point where a scan fallback can repair it. Never retried.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// A structurally invalid in-use record was decoded under
    /// [`RecordLoad::Normal`](crate::records::RecordLoad::Normal).
    ///
    /// `Force` mode reports best-effort data for the same bytes instead of
    /// raising this.
    #[error("invalid {record_type} record {id}: {reason}")]
    InvalidRecord {
        id: u64,
        record_type: RecordType,
        reason: String,
    },

    /// Mutation attempted on a frozen (migration-mode) id generator.
    ///
    /// Frozen generators mirror a scanned high id and reject allocation and
    /// release by contract.
    #[error("id space for {0} is read-only during migration")]
    ReadOnlyIdSpace(IdType),

    /// The identifier space for an entity type is exhausted.
    #[error("id space for {id_type} exhausted (max id {max_id})")]
    IdSpaceExhausted { id_type: IdType, max_id: u64 },

    /// Invalid argument or operation.
    ///
    /// Raised for out-of-range configuration values, oversized dynamic
    /// payloads, and attempts to re-create an id space that already exists
    /// with `throw_if_exists` set.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
