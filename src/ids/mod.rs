//! Identifier spaces: one monotonically-extending id space per entity type.
//!
//! [`IdGenerator`] owns allocation and reuse for a single [`IdType`];
//! factories create, open, and hand out generators keyed by type. The
//! migration-mode factory ([`ScanOnOpenIdGeneratorFactory`]) memoizes frozen
//! read-only generators that mirror a scanned high id and reject mutation.

pub mod batch;
pub mod factory;
pub mod generator;

pub use batch::BatchingIdSequence;
pub use factory::{DefaultIdGeneratorFactory, IdGeneratorFactory, ScanOnOpenIdGeneratorFactory};
pub use generator::IdGenerator;

use std::fmt;

use crate::error::Result;

/// A named identifier space. Every record store draws its ids from exactly
/// one of these.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IdType {
    Node,
    Relationship,
    Property,
    RelationshipGroup,
    RelationshipTypeToken,
    PropertyKeyToken,
    LabelToken,
    Dynamic,
}

impl IdType {
    pub const ALL: [IdType; 8] = [
        IdType::Node,
        IdType::Relationship,
        IdType::Property,
        IdType::RelationshipGroup,
        IdType::RelationshipTypeToken,
        IdType::PropertyKeyToken,
        IdType::LabelToken,
        IdType::Dynamic,
    ];

    /// Name of the persisted id-state file for this space, relative to the
    /// store directory.
    pub fn file_name(self) -> &'static str {
        match self {
            IdType::Node => "nodes.id",
            IdType::Relationship => "relationships.id",
            IdType::Property => "properties.id",
            IdType::RelationshipGroup => "relationship_groups.id",
            IdType::RelationshipTypeToken => "relationship_type_tokens.id",
            IdType::PropertyKeyToken => "property_key_tokens.id",
            IdType::LabelToken => "label_tokens.id",
            IdType::Dynamic => "dynamic.id",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            IdType::Node => 0,
            IdType::Relationship => 1,
            IdType::Property => 2,
            IdType::RelationshipGroup => 3,
            IdType::RelationshipTypeToken => 4,
            IdType::PropertyKeyToken => 5,
            IdType::LabelToken => 6,
            IdType::Dynamic => 7,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdType::Node => "node",
            IdType::Relationship => "relationship",
            IdType::Property => "property",
            IdType::RelationshipGroup => "relationship group",
            IdType::RelationshipTypeToken => "relationship type token",
            IdType::PropertyKeyToken => "property key token",
            IdType::LabelToken => "label token",
            IdType::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// Narrow allocation interface consumed by record formats while preparing
/// records for write. Implemented by [`IdGenerator`] references and by
/// [`BatchingIdSequence`].
pub trait IdSequence {
    fn next(&mut self) -> Result<u64>;
}
