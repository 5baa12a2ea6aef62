//! Record model: fixed-identity entities projected to and from byte slots.
//!
//! A [`Record`] is an ephemeral in-memory projection; persistence is the
//! byte layout in the paged file. Records share three common fields (`id`,
//! `in_use`, `secondary_unit_id`) and carry one [`RecordPayload`] variant
//! per store. When `in_use` is false the payload is semantically undefined
//! and must not be trusted by readers.

pub mod format;

pub use format::{offset_for_id, page_for_id, RecordFormat, RecordLoad};

use std::fmt;

use crate::ids::IdType;

/// Nil value for every reference field (chain pointers, block links).
pub const NULL_REFERENCE: u64 = u64::MAX;

/// Closed set of record variants, one per store.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordType {
    Node,
    Relationship,
    Property,
    RelationshipGroup,
    RelationshipTypeToken,
    PropertyKeyToken,
    LabelToken,
    Dynamic,
}

impl RecordType {
    /// The identifier space this variant draws its ids from.
    pub fn id_type(self) -> IdType {
        match self {
            RecordType::Node => IdType::Node,
            RecordType::Relationship => IdType::Relationship,
            RecordType::Property => IdType::Property,
            RecordType::RelationshipGroup => IdType::RelationshipGroup,
            RecordType::RelationshipTypeToken => IdType::RelationshipTypeToken,
            RecordType::PropertyKeyToken => IdType::PropertyKeyToken,
            RecordType::LabelToken => IdType::LabelToken,
            RecordType::Dynamic => IdType::Dynamic,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::Node => "node",
            RecordType::Relationship => "relationship",
            RecordType::Property => "property",
            RecordType::RelationshipGroup => "relationship group",
            RecordType::RelationshipTypeToken => "relationship type token",
            RecordType::PropertyKeyToken => "property key token",
            RecordType::LabelToken => "label token",
            RecordType::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// One record, any variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u64,
    pub in_use: bool,
    /// Overflow slot in the same store, assigned by
    /// [`RecordFormat::prepare`] when the payload exceeds one unit.
    pub secondary_unit_id: Option<u64>,
    pub payload: RecordPayload,
}

impl Record {
    pub fn new(id: u64, payload: RecordPayload) -> Self {
        Self {
            id,
            in_use: true,
            secondary_unit_id: None,
            payload,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.payload.record_type()
    }
}

/// Variant-specific fixed payload fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Node(NodeRecord),
    Relationship(RelationshipRecord),
    Property(PropertyRecord),
    RelationshipGroup(RelationshipGroupRecord),
    RelationshipTypeToken(TokenRecord),
    PropertyKeyToken(PropertyKeyTokenRecord),
    LabelToken(TokenRecord),
    Dynamic(DynamicRecord),
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::Node(_) => RecordType::Node,
            RecordPayload::Relationship(_) => RecordType::Relationship,
            RecordPayload::Property(_) => RecordType::Property,
            RecordPayload::RelationshipGroup(_) => RecordType::RelationshipGroup,
            RecordPayload::RelationshipTypeToken(_) => RecordType::RelationshipTypeToken,
            RecordPayload::PropertyKeyToken(_) => RecordType::PropertyKeyToken,
            RecordPayload::LabelToken(_) => RecordType::LabelToken,
            RecordPayload::Dynamic(_) => RecordType::Dynamic,
        }
    }

    pub(crate) fn empty(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Node => RecordPayload::Node(NodeRecord::default()),
            RecordType::Relationship => RecordPayload::Relationship(RelationshipRecord::default()),
            RecordType::Property => RecordPayload::Property(PropertyRecord::default()),
            RecordType::RelationshipGroup => {
                RecordPayload::RelationshipGroup(RelationshipGroupRecord::default())
            }
            RecordType::RelationshipTypeToken => {
                RecordPayload::RelationshipTypeToken(TokenRecord::default())
            }
            RecordType::PropertyKeyToken => {
                RecordPayload::PropertyKeyToken(PropertyKeyTokenRecord::default())
            }
            RecordType::LabelToken => RecordPayload::LabelToken(TokenRecord::default()),
            RecordType::Dynamic => RecordPayload::Dynamic(DynamicRecord::default()),
        }
    }
}

/// A node: head of its relationship chain, head of its property chain, and
/// an inlined label-set reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub next_rel: u64,
    pub next_prop: u64,
    pub labels: u64,
    pub dense: bool,
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self {
            next_rel: NULL_REFERENCE,
            next_prop: NULL_REFERENCE,
            labels: 0,
            dense: false,
        }
    }
}

/// A relationship with its two endpoint chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub first_node: u64,
    pub second_node: u64,
    pub rel_type: u32,
    pub start_prev: u64,
    pub start_next: u64,
    pub end_prev: u64,
    pub end_next: u64,
    pub next_prop: u64,
    pub first_in_start_chain: bool,
    pub first_in_end_chain: bool,
}

impl Default for RelationshipRecord {
    fn default() -> Self {
        Self {
            first_node: NULL_REFERENCE,
            second_node: NULL_REFERENCE,
            rel_type: 0,
            start_prev: NULL_REFERENCE,
            start_next: NULL_REFERENCE,
            end_prev: NULL_REFERENCE,
            end_next: NULL_REFERENCE,
            next_prop: NULL_REFERENCE,
            first_in_start_chain: false,
            first_in_end_chain: false,
        }
    }
}

/// A property: key token plus an inlined or chained value, linked into its
/// owner's property chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub prev_prop: u64,
    pub next_prop: u64,
    pub key: u32,
    pub value: PropertyValue,
}

impl Default for PropertyRecord {
    fn default() -> Self {
        Self {
            prev_prop: NULL_REFERENCE,
            next_prop: NULL_REFERENCE,
            key: 0,
            value: PropertyValue::Int(0),
        }
    }
}

/// A property value small enough to inline in the record, or a reference
/// chaining into the dynamic store.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Reference(u64),
}

/// A relationship group: per-type chain heads for a dense node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipGroupRecord {
    pub rel_type: u32,
    pub next: u64,
    pub first_out: u64,
    pub first_in: u64,
    pub first_loop: u64,
    pub owning_node: u64,
}

impl Default for RelationshipGroupRecord {
    fn default() -> Self {
        Self {
            rel_type: 0,
            next: NULL_REFERENCE,
            first_out: NULL_REFERENCE,
            first_in: NULL_REFERENCE,
            first_loop: NULL_REFERENCE,
            owning_node: NULL_REFERENCE,
        }
    }
}

/// A token (relationship type or label): reference to its name in the
/// dynamic store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRecord {
    pub name_id: u32,
}

/// A property key token, additionally tracking how many properties use it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyKeyTokenRecord {
    pub name_id: u32,
    pub property_count: u32,
}

/// One block in a dynamic overflow chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRecord {
    pub next_block: u64,
    pub start_block: bool,
    pub data: Vec<u8>,
}

impl Default for DynamicRecord {
    fn default() -> Self {
        Self {
            next_block: NULL_REFERENCE,
            start_block: false,
            data: Vec::new(),
        }
    }
}

/// Synthetic stand-in for the label scan index in consistency reports.
///
/// Exists purely for diagnostic display; deliberately not `Clone`, since
/// synthetic records never participate in copy or write paths.
#[derive(Debug)]
pub struct LabelScanIndexDescriptor {
    label_id: u64,
}

impl LabelScanIndexDescriptor {
    pub fn new(label_id: u64) -> Self {
        Self { label_id }
    }

    pub fn label_id(&self) -> u64 {
        self.label_id
    }
}

impl fmt::Display for LabelScanIndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelScanIndex[label={}]", self.label_id)
    }
}
