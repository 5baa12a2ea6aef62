//! Fixed-layout serialization of records to and from page cursors.
//!
//! Generic layout for every variant:
//!
//! ```text
//! [flags byte][fixed payload fields][8-byte secondary-unit id, overflow variants]
//! ```
//!
//! Flags byte: bit 0 `IN_USE`, bit 1 `SECONDARY_UNIT`, bits 2-3 variant
//! flags, bit 6 marks a slot that is the continuation unit of another
//! record. Node, relationship, and relationship-group records store their
//! reference fields as 32-bit low words; when any reference needs more than
//! 32 bits the high words continue in a secondary unit of the same store,
//! allocated by [`RecordFormat::prepare`]. The low word `0xFFFF_FFFF` is
//! reserved to encode [`NULL_REFERENCE`] in one unit.
//!
//! Record size is a pure function of (variant, store header) and the byte
//! offset of a record is a pure function of (id, record size, records per
//! page), identical for read and write.

use crate::error::{Result, StoreError};
use crate::ids::IdSequence;
use crate::page::PageCursor;
use crate::records::{
    DynamicRecord, NodeRecord, PropertyKeyTokenRecord, PropertyRecord, PropertyValue, Record,
    RecordPayload, RecordType, RelationshipGroupRecord, RelationshipRecord, TokenRecord,
    NULL_REFERENCE,
};
use crate::store::StoreHeader;

const IN_USE_BIT: u8 = 0b0000_0001;
const SECONDARY_UNIT_BIT: u8 = 0b0000_0010;
// Variant flags: dense node / first-in-start-chain / dynamic start block.
const VARIANT_FLAG_A: u8 = 0b0000_0100;
// Relationship first-in-end-chain.
const VARIANT_FLAG_B: u8 = 0b0000_1000;
// The slot holds the continuation unit of another record.
const RECORD_UNIT_BIT: u8 = 0b0100_0000;

const NODE_RECORD_SIZE: usize = 1 + 3 * 4 + 8;
const RELATIONSHIP_RECORD_SIZE: usize = 1 + 4 + 7 * 4 + 8;
const RELATIONSHIP_GROUP_RECORD_SIZE: usize = 1 + 4 + 5 * 4 + 8;
const PROPERTY_RECORD_SIZE: usize = 1 + 4 + 1 + 8 + 8 + 8;
const TOKEN_RECORD_SIZE: usize = 1 + 4;
const PROPERTY_KEY_TOKEN_RECORD_SIZE: usize = 1 + 4 + 4;
const DYNAMIC_BLOCK_HEADER_SIZE: usize = 1 + 4 + 8;

const VALUE_KIND_INT: u8 = 0;
const VALUE_KIND_FLOAT: u8 = 1;
const VALUE_KIND_BOOL: u8 = 2;
const VALUE_KIND_REFERENCE: u8 = 3;

/// Strictness of a record read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecordLoad {
    /// Fail on structurally invalid in-use records.
    Normal,
    /// Best-effort decode even if invalid; for recovery tooling.
    Force,
    /// Validate without raising; invalid records come back cleared.
    CheckConsistency,
}

/// Byte offset of a record within its page. Pure; identical for read and
/// write.
pub fn offset_for_id(id: u64, record_size: usize, records_per_page: usize) -> usize {
    (id as usize % records_per_page) * record_size
}

/// Page holding a record.
pub fn page_for_id(id: u64, records_per_page: usize) -> u64 {
    id / records_per_page as u64
}

fn position<C: PageCursor>(cursor: &mut C, page: u64, offset: usize) -> Result<()> {
    if cursor.current_page() != page {
        cursor.goto_page(page)?;
    }
    cursor.set_offset(offset);
    Ok(())
}

fn ref_needs_high_word(value: u64) -> bool {
    value != NULL_REFERENCE && value >= u32::MAX as u64
}

fn decode_single_unit_ref(lo: u32) -> u64 {
    if lo == u32::MAX {
        NULL_REFERENCE
    } else {
        lo as u64
    }
}

fn combine_ref(lo: u32, hi: u32) -> u64 {
    ((hi as u64) << 32) | lo as u64
}

/// Reference fields of overflow-capable variants, in on-disk order.
fn reference_fields(payload: &RecordPayload) -> Vec<u64> {
    match payload {
        RecordPayload::Node(node) => vec![node.next_rel, node.next_prop, node.labels],
        RecordPayload::Relationship(rel) => vec![
            rel.first_node,
            rel.second_node,
            rel.start_prev,
            rel.start_next,
            rel.end_prev,
            rel.end_next,
            rel.next_prop,
        ],
        RecordPayload::RelationshipGroup(group) => vec![
            group.next,
            group.first_out,
            group.first_in,
            group.first_loop,
            group.owning_node,
        ],
        _ => Vec::new(),
    }
}

/// Converts between one record variant and its byte layout.
#[derive(Debug, Copy, Clone)]
pub struct RecordFormat {
    record_type: RecordType,
}

impl RecordFormat {
    pub fn new(record_type: RecordType) -> Self {
        Self { record_type }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Record byte size for this variant under the given store header.
    /// Constant for the lifetime of a store generation.
    pub fn record_size(&self, header: &StoreHeader) -> usize {
        match self.record_type {
            RecordType::Node => NODE_RECORD_SIZE,
            RecordType::Relationship => RELATIONSHIP_RECORD_SIZE,
            RecordType::RelationshipGroup => RELATIONSHIP_GROUP_RECORD_SIZE,
            RecordType::Property => PROPERTY_RECORD_SIZE,
            RecordType::RelationshipTypeToken | RecordType::LabelToken => TOKEN_RECORD_SIZE,
            RecordType::PropertyKeyToken => PROPERTY_KEY_TOKEN_RECORD_SIZE,
            RecordType::Dynamic => DYNAMIC_BLOCK_HEADER_SIZE + header.data_block_size() as usize,
        }
    }

    /// Produces an empty, not-in-use record of this variant.
    pub fn new_record(&self, id: u64) -> Record {
        Record {
            id,
            in_use: false,
            secondary_unit_id: None,
            payload: RecordPayload::empty(self.record_type),
        }
    }

    fn requires_secondary_unit(payload: &RecordPayload) -> bool {
        reference_fields(payload).iter().copied().any(ref_needs_high_word)
    }

    /// Allocates a secondary unit for an in-use record whose payload will
    /// not fit in one unit. No-op when the record fits or already has one.
    pub fn prepare(
        &self,
        record: &mut Record,
        _record_size: usize,
        ids: &mut dyn IdSequence,
    ) -> Result<()> {
        if !record.in_use || record.secondary_unit_id.is_some() {
            return Ok(());
        }
        if Self::requires_secondary_unit(&record.payload) {
            record.secondary_unit_id = Some(ids.next()?);
        }
        Ok(())
    }

    /// Peeks at the in-use bit of the slot for `id` without decoding the
    /// rest of the record.
    pub fn slot_in_use<C: PageCursor>(
        &self,
        cursor: &mut C,
        id: u64,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<bool> {
        position(
            cursor,
            page_for_id(id, records_per_page),
            offset_for_id(id, record_size, records_per_page),
        )?;
        Ok(cursor.read_u8() & IN_USE_BIT != 0)
    }

    /// Serializes `record` at the offset derived from its id. Continues in
    /// the secondary unit when one is assigned.
    pub fn write<C: PageCursor>(
        &self,
        record: &Record,
        cursor: &mut C,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<()> {
        if record.record_type() != self.record_type {
            return Err(StoreError::InvalidArgument(format!(
                "cannot write {} record through {} format",
                record.record_type(),
                self.record_type
            )));
        }
        let offset = offset_for_id(record.id, record_size, records_per_page);
        position(cursor, page_for_id(record.id, records_per_page), offset)?;

        if !record.in_use {
            // Zero the whole slot so stale payload bytes cannot leak into
            // forced reads.
            cursor.write_bytes(&vec![0; record_size]);
            return Ok(());
        }

        let secondary = record.secondary_unit_id;
        if secondary.is_none() && Self::requires_secondary_unit(&record.payload) {
            return Err(StoreError::InvalidArgument(format!(
                "{} record {} needs a secondary unit; prepare() was not called",
                self.record_type, record.id
            )));
        }

        let mut flags = IN_USE_BIT;
        if secondary.is_some() {
            flags |= SECONDARY_UNIT_BIT;
        }

        match &record.payload {
            RecordPayload::Node(node) => {
                if node.dense {
                    flags |= VARIANT_FLAG_A;
                }
                cursor.write_u8(flags);
                for reference in reference_fields(&record.payload) {
                    cursor.write_u32(reference as u32);
                }
                cursor.write_u64(secondary.unwrap_or(0));
            }
            RecordPayload::Relationship(rel) => {
                if rel.first_in_start_chain {
                    flags |= VARIANT_FLAG_A;
                }
                if rel.first_in_end_chain {
                    flags |= VARIANT_FLAG_B;
                }
                cursor.write_u8(flags);
                cursor.write_u32(rel.rel_type);
                for reference in reference_fields(&record.payload) {
                    cursor.write_u32(reference as u32);
                }
                cursor.write_u64(secondary.unwrap_or(0));
            }
            RecordPayload::RelationshipGroup(group) => {
                cursor.write_u8(flags);
                cursor.write_u32(group.rel_type);
                for reference in reference_fields(&record.payload) {
                    cursor.write_u32(reference as u32);
                }
                cursor.write_u64(secondary.unwrap_or(0));
            }
            RecordPayload::Property(prop) => {
                cursor.write_u8(flags);
                cursor.write_u32(prop.key);
                let (kind, bits) = encode_value(&prop.value);
                cursor.write_u8(kind);
                cursor.write_u64(bits);
                cursor.write_u64(prop.prev_prop);
                cursor.write_u64(prop.next_prop);
            }
            RecordPayload::RelationshipTypeToken(token) | RecordPayload::LabelToken(token) => {
                cursor.write_u8(flags);
                cursor.write_u32(token.name_id);
            }
            RecordPayload::PropertyKeyToken(token) => {
                cursor.write_u8(flags);
                cursor.write_u32(token.name_id);
                cursor.write_u32(token.property_count);
            }
            RecordPayload::Dynamic(block) => {
                let capacity = record_size - DYNAMIC_BLOCK_HEADER_SIZE;
                if block.data.len() > capacity {
                    return Err(StoreError::InvalidArgument(format!(
                        "dynamic block {} holds {} bytes; capacity is {}",
                        record.id,
                        block.data.len(),
                        capacity
                    )));
                }
                if block.start_block {
                    flags |= VARIANT_FLAG_A;
                }
                cursor.write_u8(flags);
                cursor.write_u32(block.data.len() as u32);
                cursor.write_u64(block.next_block);
                cursor.write_bytes(&block.data);
                if block.data.len() < capacity {
                    cursor.write_bytes(&vec![0; capacity - block.data.len()]);
                }
            }
        }

        if let Some(secondary_id) = secondary {
            let references = reference_fields(&record.payload);
            if references.is_empty() {
                return Err(StoreError::InvalidArgument(format!(
                    "{} records do not support secondary units",
                    self.record_type
                )));
            }
            let secondary_page = page_for_id(secondary_id, records_per_page);
            let secondary_offset = offset_for_id(secondary_id, record_size, records_per_page);
            if secondary_page == cursor.current_page() {
                cursor.set_offset(secondary_offset);
                cursor.write_u8(IN_USE_BIT | RECORD_UNIT_BIT);
                for reference in references {
                    cursor.write_u32((reference >> 32) as u32);
                }
            } else {
                // Both page locks stay held until the cursor is released,
                // so the two units of one write publish together.
                let linked = cursor.open_linked_cursor(secondary_page)?;
                linked.set_offset(secondary_offset);
                linked.write_u8(IN_USE_BIT | RECORD_UNIT_BIT);
                for reference in references {
                    linked.write_u32((reference >> 32) as u32);
                }
            }
        }
        Ok(())
    }

    /// Deserializes the record at the offset derived from `record.id`,
    /// assembling the full payload from the secondary unit when present.
    /// Leaves the cursor positioned on the first byte past the primary
    /// unit.
    pub fn read<C: PageCursor>(
        &self,
        record: &mut Record,
        cursor: &mut C,
        mode: RecordLoad,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<()> {
        let offset = offset_for_id(record.id, record_size, records_per_page);
        let page = page_for_id(record.id, records_per_page);
        position(cursor, page, offset)?;

        let flags = cursor.read_u8();
        let in_use = flags & IN_USE_BIT != 0;
        record.in_use = in_use;
        record.secondary_unit_id = None;
        if !in_use && mode != RecordLoad::Force {
            record.payload = RecordPayload::empty(self.record_type);
            cursor.set_offset(offset + record_size);
            return Ok(());
        }
        if flags & RECORD_UNIT_BIT != 0 && !self.invalid(record, mode, "slot is a continuation unit, not a record")? {
            cursor.set_offset(offset + record_size);
            return Ok(());
        }

        let two_unit = flags & SECONDARY_UNIT_BIT != 0;
        match self.record_type {
            RecordType::Node => {
                let lo = [cursor.read_u32(), cursor.read_u32(), cursor.read_u32()];
                let secondary = cursor.read_u64();
                let refs = self.resolve_references(
                    record, cursor, mode, record_size, records_per_page, offset, two_unit,
                    secondary, &lo,
                )?;
                let Some(refs) = refs else { return Ok(()) };
                record.payload = RecordPayload::Node(NodeRecord {
                    next_rel: refs[0],
                    next_prop: refs[1],
                    labels: refs[2],
                    dense: flags & VARIANT_FLAG_A != 0,
                });
            }
            RecordType::Relationship => {
                let rel_type = cursor.read_u32();
                let mut lo = [0u32; 7];
                for word in &mut lo {
                    *word = cursor.read_u32();
                }
                let secondary = cursor.read_u64();
                let refs = self.resolve_references(
                    record, cursor, mode, record_size, records_per_page, offset, two_unit,
                    secondary, &lo,
                )?;
                let Some(refs) = refs else { return Ok(()) };
                record.payload = RecordPayload::Relationship(RelationshipRecord {
                    first_node: refs[0],
                    second_node: refs[1],
                    rel_type,
                    start_prev: refs[2],
                    start_next: refs[3],
                    end_prev: refs[4],
                    end_next: refs[5],
                    next_prop: refs[6],
                    first_in_start_chain: flags & VARIANT_FLAG_A != 0,
                    first_in_end_chain: flags & VARIANT_FLAG_B != 0,
                });
            }
            RecordType::RelationshipGroup => {
                let rel_type = cursor.read_u32();
                let mut lo = [0u32; 5];
                for word in &mut lo {
                    *word = cursor.read_u32();
                }
                let secondary = cursor.read_u64();
                let refs = self.resolve_references(
                    record, cursor, mode, record_size, records_per_page, offset, two_unit,
                    secondary, &lo,
                )?;
                let Some(refs) = refs else { return Ok(()) };
                record.payload = RecordPayload::RelationshipGroup(RelationshipGroupRecord {
                    rel_type,
                    next: refs[0],
                    first_out: refs[1],
                    first_in: refs[2],
                    first_loop: refs[3],
                    owning_node: refs[4],
                });
            }
            RecordType::Property => {
                let key = cursor.read_u32();
                let kind = cursor.read_u8();
                let bits = cursor.read_u64();
                let prev_prop = cursor.read_u64();
                let next_prop = cursor.read_u64();
                let value = match decode_value(kind, bits) {
                    Some(value) => value,
                    None => {
                        if !self.invalid(record, mode, "unknown property value encoding")? {
                            return Ok(());
                        }
                        PropertyValue::Int(0)
                    }
                };
                record.payload = RecordPayload::Property(PropertyRecord {
                    prev_prop,
                    next_prop,
                    key,
                    value,
                });
            }
            RecordType::RelationshipTypeToken | RecordType::LabelToken => {
                let token = TokenRecord {
                    name_id: cursor.read_u32(),
                };
                record.payload = if self.record_type == RecordType::LabelToken {
                    RecordPayload::LabelToken(token)
                } else {
                    RecordPayload::RelationshipTypeToken(token)
                };
            }
            RecordType::PropertyKeyToken => {
                record.payload = RecordPayload::PropertyKeyToken(PropertyKeyTokenRecord {
                    name_id: cursor.read_u32(),
                    property_count: cursor.read_u32(),
                });
            }
            RecordType::Dynamic => {
                let capacity = record_size - DYNAMIC_BLOCK_HEADER_SIZE;
                let mut length = cursor.read_u32() as usize;
                let next_block = cursor.read_u64();
                if length > capacity {
                    if !self.invalid(record, mode, "dynamic block length exceeds capacity")? {
                        cursor.set_offset(offset + record_size);
                        return Ok(());
                    }
                    length = capacity;
                }
                let mut data = vec![0; length];
                cursor.read_bytes(&mut data);
                record.payload = RecordPayload::Dynamic(DynamicRecord {
                    next_block,
                    start_block: flags & VARIANT_FLAG_A != 0,
                    data,
                });
                cursor.set_offset(offset + record_size);
            }
        }
        Ok(())
    }

    /// Resolves lo-word references, following the secondary unit in
    /// two-unit mode and restoring the cursor to the end of the primary
    /// unit afterwards. `Ok(None)` means the record was cleared by
    /// check-consistency mode.
    #[allow(clippy::too_many_arguments)]
    fn resolve_references<C: PageCursor>(
        &self,
        record: &mut Record,
        cursor: &mut C,
        mode: RecordLoad,
        record_size: usize,
        records_per_page: usize,
        primary_offset: usize,
        two_unit: bool,
        secondary_id: u64,
        lo: &[u32],
    ) -> Result<Option<Vec<u64>>> {
        if !two_unit {
            return Ok(Some(lo.iter().copied().map(decode_single_unit_ref).collect()));
        }
        record.secondary_unit_id = Some(secondary_id);
        let secondary_page = page_for_id(secondary_id, records_per_page);
        let secondary_offset = offset_for_id(secondary_id, record_size, records_per_page);
        // The continuation unit is read through a linked cursor (or a plain
        // offset hop when it shares the page) so the primary page's snapshot
        // stays live for the caller's end-of-read retry check.
        let (unit_flags, hi) = if secondary_page == cursor.current_page() {
            cursor.set_offset(secondary_offset);
            let unit_flags = cursor.read_u8();
            let hi: Vec<u32> = lo.iter().map(|_| cursor.read_u32()).collect();
            (unit_flags, hi)
        } else {
            let linked = cursor.open_linked_cursor(secondary_page)?;
            linked.set_offset(secondary_offset);
            let unit_flags = linked.read_u8();
            let hi: Vec<u32> = lo.iter().map(|_| linked.read_u32()).collect();
            (unit_flags, hi)
        };
        cursor.set_offset(primary_offset + record_size);
        if unit_flags & RECORD_UNIT_BIT == 0
            && !self.invalid(record, mode, "secondary unit is not a continuation slot")?
        {
            return Ok(None);
        }
        let refs = lo
            .iter()
            .zip(hi)
            .map(|(&low, high)| combine_ref(low, high))
            .collect();
        Ok(Some(refs))
    }

    /// Structural-invalidity policy: `Ok(true)` keeps decoding best-effort
    /// (force mode), `Ok(false)` clears the record (consistency checking),
    /// `Err` surfaces the decode failure (normal reads).
    fn invalid(&self, record: &mut Record, mode: RecordLoad, reason: &str) -> Result<bool> {
        match mode {
            RecordLoad::Normal => Err(StoreError::InvalidRecord {
                id: record.id,
                record_type: self.record_type,
                reason: reason.into(),
            }),
            RecordLoad::CheckConsistency => {
                record.in_use = false;
                record.payload = RecordPayload::empty(self.record_type);
                Ok(false)
            }
            RecordLoad::Force => Ok(true),
        }
    }
}

fn encode_value(value: &PropertyValue) -> (u8, u64) {
    match value {
        PropertyValue::Int(i) => (VALUE_KIND_INT, *i as u64),
        PropertyValue::Float(f) => (VALUE_KIND_FLOAT, f.to_bits()),
        PropertyValue::Bool(b) => (VALUE_KIND_BOOL, *b as u64),
        PropertyValue::Reference(r) => (VALUE_KIND_REFERENCE, *r),
    }
}

fn decode_value(kind: u8, bits: u64) -> Option<PropertyValue> {
    match kind {
        VALUE_KIND_INT => Some(PropertyValue::Int(bits as i64)),
        VALUE_KIND_FLOAT => Some(PropertyValue::Float(f64::from_bits(bits))),
        VALUE_KIND_BOOL => match bits {
            0 => Some(PropertyValue::Bool(false)),
            1 => Some(PropertyValue::Bool(true)),
            _ => None,
        },
        VALUE_KIND_REFERENCE => Some(PropertyValue::Reference(bits)),
        _ => None,
    }
}
