//! Array layout rules: capacity padding and run-length-compacted nulls.

use std::sync::Arc;

use nrbf_types::BinaryArrayType;

use crate::record::{BinaryArray, BinaryTypeInfo, MemberValue, Record};

/// Smallest capacity a written array declares.
pub const MIN_CAPACITY: usize = 4;

/// Declared length for `len` real elements: `max(4, next_pow2(len))`.
pub fn padded_length(len: usize) -> usize {
    len.next_power_of_two().max(MIN_CAPACITY)
}

/// The single record standing for `count` consecutive nulls.
///
/// One null is `ObjectNull`; runs up to 255 use the one-byte count; longer
/// runs use the four-byte count.
pub fn null_run(count: usize) -> Option<Record> {
    match count {
        0 => None,
        1 => Some(Record::ObjectNull),
        2..=255 => Some(Record::NullMultiple256 {
            null_count: count as u8,
        }),
        // 256 no longer fits the one-byte count
        _ => Some(Record::NullMultiple {
            null_count: i32::try_from(count).unwrap_or(i32::MAX),
        }),
    }
}

/// Lay out `items` over `capacity` slots, merging each run of absent items
/// (and the trailing padding) into one null record.
pub fn compact_members<I>(items: I, capacity: usize) -> Vec<MemberValue>
where
    I: IntoIterator<Item = Option<MemberValue>>,
{
    let mut members = Vec::new();
    let mut pending_nulls = 0usize;
    let mut used = 0usize;
    for item in items {
        used += 1;
        match item {
            Some(member) => {
                flush_nulls(&mut members, &mut pending_nulls);
                members.push(member);
            }
            None => pending_nulls += 1,
        }
    }
    pending_nulls += capacity.saturating_sub(used);
    flush_nulls(&mut members, &mut pending_nulls);
    members
}

fn flush_nulls(members: &mut Vec<MemberValue>, pending: &mut usize) {
    if let Some(record) = null_run(*pending) {
        members.push(MemberValue::Record(Arc::new(record)));
    }
    *pending = 0;
}

/// Expand members into slots, turning each null run into that many `None`s.
pub fn expand_slots(members: &[MemberValue]) -> Vec<Option<&MemberValue>> {
    let mut slots = Vec::with_capacity(members.len());
    for member in members {
        match member.as_record().and_then(|node| node.null_count()) {
            Some(n) => slots.extend(std::iter::repeat(None).take(n)),
            None => slots.push(Some(member)),
        }
    }
    slots
}

/// Total slots consumed by `members`, counting null runs at their full span.
pub fn filled_slots(members: &[MemberValue]) -> usize {
    members.iter().map(MemberValue::span).sum()
}

impl BinaryArray {
    /// Single-rank array as the writer produces it: padded capacity with
    /// compacted null runs.
    pub fn single(
        object_id: i32,
        element_type: BinaryTypeInfo,
        items: Vec<Option<MemberValue>>,
    ) -> Self {
        let capacity = padded_length(items.len());
        let members = compact_members(items, capacity);
        Self {
            object_id,
            array_type: BinaryArrayType::Single,
            lengths: vec![i32::try_from(capacity).unwrap_or(i32::MAX)],
            lower_bounds: None,
            element_type,
            members,
        }
    }

    /// Element slots in order, null runs expanded.
    pub fn slots(&self) -> Vec<Option<&MemberValue>> {
        expand_slots(&self.members)
    }
}
