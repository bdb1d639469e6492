//! Tuple accessor; concrete `RowBuilder`/`Row` over a flat slot-addressable
//! buffer.
//!
//! The spec treats the row container as an external collaborator
//! ("component C"), consumed only through `get_column`/`upsert_column`. No
//! such library is assumed to exist here, so this module implements it
//! directly: a row is a sparse `slot -> value` map, serialized to bytes in
//! [`Row::to_bytes`] for storage as a PK sub-database value.
//!
//! This is distinct from [`crate::keycode`]: that module produces
//! `memcmp`-orderable *key* bytes; this one produces a plain (de)serialized
//! *payload*, with no ordering properties required of it.

use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    keycode::{ColumnType, Value},
};

//---------------------------------------------------------------------------------------------------- RowBuilder
/// Accumulates `(slot, value)` pairs before they are [`finalize`](RowBuilder::finalize)d
/// into an immutable [`Row`].
#[derive(Clone, Debug, Default)]
pub struct RowBuilder {
    values: BTreeMap<u16, Value>,
}

impl RowBuilder {
    /// A builder with no columns set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `slot`'s value, overwriting any prior value at that slot.
    ///
    /// # Errors
    /// This builder never validates against a schema (it doesn't have one);
    /// callers that need `TypeMismatch`/`OutOfDomain` checking against a
    /// declared column type should validate with [`crate::keycode::encode`]
    /// before calling this, as [`crate::ops`] does.
    pub fn upsert_column(&mut self, slot: u16, value: Value) -> Result<()> {
        self.values.insert(slot, value);
        Ok(())
    }

    /// Consume the builder, producing an immutable [`Row`].
    #[must_use]
    pub fn finalize(self) -> Row {
        Row { values: self.values }
    }
}

//---------------------------------------------------------------------------------------------------- Row
/// An immutable, slot-addressable row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<u16, Value>,
}

impl Row {
    /// An empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value at `slot`, or `None` if absent.
    #[must_use]
    pub fn get_column(&self, slot: u16) -> Option<&Value> {
        self.values.get(&slot)
    }

    /// Iterate over every present `(slot, value)` pair, in ascending slot
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Value)> {
        self.values.iter().map(|(slot, value)| (*slot, value))
    }

    /// Whether `slot` is present in this row.
    #[must_use]
    pub fn contains(&self, slot: u16) -> bool {
        self.values.contains_key(&slot)
    }

    /// Serialize into the byte representation stored as a PK sub-database
    /// value: a sequence of `(slot: u16 BE, tag: u8, payload)` records, with
    /// variable-length payloads length-prefixed (`u32` BE).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (slot, value) in &self.values {
            out.extend_from_slice(&slot.to_be_bytes());
            out.push(tag_of(value));
            write_payload(&mut out, value);
        }
        out
    }

    /// Deserialize a row previously produced by [`Row::to_bytes`].
    ///
    /// # Errors
    /// [`Error::TypeMismatch`] if `bytes` is truncated or carries an
    /// unrecognized type tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut values = BTreeMap::new();
        let mut cursor = bytes;

        while !cursor.is_empty() {
            let slot = read_u16(&mut cursor)?;
            let tag = read_u8(&mut cursor)?;
            let value = read_payload(tag, &mut cursor)?;
            values.insert(slot, value);
        }

        Ok(Self { values })
    }
}

//---------------------------------------------------------------------------------------------------- wire format
fn tag_of(value: &Value) -> u8 {
    match value {
        Value::U16(_) => 0,
        Value::U32(_) => 1,
        Value::U64(_) => 2,
        Value::I32(_) => 3,
        Value::I64(_) => 4,
        Value::F32(_) => 5,
        Value::F64(_) => 6,
        Value::DateTime(_) => 7,
        Value::Bin96(_) => 8,
        Value::Bin128(_) => 9,
        Value::Bin160(_) => 10,
        Value::Bin256(_) => 11,
        Value::BinVar(_) => 12,
        Value::CstrVar(_) => 13,
    }
}

fn tag_to_column_type(tag: u8) -> Result<ColumnType> {
    Ok(match tag {
        0 => ColumnType::U16,
        1 => ColumnType::U32,
        2 => ColumnType::U64,
        3 => ColumnType::I32,
        4 => ColumnType::I64,
        5 => ColumnType::F32,
        6 => ColumnType::F64,
        7 => ColumnType::DateTime,
        8 => ColumnType::Bin96,
        9 => ColumnType::Bin128,
        10 => ColumnType::Bin160,
        11 => ColumnType::Bin256,
        12 => ColumnType::BinVar,
        13 => ColumnType::CstrVar,
        _ => return Err(Error::TypeMismatch),
    })
}

fn write_payload(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::F32(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        Value::F64(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        Value::DateTime(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Bin96(b) => out.extend_from_slice(b),
        Value::Bin128(b) => out.extend_from_slice(b),
        Value::Bin160(b) => out.extend_from_slice(b),
        Value::Bin256(b) => out.extend_from_slice(b),
        Value::BinVar(b) | Value::CstrVar(b) => {
            out.extend_from_slice(&(b.len() as u32).to_be_bytes());
            out.extend_from_slice(b);
        }
    }
}

fn read_u8(cursor: &mut &[u8]) -> Result<u8> {
    let (first, rest) = cursor.split_first().ok_or(Error::TypeMismatch)?;
    *cursor = rest;
    Ok(*first)
}

fn read_u16(cursor: &mut &[u8]) -> Result<u16> {
    let bytes = take(cursor, 2)?;
    Ok(u16::from_be_bytes(bytes.try_into().unwrap()))
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32> {
    let bytes = take(cursor, 4)?;
    Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(Error::TypeMismatch);
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

fn read_payload(tag: u8, cursor: &mut &[u8]) -> Result<Value> {
    let column_type = tag_to_column_type(tag)?;
    Ok(match column_type {
        ColumnType::U16 => Value::U16(u16::from_be_bytes(take(cursor, 2)?.try_into().unwrap())),
        ColumnType::U32 => Value::U32(u32::from_be_bytes(take(cursor, 4)?.try_into().unwrap())),
        ColumnType::U64 => Value::U64(u64::from_be_bytes(take(cursor, 8)?.try_into().unwrap())),
        ColumnType::I32 => Value::I32(i32::from_be_bytes(take(cursor, 4)?.try_into().unwrap())),
        ColumnType::I64 => Value::I64(i64::from_be_bytes(take(cursor, 8)?.try_into().unwrap())),
        ColumnType::F32 => {
            Value::F32(f32::from_bits(u32::from_be_bytes(take(cursor, 4)?.try_into().unwrap())))
        }
        ColumnType::F64 => {
            Value::F64(f64::from_bits(u64::from_be_bytes(take(cursor, 8)?.try_into().unwrap())))
        }
        ColumnType::DateTime => {
            Value::DateTime(u64::from_be_bytes(take(cursor, 8)?.try_into().unwrap()))
        }
        ColumnType::Bin96 => Value::Bin96(take(cursor, 12)?.try_into().unwrap()),
        ColumnType::Bin128 => Value::Bin128(take(cursor, 16)?.try_into().unwrap()),
        ColumnType::Bin160 => Value::Bin160(take(cursor, 20)?.try_into().unwrap()),
        ColumnType::Bin256 => Value::Bin256(take(cursor, 32)?.try_into().unwrap()),
        ColumnType::BinVar => {
            let len = read_u32(cursor)? as usize;
            Value::BinVar(take(cursor, len)?.to_vec())
        }
        ColumnType::CstrVar => {
            let len = read_u32(cursor)? as usize;
            Value::CstrVar(take(cursor, len)?.to_vec())
        }
        ColumnType::Composite => return Err(Error::TypeMismatch),
    })
}
