//! Schema catalog: table/column/index descriptors, the in-memory catalog
//! snapshot, describe-time validation, and runtime name handles.
//!
//! This module is backend-agnostic: it owns the *description* of a schema
//! and its (de)serialized wire format, but never touches `libmdbx` itself.
//! [`crate::db::Db`] and [`crate::txn`] are what actually persist a
//! [`Catalog`] into the reserved catalog sub-database and open/close DBIs
//! to match it.

use std::collections::BTreeMap;

use crate::{
    comparator::ComparatorSignature,
    constants::SCHEMA_FORMAT,
    error::{Error, Result},
    keycode::{ColumnType, Direction},
};

//---------------------------------------------------------------------------------------------------- IndexDescriptor
/// How a column (or composite) participates in indexing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Exactly one column (or composite) per table may set this.
    pub primary: bool,
    /// Unique (single PK per key) vs. with-dups (sorted multiset of PKs).
    pub unique: bool,
    /// Range-queryable (ordered) vs. equality-only (hashed/unordered).
    pub ordered: bool,
    /// Meaningless when `!ordered`; describe-time validation rejects a
    /// non-[`Direction::Obverse`] direction on an unordered index.
    pub direction: Direction,
    pub nullable: bool,
    /// `Some` for a composite (virtual) column: the component column slots,
    /// in declared order. `None` for a plain scalar-column index.
    pub composite_components: Option<Vec<u16>>,
    /// Only meaningful when `composite_components.is_some()`.
    pub tersely: bool,
}

impl IndexDescriptor {
    /// The [`ComparatorSignature`] this index's sub-database must be
    /// opened under.
    #[must_use]
    pub fn comparator_signature(&self) -> ComparatorSignature {
        ComparatorSignature { ordered: self.ordered, direction: self.direction, with_dups: !self.unique }
    }
}

//---------------------------------------------------------------------------------------------------- ColumnDescriptor
/// One column of a table, in creation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Stable, zero-based, never reused.
    pub slot: u16,
    pub column_type: ColumnType,
    pub index: Option<IndexDescriptor>,
}

//---------------------------------------------------------------------------------------------------- TableDescriptor
/// A table's full persisted shape: its columns and a content fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    /// Deterministic per-table identifier, derived from the name at
    /// creation time; never recomputed afterwards.
    pub table_id: u32,
    pub columns: Vec<ColumnDescriptor>,
    /// Content hash of `(slot, column_type, index flags)*`, stable across
    /// renames/reorders that don't otherwise touch column shape (in
    /// practice: never, since this crate never renames or reorders
    /// existing columns in place — the fingerprint exists so a future
    /// migration tool can detect a genuine shape change vs. a cosmetic
    /// one).
    pub fingerprint: u64,
    /// Persisted, monotonically increasing per-table counter; see
    /// [`TableDescriptor::sequence`].
    pub sequence: u64,
}

impl TableDescriptor {
    /// The column declared as this table's primary key (scalar or
    /// composite).
    #[must_use]
    pub fn primary_column(&self) -> &ColumnDescriptor {
        self.columns
            .iter()
            .find(|c| matches!(&c.index, Some(i) if i.primary))
            .expect("validated at create_table: exactly one primary column")
    }

    /// Every secondary (non-primary) indexed column.
    pub fn secondary_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| matches!(&c.index, Some(i) if !i.primary))
    }

    /// Look up a column by slot.
    #[must_use]
    pub fn column_by_slot(&self, slot: u16) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.slot == slot)
    }

    /// Look up a column by case-insensitive name.
    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The opaque sub-database token for a given index's column slot.
    #[must_use]
    pub fn subdb_name(&self, slot: u16) -> String {
        format!("{:08x}{:04x}", self.table_id, slot)
    }

    //---------------------------------------------------------------------------------- Wire format
    /// Serialize into the catalog record format: leading `schema_format`
    /// (`u32` LE, per `SPEC_FULL.md` 6), then table id, fingerprint,
    /// sequence, name, and columns, all little-endian per the on-disk
    /// layout the spec requires for the catalog sub-database.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SCHEMA_FORMAT.to_le_bytes());
        out.extend_from_slice(&self.table_id.to_le_bytes());
        out.extend_from_slice(&self.fingerprint.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        write_str(&mut out, &self.name);
        out.extend_from_slice(&(self.columns.len() as u16).to_le_bytes());
        for column in &self.columns {
            write_column(&mut out, column);
        }
        out
    }

    /// Deserialize a catalog record previously produced by
    /// [`TableDescriptor::to_bytes`].
    ///
    /// # Errors
    /// [`Error::Eoops`] if the record is truncated, malformed, or carries
    /// an unrecognized `schema_format`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let schema_format = read_u32(&mut cursor)?;
        if schema_format != SCHEMA_FORMAT {
            return Err(Error::Eoops);
        }
        let table_id = read_u32(&mut cursor)?;
        let fingerprint = read_u64(&mut cursor)?;
        let sequence = read_u64(&mut cursor)?;
        let name = read_str(&mut cursor)?;
        let column_count = read_u16(&mut cursor)?;
        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            columns.push(read_column(&mut cursor)?);
        }
        Ok(Self { name, table_id, columns, fingerprint, sequence })
    }
}

//---------------------------------------------------------------------------------------------------- wire helpers
fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn read_str(cursor: &mut &[u8]) -> Result<String> {
    let len = read_u16(cursor)? as usize;
    let bytes = take(cursor, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Eoops)
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(Error::Eoops);
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

fn read_u16(cursor: &mut &[u8]) -> Result<u16> {
    Ok(u16::from_le_bytes(take(cursor, 2)?.try_into().unwrap()))
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_le_bytes(take(cursor, 4)?.try_into().unwrap()))
}

fn read_u64(cursor: &mut &[u8]) -> Result<u64> {
    Ok(u64::from_le_bytes(take(cursor, 8)?.try_into().unwrap()))
}

fn column_type_tag(t: ColumnType) -> u8 {
    match t {
        ColumnType::U16 => 0,
        ColumnType::U32 => 1,
        ColumnType::U64 => 2,
        ColumnType::I32 => 3,
        ColumnType::I64 => 4,
        ColumnType::F32 => 5,
        ColumnType::F64 => 6,
        ColumnType::DateTime => 7,
        ColumnType::Bin96 => 8,
        ColumnType::Bin128 => 9,
        ColumnType::Bin160 => 10,
        ColumnType::Bin256 => 11,
        ColumnType::BinVar => 12,
        ColumnType::CstrVar => 13,
        ColumnType::Composite => 14,
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
        14 => ColumnType::Composite,
        _ => return Err(Error::Eoops),
    })
}

/// Index flag bits: primary(0) unique(1) ordered(2) reverse(3) nullable(4)
/// tersely(5) has_index(6).
fn index_flags(index: &Option<IndexDescriptor>) -> u8 {
    let Some(i) = index else { return 0 };
    let mut flags = 0b0100_0000_u8;
    if i.primary {
        flags |= 0b0000_0001;
    }
    if i.unique {
        flags |= 0b0000_0010;
    }
    if i.ordered {
        flags |= 0b0000_0100;
    }
    if i.direction == Direction::Reverse {
        flags |= 0b0000_1000;
    }
    if i.nullable {
        flags |= 0b0001_0000;
    }
    if i.tersely {
        flags |= 0b0010_0000;
    }
    flags
}

fn write_column(out: &mut Vec<u8>, column: &ColumnDescriptor) {
    out.extend_from_slice(&column.slot.to_le_bytes());
    write_str(out, &column.name);
    out.push(column_type_tag(column.column_type));
    out.push(index_flags(&column.index));
    match &column.index {
        Some(i) => match &i.composite_components {
            Some(components) => {
                out.push(components.len() as u8);
                for slot in components {
                    out.extend_from_slice(&slot.to_le_bytes());
                }
            }
            None => out.push(0),
        },
        None => out.push(0),
    }
}

fn read_column(cursor: &mut &[u8]) -> Result<ColumnDescriptor> {
    let slot = read_u16(cursor)?;
    let name = read_str(cursor)?;
    let column_type = tag_to_column_type(take(cursor, 1)?[0])?;
    let flags = take(cursor, 1)?[0];
    let component_count = take(cursor, 1)?[0];
    let mut components = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        components.push(read_u16(cursor)?);
    }

    let index = if flags & 0b0100_0000 != 0 {
        Some(IndexDescriptor {
            primary: flags & 0b0000_0001 != 0,
            unique: flags & 0b0000_0010 != 0,
            ordered: flags & 0b0000_0100 != 0,
            direction: if flags & 0b0000_1000 != 0 { Direction::Reverse } else { Direction::Obverse },
            nullable: flags & 0b0001_0000 != 0,
            composite_components: if component_count > 0 { Some(components) } else { None },
            tersely: flags & 0b0010_0000 != 0,
        })
    } else {
        None
    };

    Ok(ColumnDescriptor { name, slot, column_type, index })
}

//---------------------------------------------------------------------------------------------------- fingerprint / table id
/// A type is "reverse-sensitive": under this crate's NULL-encoding scheme
/// (see `SPEC_FULL.md` 4.A), its nullable encoding genuinely inverts under
/// [`Direction::Reverse`]. Variable-length types don't: an absent value
/// encodes as zero bytes, which sort first under `memcmp` regardless of
/// any bitwise complement applied to them.
#[must_use]
pub fn is_reverse_sensitive(column_type: ColumnType) -> bool {
    !matches!(column_type, ColumnType::BinVar | ColumnType::CstrVar | ColumnType::Composite)
}

/// Deterministic per-table id, derived from the table name so it's stable
/// across process restarts without needing its own persisted counter.
#[must_use]
pub fn table_id_of(name: &str) -> u32 {
    let lower = name.to_ascii_lowercase();
    (cityhash_rs::cityhash_64(lower.as_bytes()) & 0xFFFF_FFFF) as u32
}

/// Content hash of a table's column shape: every column's slot, type, and
/// index flags, in slot order.
#[must_use]
pub fn fingerprint_of(columns: &[ColumnDescriptor]) -> u64 {
    let mut buf = Vec::new();
    let mut sorted: Vec<&ColumnDescriptor> = columns.iter().collect();
    sorted.sort_by_key(|c| c.slot);
    for column in sorted {
        buf.extend_from_slice(&column.slot.to_le_bytes());
        buf.push(column_type_tag(column.column_type));
        buf.push(index_flags(&column.index));
    }
    cityhash_rs::cityhash_64(&buf)
}

//---------------------------------------------------------------------------------------------------- validation
/// Name validity: non-empty, ASCII, no embedded whitespace, no `#`/`/`/`$`,
/// no leading digit, bounded length.
pub const MAX_NAME_LEN: usize = 64;

/// Validate a table or column name per `SPEC_FULL.md` 4.E.
///
/// # Errors
/// [`Error::NameInvalid`] if any rule is violated.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::NameInvalid);
    }
    if !name.is_ascii() {
        return Err(Error::NameInvalid);
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(Error::NameInvalid);
    }
    if name.chars().any(|c| c.is_whitespace() || matches!(c, '#' | '/' | '$')) {
        return Err(Error::NameInvalid);
    }
    Ok(())
}

/// Describe-time validation of a proposed table shape, run inside
/// `create_table` before any DBI is opened or catalog record written.
///
/// # Errors
/// - [`Error::NameInvalid`] on a bad table/column name.
/// - [`Error::TypeInvalid`] if a composite column's type isn't
///   [`ColumnType::Composite`], or its declared components don't exist /
///   don't number >= 2.
/// - [`Error::FlagInvalid`] on any of the index-flag rules in
///   `SPEC_FULL.md` 4.E (exactly one PK, unordered-with-direction,
///   nullable+reverse on a non-reverse-sensitive type).
/// - [`Error::SimilarIndex`] if a composite secondary is a strictly
///   redundant prefix of an existing simple index with compatible
///   direction and uniqueness.
pub fn validate_table(name: &str, columns: &[ColumnDescriptor]) -> Result<()> {
    validate_name(name)?;

    let mut primary_count = 0;
    for column in columns {
        validate_name(&column.name)?;

        let Some(index) = &column.index else { continue };

        if index.primary {
            primary_count += 1;
        }

        if !index.ordered && index.direction == Direction::Reverse {
            return Err(Error::FlagInvalid);
        }

        if index.nullable
            && index.direction == Direction::Reverse
            && !is_reverse_sensitive(column.column_type)
        {
            return Err(Error::FlagInvalid);
        }

        match &index.composite_components {
            Some(components) => {
                if column.column_type != ColumnType::Composite || components.len() < 2 {
                    return Err(Error::TypeInvalid);
                }
                for slot in components {
                    if columns.iter().all(|c| c.slot != *slot) {
                        return Err(Error::TypeInvalid);
                    }
                }
            }
            None if column.column_type == ColumnType::Composite => return Err(Error::TypeInvalid),
            None => {}
        }
    }

    if primary_count != 1 {
        return Err(Error::FlagInvalid);
    }

    check_similar_index(columns)?;

    Ok(())
}

/// Reject a composite secondary that is a strictly redundant prefix of an
/// existing simple index over the same leading column with compatible
/// direction and uniqueness.
fn check_similar_index(columns: &[ColumnDescriptor]) -> Result<()> {
    for column in columns {
        let Some(index) = &column.index else { continue };
        let Some(components) = &index.composite_components else { continue };
        let Some(&first_slot) = components.first() else { continue };

        for other in columns {
            if other.slot == column.slot {
                continue;
            }
            let Some(other_index) = &other.index else { continue };
            if other_index.composite_components.is_some() {
                continue;
            }
            if other.slot == first_slot
                && other_index.direction == index.direction
                && other_index.unique == index.unique
            {
                return Err(Error::SimilarIndex);
            }
        }
    }
    Ok(())
}

//---------------------------------------------------------------------------------------------------- Catalog
/// The full set of live table descriptors, plus the schema epoch counter.
///
/// Cheaply cloned (an `Arc` swap at the [`crate::db::Db`] layer is what
/// readers actually observe); kept as a plain owned value here since the
/// backend-integration layer decides how it's shared across threads.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableDescriptor>,
    /// Incremented on every committed schema transaction.
    pub version: u64,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a table by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    /// Every live table descriptor.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    /// Validate and register a new table, bumping the schema epoch.
    ///
    /// # Errors
    /// Propagates [`validate_table`]'s errors; [`Error::KeyExists`] if a
    /// table with this name (case-insensitively) already exists.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnDescriptor>) -> Result<&TableDescriptor> {
        let key = name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            return Err(Error::KeyExists);
        }

        validate_table(name, &columns)?;

        let descriptor = TableDescriptor {
            name: name.to_owned(),
            table_id: table_id_of(name),
            fingerprint: fingerprint_of(&columns),
            sequence: 0,
            columns,
        };

        self.tables.insert(key.clone(), descriptor);
        self.version += 1;
        Ok(self.tables.get(&key).expect("just inserted"))
    }

    /// Register an already-validated descriptor loaded back from the
    /// catalog sub-database at environment open time, bypassing
    /// [`validate_table`] (a persisted record was valid when written) and
    /// without bumping [`Catalog::version`] (no transaction is in
    /// progress yet).
    pub fn load_table(&mut self, descriptor: TableDescriptor) {
        let key = descriptor.name.to_ascii_lowercase();
        self.tables.insert(key, descriptor);
    }

    /// Remove a table, bumping the schema epoch.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no such table exists.
    pub fn drop_table(&mut self, name: &str) -> Result<TableDescriptor> {
        let key = name.to_ascii_lowercase();
        let descriptor = self.tables.remove(&key).ok_or(Error::NotFound)?;
        self.version += 1;
        Ok(descriptor)
    }

    /// Reserve the next `n` values of `table`'s sequence counter, updating
    /// the catalog in place and returning the first reserved value.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no such table exists.
    pub fn sequence(&mut self, name: &str, n: u64) -> Result<u64> {
        let key = name.to_ascii_lowercase();
        let descriptor = self.tables.get_mut(&key).ok_or(Error::NotFound)?;
        let first = descriptor.sequence;
        descriptor.sequence = descriptor.sequence.wrapping_add(n);
        Ok(first)
    }
}

//---------------------------------------------------------------------------------------------------- NameHandle
/// A symbolic binding to a table, resolved against a [`Catalog`] snapshot
/// and tagged with the schema epoch it was resolved in.
///
/// Per `SPEC_FULL.md` 3, this is inert until [`NameHandle::refresh`]; once
/// resolved it must be re-validated (re-[`refresh`](NameHandle::refresh)ed)
/// against the epoch of whatever [`Catalog`] it's later used with.
#[derive(Clone, Debug)]
pub struct NameHandle {
    name: String,
    resolved: Option<ResolvedHandle>,
}

#[derive(Clone, Debug)]
struct ResolvedHandle {
    table_id: u32,
    schema_version: u64,
}

impl NameHandle {
    /// An inert handle bound to `name` but not yet resolved.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), resolved: None }
    }

    /// Resolve (or re-resolve) this handle against `catalog`, recording the
    /// schema epoch observed.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no table with this name exists in `catalog`.
    pub fn refresh(&mut self, catalog: &Catalog) -> Result<()> {
        let descriptor = catalog.get(&self.name).ok_or(Error::NotFound)?;
        self.resolved =
            Some(ResolvedHandle { table_id: descriptor.table_id, schema_version: catalog.version });
        Ok(())
    }

    /// The resolved table descriptor, validating that `catalog`'s current
    /// epoch still matches the one observed at the last
    /// [`refresh`](NameHandle::refresh).
    ///
    /// # Errors
    /// - [`Error::Cursor`] if never refreshed.
    /// - [`Error::SchemaChanged`] if `catalog`'s epoch has advanced since
    ///   the last refresh.
    /// - [`Error::NotFound`] if the table has since been dropped (can only
    ///   happen if the caller ignored a `SchemaChanged` and kept using a
    ///   table-id no catalog entry still carries).
    pub fn resolve<'c>(&self, catalog: &'c Catalog) -> Result<&'c TableDescriptor> {
        let resolved = self.resolved.as_ref().ok_or(Error::Cursor)?;
        if resolved.schema_version != catalog.version {
            return Err(Error::SchemaChanged);
        }
        catalog.tables.values().find(|t| t.table_id == resolved.table_id).ok_or(Error::NotFound)
    }
}
