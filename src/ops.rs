//! Row operations: insert/upsert/update/delete, and the secondary-index
//! diff algorithm that keeps a row's sub-databases in sync with its
//! primary payload.
//!
//! This module computes *what to write*, not *how*: it produces a flat
//! plan of [`IndexOp`]s against sub-database names, with no dependency on
//! `libmdbx` itself. [`crate::txn`]/[`crate::db`] are what actually walk a
//! plan and issue `put`/`del` calls inside a write transaction, checking
//! uniqueness as they go (a violation there cancels the transaction, per
//! `SPEC_FULL.md` 4.F/4.H — this module has no transaction to cancel, so
//! it only ever reports the row-shape errors it can detect locally).

use crate::{
    composite::{self, CompositeComponent, CompositeDescriptor},
    error::{Error, Result},
    keycode,
    row::Row,
    schema::{ColumnDescriptor, TableDescriptor},
};

//---------------------------------------------------------------------------------------------------- IndexOp
/// One sub-database write, part of a row mutation's full plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexOp {
    /// Write `key -> value` into `subdb`, overwriting any prior value at
    /// `key` (or adding a dup entry, for a `with_dups` secondary).
    Put { subdb: String, key: Vec<u8>, value: Vec<u8> },
    /// Remove the exact `key -> value` pair from `subdb`.
    Delete { subdb: String, key: Vec<u8>, value: Vec<u8> },
}

//---------------------------------------------------------------------------------------------------- key derivation
fn composite_descriptor_for(
    table: &TableDescriptor,
    slots: &[u16],
    ordered: bool,
    direction: keycode::Direction,
    tersely: bool,
) -> Result<CompositeDescriptor> {
    let mut components = Vec::with_capacity(slots.len());
    for slot in slots {
        let column = table.column_by_slot(*slot).ok_or(Error::TypeInvalid)?;
        let nullable = column.index.as_ref().is_some_and(|i| i.nullable);
        components.push(CompositeComponent { column_type: column.column_type, nullable });
    }
    Ok(CompositeDescriptor { components, ordered, direction, tersely })
}

/// Derive the key an indexed column (scalar or composite) takes for `row`.
///
/// # Errors
/// Propagates [`keycode::encode`]/[`composite::compose`]'s errors, or
/// [`Error::TypeInvalid`] if `column` carries no index descriptor.
pub fn index_key(table: &TableDescriptor, column: &ColumnDescriptor, row: &Row) -> Result<Vec<u8>> {
    let index = column.index.as_ref().ok_or(Error::TypeInvalid)?;

    match &index.composite_components {
        Some(slots) => {
            let descriptor =
                composite_descriptor_for(table, slots, index.ordered, index.direction, index.tersely)?;
            let values: Vec<Option<&crate::keycode::Value>> =
                slots.iter().map(|slot| row.get_column(*slot)).collect();
            composite::compose(&descriptor, &values)
        }
        None => keycode::encode(column.column_type, index.direction, index.nullable, row.get_column(column.slot)),
    }
}

/// Every non-nullable, non-composite column must be present in `row` for
/// it to be storable; composite (virtual) columns are derived, never
/// required directly.
///
/// # Errors
/// [`Error::ColumnMissing`] on the first uncovered non-nullable column
/// found, in slot order.
pub fn validate_row_coverage(table: &TableDescriptor, row: &Row) -> Result<()> {
    for column in &table.columns {
        if column.column_type == crate::keycode::ColumnType::Composite {
            continue;
        }
        let nullable = column.index.as_ref().is_some_and(|i| i.nullable);
        if !nullable && !row.contains(column.slot) {
            return Err(Error::ColumnMissing);
        }
    }
    Ok(())
}

//---------------------------------------------------------------------------------------------------- plan builders
fn secondary_columns(table: &TableDescriptor) -> impl Iterator<Item = &ColumnDescriptor> {
    table.secondary_columns()
}

/// The full write plan for inserting `row` as a brand-new primary entry:
/// the primary sub-database put plus one put per secondary index.
///
/// # Errors
/// [`Error::ColumnMissing`] if `row` doesn't cover every non-nullable
/// column; propagates key-derivation errors from any indexed column.
pub fn insert_ops(table: &TableDescriptor, row: &Row) -> Result<Vec<IndexOp>> {
    validate_row_coverage(table, row)?;

    let pk = table.primary_column();
    let pk_bytes = index_key(table, pk, row)?;

    let mut ops = vec![IndexOp::Put {
        subdb: table.subdb_name(pk.slot),
        key: pk_bytes.clone(),
        value: row.to_bytes(),
    }];

    for column in secondary_columns(table) {
        let key = index_key(table, column, row)?;
        ops.push(IndexOp::Put { subdb: table.subdb_name(column.slot), key, value: pk_bytes.clone() });
    }

    Ok(ops)
}

/// The full write plan for removing `row`'s current primary entry: the
/// primary sub-database delete plus one delete per secondary index, each
/// keyed exactly as [`insert_ops`] would have written it.
///
/// # Errors
/// Same as [`insert_ops`].
pub fn delete_ops(table: &TableDescriptor, row: &Row) -> Result<Vec<IndexOp>> {
    validate_row_coverage(table, row)?;

    let pk = table.primary_column();
    let pk_bytes = index_key(table, pk, row)?;

    let mut ops = vec![IndexOp::Delete {
        subdb: table.subdb_name(pk.slot),
        key: pk_bytes.clone(),
        value: row.to_bytes(),
    }];

    for column in secondary_columns(table) {
        let key = index_key(table, column, row)?;
        ops.push(IndexOp::Delete { subdb: table.subdb_name(column.slot), key, value: pk_bytes.clone() });
    }

    Ok(ops)
}

/// The diff plan for replacing `old` with `new`, both already-stored rows
/// sharing the same primary key (a plain `update` never relocates a row's
/// primary entry — use [`delete_ops`] + [`insert_ops`] for that). Only
/// secondary indexes whose derived key actually changed are touched.
///
/// # Errors
/// - [`Error::KeyMismatch`] if `old` and `new` derive different primary
///   keys.
/// - Otherwise as [`insert_ops`].
pub fn update_ops(table: &TableDescriptor, old: &Row, new: &Row) -> Result<Vec<IndexOp>> {
    validate_row_coverage(table, new)?;

    let pk = table.primary_column();
    let old_pk = index_key(table, pk, old)?;
    let new_pk = index_key(table, pk, new)?;
    if old_pk != new_pk {
        return Err(Error::KeyMismatch);
    }

    let mut ops = vec![IndexOp::Put { subdb: table.subdb_name(pk.slot), key: new_pk.clone(), value: new.to_bytes() }];

    for column in secondary_columns(table) {
        let old_key = index_key(table, column, old)?;
        let new_key = index_key(table, column, new)?;
        if old_key == new_key {
            continue;
        }
        ops.push(IndexOp::Delete { subdb: table.subdb_name(column.slot), key: old_key, value: old_pk.clone() });
        ops.push(IndexOp::Put { subdb: table.subdb_name(column.slot), key: new_key, value: new_pk.clone() });
    }

    Ok(ops)
}

/// `upsert`: [`insert_ops`] if no row with `new`'s primary key currently
/// exists, otherwise [`update_ops`] against `existing`. Callers resolve
/// "does it exist" against the backend (this module has no storage
/// handle), passing the prior row in if one was found.
///
/// # Errors
/// Same as [`insert_ops`]/[`update_ops`].
pub fn upsert_ops(table: &TableDescriptor, existing: Option<&Row>, new: &Row) -> Result<Vec<IndexOp>> {
    match existing {
        Some(old) => update_ops(table, old, new),
        None => insert_ops(table, new),
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        keycode::{ColumnType, Direction, Value},
        row::RowBuilder,
        schema::{Catalog, IndexDescriptor},
    };

    fn table_with_secondary() -> TableDescriptor {
        let mut catalog = Catalog::new();
        let columns = vec![
            ColumnDescriptor {
                name: "pk".into(),
                slot: 0,
                column_type: ColumnType::CstrVar,
                index: Some(IndexDescriptor {
                    primary: true,
                    unique: true,
                    ordered: true,
                    direction: Direction::Obverse,
                    nullable: false,
                    composite_components: None,
                    tersely: false,
                }),
            },
            ColumnDescriptor {
                name: "amount".into(),
                slot: 1,
                column_type: ColumnType::U64,
                index: Some(IndexDescriptor {
                    primary: false,
                    unique: false,
                    ordered: true,
                    direction: Direction::Obverse,
                    nullable: false,
                    composite_components: None,
                    tersely: false,
                }),
            },
        ];
        catalog.create_table("orders", columns).unwrap().clone()
    }

    fn row(pk: &str, amount: u64) -> Row {
        let mut builder = RowBuilder::new();
        builder.upsert_column(0, Value::CstrVar(pk.as_bytes().to_vec())).unwrap();
        builder.upsert_column(1, Value::U64(amount)).unwrap();
        builder.finalize()
    }

    #[test]
    fn insert_produces_primary_and_secondary_puts() {
        let table = table_with_secondary();
        let ops = insert_ops(&table, &row("a", 10)).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], IndexOp::Put { subdb, .. } if *subdb == table.subdb_name(0)));
        assert!(matches!(&ops[1], IndexOp::Put { subdb, .. } if *subdb == table.subdb_name(1)));
    }

    #[test]
    fn insert_rejects_missing_non_nullable_column() {
        let table = table_with_secondary();
        let mut builder = RowBuilder::new();
        builder.upsert_column(0, Value::CstrVar(b"a".to_vec())).unwrap();
        let incomplete = builder.finalize();
        assert!(matches!(insert_ops(&table, &incomplete), Err(Error::ColumnMissing)));
    }

    #[test]
    fn update_rejects_primary_key_change() {
        let table = table_with_secondary();
        let old = row("a", 10);
        let new = row("b", 10);
        assert!(matches!(update_ops(&table, &old, &new), Err(Error::KeyMismatch)));
    }

    #[test]
    fn update_only_touches_changed_secondary_index() {
        let table = table_with_secondary();
        let old = row("a", 10);
        let same_amount = row("a", 10);
        let ops = update_ops(&table, &old, &same_amount).unwrap();
        // Primary put always happens; the secondary index key didn't
        // change, so no delete/put pair is emitted for it.
        assert_eq!(ops.len(), 1);

        let changed_amount = row("a", 20);
        let ops = update_ops(&table, &old, &changed_amount).unwrap();
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn delete_mirrors_insert_keys() {
        let table = table_with_secondary();
        let r = row("a", 10);
        let inserted = insert_ops(&table, &r).unwrap();
        let deleted = delete_ops(&table, &r).unwrap();
        assert_eq!(inserted.len(), deleted.len());
    }

    #[test]
    fn upsert_dispatches_insert_vs_update() {
        let table = table_with_secondary();
        let r = row("a", 10);
        let as_insert = upsert_ops(&table, None, &r).unwrap();
        assert_eq!(as_insert.len(), 2);

        let as_update = upsert_ops(&table, Some(&r), &row("a", 20)).unwrap();
        assert_eq!(as_update.len(), 3);
    }
}
