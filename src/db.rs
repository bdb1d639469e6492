//! Top-level database handle: owns the environment and the live schema
//! catalog snapshot readers and writers resolve [`crate::schema::NameHandle`]s
//! against.
//!
//! Grounded on the teacher's own one-line `db.rs` stub, which already
//! described this module's role ("the abstract interface to the actual
//! database... the 1st layer on top of an actual database/transaction").

use std::sync::{Arc, RwLock};

use libmdbx::{WriteFlags, RO, RW};

use crate::{
    backend::{ConcreteEnv, MdbxCursor},
    config::Config,
    cursor::{Cursor, FilterNode, Order, Range, RangeBound},
    env::Env,
    error::{Error, Result},
    macros::trace2,
    ops::{self, IndexOp},
    row::Row,
    schema::{Catalog, ColumnDescriptor, TableDescriptor},
    txn::{ReadTxn, TxnKind, WriteTxn},
};

//---------------------------------------------------------------------------------------------------- Db
/// The engine's top-level handle: one per open database directory.
pub struct Db {
    env: ConcreteEnv,
    catalog: RwLock<Arc<Catalog>>,
}

impl Db {
    /// Open (creating if necessary) a database at `config.db_directory`,
    /// loading its persisted schema catalog.
    ///
    /// # Errors
    /// Propagates [`ConcreteEnv::open`]'s and the catalog load's errors.
    pub fn open(config: Config) -> Result<Self> {
        let env = ConcreteEnv::open(config)?;
        let catalog = load_catalog(&env)?;
        Ok(Self { env, catalog: RwLock::new(Arc::new(catalog)) })
    }

    /// The current schema catalog snapshot. Cheap: an `Arc` clone.
    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    /// Begin a read-only transaction.
    ///
    /// # Errors
    /// Propagates the backend's failure.
    pub fn begin_read(&self) -> Result<ReadTxn<'_>> {
        Ok(ReadTxn::new(self.env.ro_tx()?, self.env.commit_seq()))
    }

    /// Begin an ordinary read/write transaction (row mutation only, no
    /// schema changes).
    ///
    /// # Errors
    /// Propagates the backend's failure.
    pub fn begin_write(&self) -> Result<WriteTxn<'_>> {
        Ok(WriteTxn::new(self.env.rw_tx()?, TxnKind::Write, self.env.commit_seq()))
    }

    //------------------------------------------------------------------ cursors
    /// Open a cursor over `column_name`'s sub-database within `table_name`,
    /// within an already-open read transaction.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if `table_name`/`column_name` doesn't exist.
    /// - [`Error::NoIndex`] if `column_name` carries no index, or is an
    ///   unordered (hashed) index and `lower`/`upper` aren't both
    ///   [`CursorBound::Begin`]/[`CursorBound::End`].
    pub fn open_read_cursor<'env, 'txn>(
        &self,
        txn: &'txn mut ReadTxn<'env>,
        table_name: &str,
        column_name: &str,
        lower: CursorBound,
        upper: CursorBound,
        filter: Option<FilterNode>,
        options: CursorOptions,
    ) -> Result<Cursor<MdbxCursor<'txn, RO>>>
    where
        'env: 'txn,
    {
        let catalog = self.catalog();
        let (table, column, range) = open_cursor_range(&catalog, table_name, column_name, lower, upper, &options)?;
        let handle = txn.table(table.table_id, column.slot, &table.subdb_name(column.slot))?;
        let raw = txn.cursor(&handle)?;
        let mut cursor = Cursor::new(raw, range, filter);
        if !options.dont_fetch {
            cursor.first()?;
        }
        Ok(cursor)
    }

    /// Open a cursor over `column_name`'s sub-database within `table_name`,
    /// within an already-open write transaction. Usable for cursor-driven
    /// `update`/`delete`, as well as plain navigation.
    ///
    /// # Errors
    /// Same as [`Db::open_read_cursor`], plus [`Error::TxnCancelled`] if
    /// `txn` was already cancelled.
    pub fn open_write_cursor<'env, 'txn>(
        &self,
        txn: &'txn mut WriteTxn<'env>,
        table_name: &str,
        column_name: &str,
        lower: CursorBound,
        upper: CursorBound,
        filter: Option<FilterNode>,
        options: CursorOptions,
    ) -> Result<Cursor<MdbxCursor<'txn, RW>>>
    where
        'env: 'txn,
    {
        let catalog = self.catalog();
        let (table, column, range) = open_cursor_range(&catalog, table_name, column_name, lower, upper, &options)?;
        let index = column.index.as_ref().ok_or(Error::NoIndex)?;
        let handle = txn.table(
            table.table_id,
            column.slot,
            &table.subdb_name(column.slot),
            index.comparator_signature(),
            false,
        )?;
        let raw = txn.cursor(&handle)?;
        let mut cursor = Cursor::new(raw, range, filter);
        if !options.dont_fetch {
            cursor.first()?;
        }
        Ok(cursor)
    }

    //------------------------------------------------------------------ schema
    /// Validate and create a new table, persisting its descriptor and
    /// opening its sub-databases in one schema transaction.
    ///
    /// # Errors
    /// Propagates [`Catalog::create_table`]'s validation errors, or the
    /// backend's failure.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<crate::schema::ColumnDescriptor>,
    ) -> Result<TableDescriptor> {
        let mut working = (*self.catalog()).clone();
        working.create_table(name, columns)?;
        let descriptor = working.get(name).expect("just created").clone();

        let mut txn = WriteTxn::new(self.env.rw_tx()?, TxnKind::Schema, self.env.commit_seq());
        let result = (|| -> Result<()> {
            let catalog_table = open_catalog_table(&mut txn)?;
            txn.put(
                &catalog_table,
                &descriptor.table_id.to_be_bytes(),
                &descriptor.to_bytes(),
                WriteFlags::empty(),
            )?;

            for column in &descriptor.columns {
                let Some(index) = &column.index else { continue };
                txn.table(
                    descriptor.table_id,
                    column.slot,
                    &descriptor.subdb_name(column.slot),
                    index.comparator_signature(),
                    true,
                )?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                txn.commit()?;
                trace2!("created table {name}");
                *self.catalog.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(working);
                Ok(descriptor)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Drop a table: removes its catalog record. Its sub-databases are
    /// left behind (orphaned, unreachable through the catalog) rather than
    /// physically reclaimed — see `DESIGN.md`.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no such table exists; propagates the
    /// backend's failure.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut working = (*self.catalog()).clone();
        let descriptor = working.drop_table(name)?;

        let mut txn = WriteTxn::new(self.env.rw_tx()?, TxnKind::Schema, self.env.commit_seq());
        let result = (|| -> Result<()> {
            let catalog_table = open_catalog_table(&mut txn)?;
            txn.del(&catalog_table, &descriptor.table_id.to_be_bytes(), None)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                txn.commit()?;
                *self.catalog.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(working);
                Ok(())
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    //------------------------------------------------------------------ rows
    /// Insert a brand-new row.
    ///
    /// # Errors
    /// [`Error::NotFound`] if `table_name` doesn't exist; [`Error::KeyExists`]
    /// if the row's primary (or a unique secondary) key collides with an
    /// existing row.
    pub fn insert(&self, table_name: &str, row: &Row) -> Result<()> {
        let catalog = self.catalog();
        let table = catalog.get(table_name).ok_or(Error::NotFound)?;
        let plan = ops::insert_ops(table, row)?;
        self.run_write(table, plan)
    }

    /// Insert or, if the primary key already exists, update a row.
    ///
    /// # Errors
    /// Same as [`Db::insert`]/[`Db::update`].
    pub fn upsert(&self, table_name: &str, row: &Row) -> Result<()> {
        let catalog = self.catalog();
        let table = catalog.get(table_name).ok_or(Error::NotFound)?;
        let pk = table.primary_column();
        let pk_bytes = ops::index_key(table, pk, row)?;

        let mut read = self.begin_read()?;
        let existing = {
            let handle = read.table(table.table_id, pk.slot, &table.subdb_name(pk.slot))?;
            read.get(&handle, &pk_bytes)?
        };
        read.commit()?;

        let existing_row = existing.map(|bytes| Row::from_bytes(&bytes)).transpose()?;
        let plan = ops::upsert_ops(table, existing_row.as_ref(), row)?;
        self.run_write(table, plan)
    }

    /// Replace an existing row with `new`, keeping its primary key.
    ///
    /// # Errors
    /// [`Error::KeyMismatch`] if `old` and `new` derive different primary
    /// keys; otherwise as [`Db::insert`].
    pub fn update(&self, table_name: &str, old: &Row, new: &Row) -> Result<()> {
        let catalog = self.catalog();
        let table = catalog.get(table_name).ok_or(Error::NotFound)?;
        let plan = ops::update_ops(table, old, new)?;
        self.run_write(table, plan)
    }

    /// Remove a row.
    ///
    /// # Errors
    /// Same as [`Db::insert`].
    pub fn delete(&self, table_name: &str, row: &Row) -> Result<()> {
        let catalog = self.catalog();
        let table = catalog.get(table_name).ok_or(Error::NotFound)?;
        let plan = ops::delete_ops(table, row)?;
        self.run_write(table, plan)
    }

    /// Look up a row by its exact primary key value.
    ///
    /// # Errors
    /// [`Error::NotFound`] if `table_name` doesn't exist.
    pub fn get(&self, table_name: &str, pk_bytes: &[u8]) -> Result<Option<Row>> {
        let catalog = self.catalog();
        let table = catalog.get(table_name).ok_or(Error::NotFound)?;
        let pk = table.primary_column();

        let mut read = self.begin_read()?;
        let handle = read.table(table.table_id, pk.slot, &table.subdb_name(pk.slot))?;
        let value = read.get(&handle, pk_bytes)?;
        read.commit()?;

        value.map(|bytes| Row::from_bytes(&bytes)).transpose()
    }

    /// Reserve the next `n` values of `table_name`'s persisted sequence
    /// counter.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no such table exists.
    pub fn sequence(&self, table_name: &str, n: u64) -> Result<u64> {
        let mut working = (*self.catalog()).clone();
        let first = working.sequence(table_name, n)?;
        let descriptor = working.get(table_name).expect("validated above").clone();

        let mut txn = WriteTxn::new(self.env.rw_tx()?, TxnKind::Schema, self.env.commit_seq());
        let result = (|| -> Result<()> {
            let catalog_table = open_catalog_table(&mut txn)?;
            txn.put(&catalog_table, &descriptor.table_id.to_be_bytes(), &descriptor.to_bytes(), WriteFlags::empty())?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                txn.commit()?;
                *self.catalog.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(working);
                Ok(first)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    //------------------------------------------------------------------ internals
    fn run_write(&self, table: &TableDescriptor, plan: Vec<IndexOp>) -> Result<()> {
        let mut txn = WriteTxn::new(self.env.rw_tx()?, TxnKind::Write, self.env.commit_seq());
        match apply_plan(&mut txn, table, plan) {
            Ok(()) => {
                txn.commit()?;
                Ok(())
            }
            Err(e) => {
                txn.cancel();
                txn.abort();
                Err(e)
            }
        }
    }
}

//---------------------------------------------------------------------------------------------------- Cursor opening
/// One side of a cursor-open call's `lower`/`upper` bound: the caller-facing
/// vocabulary of §4.G, expressed over typed rows instead of raw bytes.
#[derive(Clone, Debug)]
pub enum CursorBound {
    /// The open (unbounded) low side.
    Begin,
    /// The open (unbounded) high side.
    End,
    /// A concrete value for the column being opened on — only the slots
    /// that make up that column's key need be set on `row`.
    Value(Row),
    /// The one-row endpoint; see [`crate::cursor::RangeBound::Epsilon`].
    Epsilon,
}

/// Options accompanying a cursor-open call.
#[derive(Copy, Clone, Debug)]
pub struct CursorOptions {
    pub order: Order,
    pub zero_len_is_point: bool,
    /// Defer the initial positioning call the opening routine otherwise
    /// issues, leaving the cursor unset until the caller positions it.
    pub dont_fetch: bool,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self { order: Order::Ascending, zero_len_is_point: false, dont_fetch: false }
    }
}

fn resolve_bound(table: &TableDescriptor, column: &ColumnDescriptor, bound: CursorBound) -> Result<RangeBound> {
    match bound {
        CursorBound::Begin | CursorBound::End => Ok(RangeBound::Unbounded),
        CursorBound::Epsilon => Ok(RangeBound::Epsilon),
        CursorBound::Value(row) => Ok(RangeBound::Included(ops::index_key(table, column, &row)?)),
    }
}

/// Shared by [`Db::open_read_cursor`]/[`Db::open_write_cursor`]: resolve
/// `table_name`/`column_name` against `catalog`, validate the bound/order
/// combination against the column's comparator, and build the resulting
/// [`Range`].
fn open_cursor_range<'c>(
    catalog: &'c Catalog,
    table_name: &str,
    column_name: &str,
    lower: CursorBound,
    upper: CursorBound,
    options: &CursorOptions,
) -> Result<(&'c TableDescriptor, &'c ColumnDescriptor, Range)> {
    let table = catalog.get(table_name).ok_or(Error::NotFound)?;
    let column = table.column_by_name(column_name).ok_or(Error::NotFound)?;
    let index = column.index.as_ref().ok_or(Error::NoIndex)?;

    let is_begin_end = matches!(lower, CursorBound::Begin) && matches!(upper, CursorBound::End);
    if !index.ordered && !is_begin_end {
        return Err(Error::NoIndex);
    }

    let order = if index.ordered { options.order } else { Order::Unsorted };
    let start = resolve_bound(table, column, lower)?;
    let end = resolve_bound(table, column, upper)?;
    let range = Range::new(start, end, order, options.zero_len_is_point, options.dont_fetch);
    Ok((table, column, range))
}

fn open_catalog_table<'env>(txn: &mut WriteTxn<'env>) -> Result<libmdbx::Table<'env>> {
    use crate::{comparator::ComparatorSignature, keycode::Direction};

    let signature = ComparatorSignature { ordered: true, direction: Direction::Obverse, with_dups: false };
    txn.table(0, 0, crate::constants::CATALOG_TABLE_NAME, signature, true)
}

/// Read every persisted [`TableDescriptor`] out of the reserved catalog
/// sub-database. An environment with no catalog sub-database yet (a
/// brand-new directory) loads as an empty [`Catalog`].
fn load_catalog(env: &ConcreteEnv) -> Result<Catalog> {
    let mut catalog = Catalog::new();
    let ro = env.ro_tx()?;

    let table = match ro.open_table(Some(crate::constants::CATALOG_TABLE_NAME)) {
        Ok(table) => table,
        Err(libmdbx::Error::NotFound) => {
            ro.commit()?;
            return Ok(catalog);
        }
        Err(e) => return Err(e.into()),
    };

    let mut cursor = ro.cursor(&table)?;
    let mut entry: Option<(Vec<u8>, Vec<u8>)> = cursor.first()?;
    while let Some((_, value)) = entry {
        catalog.load_table(TableDescriptor::from_bytes(&value)?);
        entry = cursor.next()?;
    }

    ro.commit()?;
    Ok(catalog)
}

/// Execute a write plan inside `txn`, enforcing uniqueness on every
/// [`IndexOp::Put`] whose sub-database is a unique index.
fn apply_plan(txn: &mut WriteTxn<'_>, table: &TableDescriptor, plan: Vec<IndexOp>) -> Result<()> {
    for op in plan {
        match op {
            IndexOp::Put { subdb, key, value } => {
                let column = table
                    .columns
                    .iter()
                    .find(|c| table.subdb_name(c.slot) == subdb)
                    .ok_or(Error::Eoops)?;
                let index = column.index.as_ref().ok_or(Error::Eoops)?;

                let handle =
                    txn.table(table.table_id, column.slot, &subdb, index.comparator_signature(), false)?;

                if index.unique {
                    if let Some(existing) = txn.get(&handle, &key)? {
                        if existing != value {
                            return Err(Error::KeyExists);
                        }
                    }
                }

                txn.put(&handle, &key, &value, WriteFlags::empty())?;
            }
            IndexOp::Delete { subdb, key, value } => {
                let column = table
                    .columns
                    .iter()
                    .find(|c| table.subdb_name(c.slot) == subdb)
                    .ok_or(Error::Eoops)?;
                let index = column.index.as_ref().ok_or(Error::Eoops)?;

                let handle =
                    txn.table(table.table_id, column.slot, &subdb, index.comparator_signature(), false)?;
                txn.del(&handle, &key, if index.unique { None } else { Some(value.as_slice()) })?;
            }
        }
    }
    Ok(())
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        keycode::{ColumnType, Direction, Value},
        row::RowBuilder,
        schema::{ColumnDescriptor, IndexDescriptor},
    };

    fn open_tmp() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(Config::new(dir.path().to_path_buf())).unwrap();
        (dir, db)
    }

    fn orders_columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor {
                name: "id".into(),
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
                name: "customer".into(),
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
        ]
    }

    fn order_row(id: &str, customer: u64) -> Row {
        let mut builder = RowBuilder::new();
        builder.upsert_column(0, Value::CstrVar(id.as_bytes().to_vec())).unwrap();
        builder.upsert_column(1, Value::U64(customer)).unwrap();
        builder.finalize()
    }

    #[test]
    fn create_insert_and_get_roundtrips() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();

        let row = order_row("order-1", 42);
        db.insert("orders", &row).unwrap();

        let fetched = db.get("orders", b"order-1").unwrap().unwrap();
        assert_eq!(fetched, row);
    }

    #[test]
    fn duplicate_primary_key_insert_is_rejected() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();

        db.insert("orders", &order_row("order-1", 1)).unwrap();
        let err = db.insert("orders", &order_row("order-1", 2)).unwrap_err();
        assert!(matches!(err, Error::KeyExists));
    }

    #[test]
    fn upsert_updates_existing_row() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();

        db.upsert("orders", &order_row("order-1", 1)).unwrap();
        db.upsert("orders", &order_row("order-1", 2)).unwrap();

        let fetched = db.get("orders", b"order-1").unwrap().unwrap();
        assert_eq!(fetched.get_column(1), Some(&Value::U64(2)));
    }

    #[test]
    fn sequence_persists_across_catalog_snapshots() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();

        let first = db.sequence("orders", 3).unwrap();
        let second = db.sequence("orders", 3).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 3);
        assert_eq!(db.catalog().get("orders").unwrap().sequence, 6);
    }

    #[test]
    fn drop_table_removes_it_from_catalog() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        db.drop_table("orders").unwrap();
        assert!(db.catalog().get("orders").is_none());
        assert!(matches!(db.insert("orders", &order_row("x", 1)), Err(Error::NotFound)));
    }

    /// Scenario 1: `t1{pk:cstr primary unique, a:u64 secondary with-dups,
    /// b:f64 no-index}`; cursor on `pk` sees the first/last row in key
    /// order and a full-range count of 2.
    #[test]
    fn scenario_cursor_first_last_and_count_on_primary_key() {
        use crate::cursor::{Cursor, Order, Range};

        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        db.insert("orders", &order_row("pk-string", 34)).unwrap();
        db.insert("orders", &order_row("zzz", 90)).unwrap();

        let table = db.catalog().get("orders").unwrap().clone();
        let pk = table.primary_column().clone();

        let mut txn = db.begin_read().unwrap();
        let handle = txn.table(table.table_id, pk.slot, &table.subdb_name(pk.slot)).unwrap();

        let mut ascending = Cursor::new(txn.cursor(&handle).unwrap(), Range::full(), None);
        ascending.first().unwrap();
        let first_row = ascending.get().unwrap();
        assert_eq!(first_row.get_column(0), Some(&Value::CstrVar(b"pk-string".to_vec())));

        let descending_range = Range { order: Order::Descending, ..Range::full() };
        let mut descending = Cursor::new(txn.cursor(&handle).unwrap(), descending_range, None);
        descending.first().unwrap();
        let last_row = descending.get().unwrap();
        assert_eq!(last_row.get_column(0), Some(&Value::CstrVar(b"zzz".to_vec())));

        let mut counter = Cursor::new(txn.cursor(&handle).unwrap(), Range::full(), None);
        assert_eq!(counter.count(None).unwrap(), 2);
    }

    /// Scenario 2: composite PK over `(b:u64, a:cstr, c:f64)`; probing with
    /// the inserted values returns that row, probing with a never-inserted
    /// combination returns nothing.
    #[test]
    fn scenario_composite_primary_key_probe() {
        let columns = vec![
            ColumnDescriptor { name: "b".into(), slot: 0, column_type: ColumnType::U64, index: None },
            ColumnDescriptor { name: "a".into(), slot: 1, column_type: ColumnType::CstrVar, index: None },
            ColumnDescriptor { name: "c".into(), slot: 2, column_type: ColumnType::F64, index: None },
            ColumnDescriptor {
                name: "pk".into(),
                slot: 3,
                column_type: ColumnType::Composite,
                index: Some(IndexDescriptor {
                    primary: true,
                    unique: true,
                    ordered: true,
                    direction: Direction::Obverse,
                    nullable: false,
                    composite_components: Some(vec![0, 1, 2]),
                    tersely: false,
                }),
            },
        ];

        let (_dir, db) = open_tmp();
        db.create_table("triples", columns).unwrap();

        let row = {
            let mut builder = RowBuilder::new();
            builder.upsert_column(0, Value::U64(34)).unwrap();
            builder.upsert_column(1, Value::CstrVar(b"string".to_vec())).unwrap();
            builder.upsert_column(2, Value::F64(56.78)).unwrap();
            builder.finalize()
        };
        db.insert("triples", &row).unwrap();

        let table = db.catalog().get("triples").unwrap().clone();
        let pk = table.primary_column();

        let hit_key = ops::index_key(&table, pk, &row).unwrap();
        assert_eq!(db.get("triples", &hit_key).unwrap(), Some(row));

        let miss_row = {
            let mut builder = RowBuilder::new();
            builder.upsert_column(0, Value::U64(90)).unwrap();
            builder.upsert_column(1, Value::CstrVar(b"string".to_vec())).unwrap();
            builder.upsert_column(2, Value::F64(56.78)).unwrap();
            builder.finalize()
        };
        let miss_key = ops::index_key(&table, pk, &miss_row).unwrap();
        assert_eq!(db.get("triples", &miss_key).unwrap(), None);
    }

    /// Scenario 6: a duplicate-key insert mid-transaction cancels it;
    /// every further operation on that transaction reports `TxnCancelled`
    /// until it's aborted, and the two rows written before the failure are
    /// the only ones that persist.
    #[test]
    fn scenario_writer_cancellation_after_duplicate_insert() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        let table = db.catalog().get("orders").unwrap().clone();
        let pk = table.primary_column().clone();

        let mut txn = WriteTxn::new(db.env.rw_tx().unwrap(), TxnKind::Write, db.env.commit_seq());
        apply_plan(&mut txn, &table, ops::insert_ops(&table, &order_row("order-1", 1)).unwrap()).unwrap();
        apply_plan(&mut txn, &table, ops::insert_ops(&table, &order_row("order-2", 2)).unwrap()).unwrap();

        let dup_plan = ops::insert_ops(&table, &order_row("order-1", 99)).unwrap();
        let dup_result = apply_plan(&mut txn, &table, dup_plan);
        assert!(matches!(dup_result, Err(Error::KeyExists)));
        txn.cancel();

        let signature = pk.index.as_ref().unwrap().comparator_signature();
        let after_cancel = txn.table(table.table_id, pk.slot, &table.subdb_name(pk.slot), signature, false);
        assert!(matches!(after_cancel, Err(Error::TxnCancelled)));

        txn.abort();

        assert!(db.get("orders", b"order-1").unwrap().is_some());
        assert!(db.get("orders", b"order-2").unwrap().is_some());

        let mut read = db.begin_read().unwrap();
        let handle = read.table(table.table_id, pk.slot, &table.subdb_name(pk.slot)).unwrap();
        let mut cursor = crate::cursor::Cursor::new(read.cursor(&handle).unwrap(), crate::cursor::Range::full(), None);
        assert_eq!(cursor.count(None).unwrap(), 2);
    }

    #[test]
    fn commit_on_cancelled_write_txn_is_rejected() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        let table = db.catalog().get("orders").unwrap().clone();

        let mut txn = WriteTxn::new(db.env.rw_tx().unwrap(), TxnKind::Write, db.env.commit_seq());
        apply_plan(&mut txn, &table, ops::insert_ops(&table, &order_row("order-1", 1)).unwrap()).unwrap();
        txn.cancel();
        assert!(matches!(txn.commit(), Err(Error::TxnCancelled)));
    }

    /// A reader's `lag_ex` grows by one per write commit that lands after
    /// its snapshot was taken, and a fresh snapshot reads as caught up.
    #[test]
    fn lag_ex_tracks_commits_since_snapshot() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();

        let stale = db.begin_read().unwrap();
        assert_eq!(stale.lag_ex(), 0);

        db.insert("orders", &order_row("order-1", 1)).unwrap();
        assert_eq!(stale.lag_ex(), 1);

        db.insert("orders", &order_row("order-2", 2)).unwrap();
        assert_eq!(stale.lag_ex(), 2);

        let fresh = db.begin_read().unwrap();
        assert_eq!(fresh.lag_ex(), 0);
    }

    /// [`Db::open_read_cursor`] resolves `table`/`column` by name, encodes
    /// the typed bound, and returns an already-positioned cursor — no
    /// hand-assembly of `subdb_name`/`txn.table`/`txn.cursor` needed.
    #[test]
    fn open_read_cursor_resolves_by_name_and_fetches_first_row() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        db.insert("orders", &order_row("order-1", 1)).unwrap();
        db.insert("orders", &order_row("order-2", 2)).unwrap();

        let mut txn = db.begin_read().unwrap();
        let mut cursor = db
            .open_read_cursor(
                &mut txn,
                "orders",
                "id",
                CursorBound::Begin,
                CursorBound::End,
                None,
                CursorOptions::default(),
            )
            .unwrap();
        assert_eq!(cursor.key(), Some(b"order-1".as_slice()));
        assert_eq!(cursor.count(None).unwrap(), 2);
    }

    /// `CursorBound::Value` paired with `Epsilon` opens directly on the one
    /// row at that exact key.
    #[test]
    fn open_read_cursor_value_epsilon_is_a_point_lookup() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        db.insert("orders", &order_row("order-1", 1)).unwrap();
        db.insert("orders", &order_row("order-2", 2)).unwrap();

        let mut probe = RowBuilder::new();
        probe.upsert_column(0, Value::CstrVar(b"order-2".to_vec())).unwrap();

        let mut txn = db.begin_read().unwrap();
        let cursor = db
            .open_read_cursor(
                &mut txn,
                "orders",
                "id",
                CursorBound::Value(probe.finalize()),
                CursorBound::Epsilon,
                None,
                CursorOptions::default(),
            )
            .unwrap();
        assert_eq!(cursor.key(), Some(b"order-2".as_slice()));
    }

    /// `dont_fetch` leaves the cursor unset until the caller positions it.
    #[test]
    fn open_read_cursor_dont_fetch_defers_positioning() {
        let (_dir, db) = open_tmp();
        db.create_table("orders", orders_columns()).unwrap();
        db.insert("orders", &order_row("order-1", 1)).unwrap();

        let mut txn = db.begin_read().unwrap();
        let mut cursor = db
            .open_read_cursor(
                &mut txn,
                "orders",
                "id",
                CursorBound::Begin,
                CursorBound::End,
                None,
                CursorOptions { dont_fetch: true, ..CursorOptions::default() },
            )
            .unwrap();
        assert!(cursor.eof());
        cursor.first().unwrap();
        assert_eq!(cursor.key(), Some(b"order-1".as_slice()));
    }

    /// Opening a range scan (anything but `Begin`/`End`) against an
    /// unordered index is rejected.
    #[test]
    fn open_cursor_range_scan_on_unordered_index_is_rejected() {
        let columns = vec![
            ColumnDescriptor {
                name: "id".into(),
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
                name: "bucket".into(),
                slot: 1,
                column_type: ColumnType::U64,
                index: Some(IndexDescriptor {
                    primary: false,
                    unique: false,
                    ordered: false,
                    direction: Direction::Obverse,
                    nullable: false,
                    composite_components: None,
                    tersely: false,
                }),
            },
        ];
        let (_dir, db) = open_tmp();
        db.create_table("orders", columns).unwrap();

        let mut probe = RowBuilder::new();
        probe.upsert_column(1, Value::U64(1)).unwrap();

        let mut txn = db.begin_read().unwrap();
        let err = db
            .open_read_cursor(
                &mut txn,
                "orders",
                "bucket",
                CursorBound::Value(probe.finalize()),
                CursorBound::End,
                None,
                CursorOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NoIndex));
    }
}
