//! Transaction manager: read/write/schema transaction kinds layered over
//! [`crate::backend::mdbx::ConcreteEnv`], plus the per-transaction DBI
//! handle cache keyed by `(table_id, index_slot)`.
//!
//! Written concretely against the `mdbx` backend rather than generically
//! over [`crate::env::Env`] (which only exposes the commit/abort seam
//! [`crate::transaction::RoTx`]/[`crate::transaction::RwTx`] need): table
//! open/create/get/put/del/cursor calls need the full `libmdbx`
//! transaction API, and this crate ships exactly one backend. See
//! `DESIGN.md` for the tradeoff.

use std::{
    collections::HashMap,
    sync::{atomic::{AtomicU64, Ordering}, Arc},
};

use libmdbx::{Table, TableFlags, WriteFlags, RO, RW};

use crate::{
    backend::MdbxCursor,
    comparator::ComparatorSignature,
    error::{Error, Result},
    macros::{trace2, warn2},
};

//---------------------------------------------------------------------------------------------------- TxnKind
/// Which of the three transaction kinds a [`ReadTxn`]/[`WriteTxn`] is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxnKind {
    Read,
    /// An ordinary row-mutating write transaction.
    Write,
    /// A write transaction that is also allowed to create/drop tables.
    /// Per `SPEC_FULL.md` 4.E, only a schema transaction may mutate the
    /// catalog.
    Schema,
}

//---------------------------------------------------------------------------------------------------- ReadTxn
/// A read-only transaction: a stable snapshot, plus its own DBI cache so
/// repeated lookups against the same table within one transaction don't
/// re-open it.
pub struct ReadTxn<'env> {
    inner: libmdbx::Transaction<'env, RO, libmdbx::WriteMap>,
    tables: HashMap<(u32, u16), Table<'env>>,
    commit_seq: Arc<AtomicU64>,
    /// The commit-sequence counter's value when this snapshot was taken.
    snapshot: u64,
}

impl<'env> ReadTxn<'env> {
    pub(crate) fn new(
        inner: libmdbx::Transaction<'env, RO, libmdbx::WriteMap>,
        commit_seq: Arc<AtomicU64>,
    ) -> Self {
        let snapshot = commit_seq.load(Ordering::Acquire);
        Self { inner, tables: HashMap::new(), commit_seq, snapshot }
    }

    /// How many commits have landed since this read transaction's snapshot
    /// was taken — `0` means fully caught up with the latest commit.
    #[must_use]
    pub fn lag_ex(&self) -> u64 {
        self.commit_seq.load(Ordering::Acquire).saturating_sub(self.snapshot)
    }

    /// The open table handle for `(table_id, slot)`, opening (but never
    /// creating) it on first use.
    ///
    /// `Table` is a cheap `Copy` handle (just the `libmdbx` dbi index), so
    /// this returns an owned copy rather than a borrow of `self` — callers
    /// otherwise can't hold the handle across a later `get`/`cursor` call
    /// without fighting the borrow checker over `self`.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no sub-database named `subdb_name` exists.
    pub fn table(&mut self, table_id: u32, slot: u16, subdb_name: &str) -> Result<Table<'env>> {
        if !self.tables.contains_key(&(table_id, slot)) {
            let table = self.inner.open_table(Some(subdb_name))?;
            self.tables.insert((table_id, slot), table);
        }
        Ok(*self.tables.get(&(table_id, slot)).expect("just inserted"))
    }

    /// Point lookup within `table`.
    ///
    /// # Errors
    /// Propagates the underlying storage failure.
    pub fn get(&self, table: &Table<'env>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(table, key)?)
    }

    /// A cursor over `table`.
    ///
    /// # Errors
    /// Propagates the underlying storage failure.
    pub fn cursor<'txn>(&'txn self, table: &Table<'env>) -> Result<MdbxCursor<'txn, RO>>
    where
        'env: 'txn,
    {
        Ok(MdbxCursor::new(self.inner.cursor(table)?))
    }

    /// Release this transaction's snapshot.
    ///
    /// # Errors
    /// Propagates the underlying storage failure.
    pub fn commit(self) -> Result<()> {
        self.inner.commit()?;
        Ok(())
    }
}

//---------------------------------------------------------------------------------------------------- WriteTxn
/// A read/write transaction: [`TxnKind::Write`] or [`TxnKind::Schema`].
///
/// Once a uniqueness violation or other row-shape error [`cancel`](
/// WriteTxn::cancel)s this transaction, every further call except
/// [`WriteTxn::abort`] returns [`Error::TxnCancelled`] — per `SPEC_FULL.md`
/// 9, a cancelled write transaction is only valid for `end()`.
pub struct WriteTxn<'env> {
    inner: libmdbx::Transaction<'env, RW, libmdbx::WriteMap>,
    tables: HashMap<(u32, u16), Table<'env>>,
    kind: TxnKind,
    cancelled: bool,
    commit_seq: Arc<AtomicU64>,
}

impl<'env> WriteTxn<'env> {
    pub(crate) fn new(
        inner: libmdbx::Transaction<'env, RW, libmdbx::WriteMap>,
        kind: TxnKind,
        commit_seq: Arc<AtomicU64>,
    ) -> Self {
        debug_assert!(matches!(kind, TxnKind::Write | TxnKind::Schema));
        Self { inner, tables: HashMap::new(), kind, cancelled: false, commit_seq }
    }

    #[must_use]
    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Mark this transaction cancelled after a uniqueness violation or
    /// other structural row error. Idempotent.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            warn2!("write transaction cancelled");
        }
        self.cancelled = true;
    }

    fn check_live(&self) -> Result<()> {
        if self.cancelled {
            Err(Error::TxnCancelled)
        } else {
            Ok(())
        }
    }

    /// The open table handle for `(table_id, slot)`, opening it (creating
    /// with `flags` if `create` and it doesn't yet exist) on first use.
    ///
    /// # Errors
    /// - [`Error::TxnCancelled`] if already cancelled.
    /// - [`Error::FlagInvalid`] if `create` is requested outside a
    ///   [`TxnKind::Schema`] transaction.
    pub fn table(
        &mut self,
        table_id: u32,
        slot: u16,
        subdb_name: &str,
        signature: ComparatorSignature,
        create: bool,
    ) -> Result<Table<'env>> {
        self.check_live()?;

        if create && self.kind != TxnKind::Schema {
            return Err(Error::FlagInvalid);
        }

        if !self.tables.contains_key(&(table_id, slot)) {
            let table = if create {
                trace2!("creating sub-database {subdb_name}");
                self.inner.create_table(Some(subdb_name), signature.table_flags())?
            } else {
                let table = self.inner.open_table(Some(subdb_name))?;
                signature.verify_flags(self.inner.table_flags(&table)?)?;
                table
            };
            self.tables.insert((table_id, slot), table);
        }
        Ok(*self.tables.get(&(table_id, slot)).expect("just inserted"))
    }

    /// Point lookup within `table`.
    ///
    /// # Errors
    /// [`Error::TxnCancelled`] if already cancelled.
    pub fn get(&self, table: &Table<'env>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_live()?;
        Ok(self.inner.get(table, key)?)
    }

    /// Write `key -> value` into `table`.
    ///
    /// # Errors
    /// [`Error::TxnCancelled`] if already cancelled; [`Error::DbFull`]
    /// propagated from the backend if the map is full.
    pub fn put(&self, table: &Table<'env>, key: &[u8], value: &[u8], flags: WriteFlags) -> Result<()> {
        self.check_live()?;
        self.inner.put(table, key, value, flags)?;
        Ok(())
    }

    /// Remove `key`'s entry from `table` (or, for a `DUP_SORT` table, the
    /// exact `key -> value` pair if `value` is given).
    ///
    /// # Errors
    /// [`Error::TxnCancelled`] if already cancelled.
    pub fn del(&self, table: &Table<'env>, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
        self.check_live()?;
        Ok(self.inner.del(table, key, value)?)
    }

    /// A cursor over `table`, usable for both navigation and
    /// cursor-driven mutation.
    ///
    /// # Errors
    /// [`Error::TxnCancelled`] if already cancelled.
    pub fn cursor<'txn>(&'txn self, table: &Table<'env>) -> Result<MdbxCursor<'txn, RW>>
    where
        'env: 'txn,
    {
        self.check_live()?;
        Ok(MdbxCursor::new(self.inner.cursor(table)?))
    }

    /// Commit this transaction's writes.
    ///
    /// # Errors
    /// [`Error::TxnCancelled`] if this transaction was cancelled — call
    /// [`WriteTxn::abort`] instead.
    pub fn commit(self) -> Result<()> {
        if self.cancelled {
            return Err(Error::TxnCancelled);
        }
        self.inner.commit()?;
        self.commit_seq.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Discard this transaction's writes. Always valid, cancelled or not.
    pub fn abort(self) {
        drop(self.inner);
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn txn_kind_equality() {
        assert_eq!(TxnKind::Write, TxnKind::Write);
        assert_ne!(TxnKind::Write, TxnKind::Schema);
    }
}
