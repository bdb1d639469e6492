//! `libmdbx` table/cursor wrapper; the one place in the crate that names
//! `libmdbx::Table`/`libmdbx::Cursor` directly. [`MdbxCursor`] implements
//! [`crate::cursor::RawCursor`] so [`crate::cursor::Cursor`]'s range/filter
//! logic runs unmodified over a real environment.

use libmdbx::{TransactionKind, RO, RW};

use crate::{
    cursor::RawCursor,
    error::{Error, Result},
};

//---------------------------------------------------------------------------------------------------- MdbxCursor
/// Wraps a `libmdbx` cursor positioned over one table, translating its
/// op-code based navigation into [`RawCursor`]'s method-per-move shape.
///
/// Mutation (`put_at_current`/`del_at_current`) is only meaningful for a
/// cursor opened from a write transaction; the `RO` instantiation below
/// rejects both, since a read-only `libmdbx` cursor has no such calls to
/// make in the first place.
pub struct MdbxCursor<'txn, K: TransactionKind> {
    inner: libmdbx::Cursor<'txn, K>,
}

impl<'txn, K: TransactionKind> MdbxCursor<'txn, K> {
    pub(crate) fn new(inner: libmdbx::Cursor<'txn, K>) -> Self {
        Self { inner }
    }
}

macro_rules! impl_read_moves {
    () => {
        fn first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.first()?)
        }

        fn last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.last()?)
        }

        fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.next()?)
        }

        fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.prev()?)
        }

        fn set_range(&mut self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.set_range(key)?)
        }

        fn current(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.get_current()?)
        }

        fn dup_next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.next_dup()?)
        }

        fn dup_prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.prev_dup()?)
        }

        fn dup_first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.first_dup()?)
        }

        fn dup_last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.inner.last_dup()?)
        }
    };
}

//---------------------------------------------------------------------------------------------------- RawCursor for RO
impl<'txn> RawCursor for MdbxCursor<'txn, RO> {
    impl_read_moves!();

    fn put_at_current(&mut self, _value: &[u8]) -> Result<()> {
        Err(Error::Einval)
    }

    fn del_at_current(&mut self) -> Result<()> {
        Err(Error::Einval)
    }
}

//---------------------------------------------------------------------------------------------------- RawCursor for RW
impl<'txn> RawCursor for MdbxCursor<'txn, RW> {
    impl_read_moves!();

    fn put_at_current(&mut self, value: &[u8]) -> Result<()> {
        self.inner.put_current(value, Default::default())?;
        Ok(())
    }

    fn del_at_current(&mut self) -> Result<()> {
        self.inner.del(Default::default())?;
        Ok(())
    }
}
