//! Index comparator table.
//!
//! Because [`crate::keycode`] and [`crate::composite`] already bake the
//! declared ordering direction into the byte representation, no custom
//! MDBX comparator callback is ever registered here: comparator selection
//! reduces to picking which `libmdbx` [`TableFlags`] a sub-database is
//! opened with over already-correctly-ordered byte strings. See
//! `SPEC_FULL.md` 4.D for the rationale.

use libmdbx::TableFlags;

use crate::{
    error::{Error, Result},
    keycode::Direction,
};

//---------------------------------------------------------------------------------------------------- ComparatorSignature
/// The part of an index's shape that determines how its sub-database must
/// be opened. Persisted alongside the catalog record so a DBI can never be
/// silently reopened under a different comparator than the one its
/// contents were written under.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ComparatorSignature {
    /// Range-queryable (`libmdbx` default byte order) vs. hashed
    /// (equality-only; direction is meaningless).
    pub ordered: bool,
    /// Obverse/reverse — already baked into the stored bytes by the codec,
    /// recorded here only so a reopen under a different direction (which
    /// would silently desync byte order from the declared meaning) is
    /// detected.
    pub direction: Direction,
    /// Whether the sub-database holds a sorted multiset of PK payloads per
    /// key (`DUP_SORT`) rather than exactly one.
    pub with_dups: bool,
}

impl ComparatorSignature {
    /// Resolve the `libmdbx` table flags this signature requires.
    #[must_use]
    pub fn table_flags(self) -> TableFlags {
        if self.with_dups {
            TableFlags::DUP_SORT
        } else {
            TableFlags::empty()
        }
    }

    /// Verify that `self` agrees with the physical `libmdbx` flags a
    /// pre-existing sub-database was actually opened with. Only the
    /// `with_dups`/`DUP_SORT` bit is physically recorded by `libmdbx`
    /// itself — `ordered`/`direction` are baked into the stored bytes by
    /// [`crate::keycode`]/[`crate::composite`] rather than into any MDBX
    /// flag, so they have nothing to check here.
    ///
    /// # Errors
    /// [`Error::Cursor`] if `self.with_dups` disagrees with whether
    /// `flags` carries `DUP_SORT` — the engine refuses to reopen a
    /// sub-database under a dup-ness it wasn't created with.
    pub fn verify_flags(self, flags: TableFlags) -> Result<()> {
        if self.with_dups == flags.contains(TableFlags::DUP_SORT) {
            Ok(())
        } else {
            Err(Error::Cursor)
        }
    }
}
