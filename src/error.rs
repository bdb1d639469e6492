//! The closed error set returned by every fallible operation in this crate.

//---------------------------------------------------------------------------------------------------- Error
/// All errors this crate can return.
///
/// This is a closed enum: no variant is added or removed without a
/// semver-major bump, and every public function that can fail returns
/// `Result<_, Error>` rather than panicking on a recoverable condition.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested row, table, or index does not exist.
    #[error("not found")]
    NotFound,

    /// A cursor positioned within a range found no matching entry.
    #[error("no data")]
    NoData,

    /// A row with a colliding unique key already exists.
    #[error("key already exists")]
    KeyExists,

    /// A value's encoded byte representation does not match the column's
    /// declared type.
    #[error("type mismatch")]
    TypeMismatch,

    /// A value is outside the representable domain of its column type,
    /// e.g. an `f64` that overflows an `f32` column under the strict
    /// precision profile.
    #[error("value out of domain")]
    OutOfDomain,

    /// A fixed-length column (`bin96`, `bin128`, `bin160`, `bin256`)
    /// received a value of the wrong byte length.
    #[error("length mismatch")]
    LengthMismatch,

    /// A non-nullable column was missing from a row.
    #[error("column missing")]
    ColumnMissing,

    /// An index/column flag combination is not legal.
    #[error("invalid flags")]
    FlagInvalid,

    /// A table, column, or index name fails the naming rules.
    #[error("invalid name")]
    NameInvalid,

    /// A column's declared type is not a member of the closed type set, or
    /// is incompatible with the requested index flags.
    #[error("invalid type")]
    TypeInvalid,

    /// A composite secondary index is a strictly redundant prefix of an
    /// existing simple index with compatible direction and uniqueness.
    #[error("similar index already exists")]
    SimilarIndex,

    /// An operation that requires an ordered index (a concrete range, or
    /// `locate` with `exactly = false`) was attempted against an
    /// unordered (hashed) index.
    #[error("operation requires an ordered index")]
    NoIndex,

    /// A name handle's observed schema epoch no longer matches the
    /// catalog's current version; the caller must refresh the handle.
    #[error("schema has changed, refresh required")]
    SchemaChanged,

    /// The write/schema transaction this handle belongs to was already
    /// cancelled by a prior uniqueness violation and is only valid for
    /// `end()`.
    #[error("transaction was cancelled")]
    TxnCancelled,

    /// The underlying map is full; commit failed atomically.
    #[error("database is full")]
    DbFull,

    /// A cursor is unset (past the end of its range, or never positioned)
    /// and the requested operation requires a current position.
    #[error("cursor has no current position")]
    Cursor,

    /// A cursor-driven `update()` attempted to change the derived key of
    /// the index the cursor is iterating.
    #[error("update would change the cursor's own index key")]
    KeyMismatch,

    /// An operation was attempted that is structurally impossible given
    /// the current engine state, e.g. a DBI reopened under a comparator
    /// signature that disagrees with its catalog record.
    #[error("internal consistency error")]
    Eoops,

    /// An invalid argument was passed to an API that validates its
    /// inputs, e.g. a malformed range.
    #[error("invalid argument")]
    Einval,

    /// A failure surfaced directly from the underlying key/value store.
    #[error("storage engine error: {0}")]
    Storage(#[from] libmdbx::Error),
}

/// Shorthand for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_is_stable() {
        assert_eq!(Error::NotFound.to_string(), "not found");
        assert_eq!(Error::SchemaChanged.to_string(), "schema has changed, refresh required");
    }
}
