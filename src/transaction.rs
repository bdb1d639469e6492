//! Per-backend transaction primitives; `trait RoTx`, `trait RwTx`.
//!
//! These sit one level below [`crate::txn`]'s transaction manager: they
//! are the raw commit/abort handle a backend ([`crate::backend::mdbx`])
//! hands back, with none of the schema-epoch or cancellation bookkeeping
//! component H adds on top.

//---------------------------------------------------------------------------------------------------- Import
use crate::error::Result;

//---------------------------------------------------------------------------------------------------- RoTx
/// Read-only database transaction.
pub trait RoTx<'db> {
    /// Release the transaction's snapshot.
    ///
    /// # Errors
    /// Read-only commits only fail if the backend itself fails.
    fn commit(self) -> Result<()>;
}

//---------------------------------------------------------------------------------------------------- RwTx
/// Read/write database transaction.
pub trait RwTx<'db> {
    /// Make this transaction's writes durable and visible.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::DbFull`] if the map is full, or a
    /// backend-specific failure. Either way, no partial writes are
    /// visible afterwards.
    fn commit(self) -> Result<()>;

    /// Discard this transaction's writes.
    fn abort(self);
}
