//! Abstracted database environment; `trait Env`.

//---------------------------------------------------------------------------------------------------- Import
use crate::{
    config::Config,
    error::Result,
    transaction::{RoTx, RwTx},
};

//---------------------------------------------------------------------------------------------------- Env
/// Database environment abstraction.
///
/// This is the seam between [`crate::db::Db`] and the concrete key/value
/// backend. `fastpt` ships exactly one implementation
/// ([`crate::backend::mdbx::ConcreteEnv`]), kept behind this trait so the
/// rest of the crate never names `libmdbx` types directly.
///
/// # `Drop`
/// Implementors should sync on drop, although no invariant relies on it.
pub trait Env: Sized {
    /// Does the backend need its memory map manually resized when full?
    ///
    /// `fastpt`'s sole backend (MDBX) auto-resizes, so this is always
    /// `false` here; the constant exists so a future backend could opt
    /// back into manual resizing without changing this trait's shape.
    const MANUAL_RESIZE: bool;

    /// Does the backend forcefully sync to disk on every commit,
    /// independent of [`crate::config::SyncMode`]?
    const SYNCS_PER_TX: bool;

    /// Read-only transaction type.
    type RoTx<'db>: RoTx<'db>
    where
        Self: 'db;

    /// Read-write transaction type.
    type RwTx<'db>: RwTx<'db>
    where
        Self: 'db;

    /// Open (creating if necessary) the environment described by `config`.
    ///
    /// # Errors
    /// Returns an error if the backing directory can't be created/opened.
    fn open(config: Config) -> Result<Self>;

    /// The [`Config`] this environment was [`Env::open`]ed with.
    fn config(&self) -> &Config;

    /// Force a flush to disk.
    ///
    /// # Errors
    /// Returns an error if the underlying sync call fails.
    fn sync(&self) -> Result<()>;

    /// Begin a read-only transaction.
    ///
    /// # Errors
    /// Returns an error if the backend can't allocate a reader slot.
    fn ro_tx(&self) -> Result<Self::RoTx<'_>>;

    /// Begin a read-write transaction.
    ///
    /// # Errors
    /// Returns an error if another writer already holds the exclusive
    /// write lock, or the backend can't begin the transaction.
    fn rw_tx(&self) -> Result<Self::RwTx<'_>>;
}
