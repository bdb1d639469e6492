//! Implementation of `trait RoTx`/`trait RwTx` for `mdbx`.

//---------------------------------------------------------------------------------------------------- Import
use crate::{
    error::Result,
    transaction::{RoTx, RwTx},
};

//---------------------------------------------------------------------------------------------------- RoTx
impl<'db> RoTx<'db> for libmdbx::Transaction<'db, libmdbx::RO, libmdbx::WriteMap> {
    fn commit(self) -> Result<()> {
        self.commit()?;
        Ok(())
    }
}

//---------------------------------------------------------------------------------------------------- RwTx
impl<'db> RwTx<'db> for libmdbx::Transaction<'db, libmdbx::RW, libmdbx::WriteMap> {
    fn commit(self) -> Result<()> {
        self.commit()?;
        Ok(())
    }

    fn abort(self) {
        drop(self);
    }
}
