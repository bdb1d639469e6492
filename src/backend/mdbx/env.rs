//! Implementation of `trait Env` for `mdbx`.

//---------------------------------------------------------------------------------------------------- Import
use std::{
    ops::Range,
    sync::{atomic::AtomicU64, Arc},
};

use libmdbx::{Geometry, PageSize};

use crate::{
    config::{Config, SyncMode},
    env::Env,
    error::{Error, Result},
    macros::{error2, trace2},
};

//---------------------------------------------------------------------------------------------------- Constants
const MDBX_MAX_MAP_SIZE: usize = 4 * 1024_usize.pow(3); // 4TB, MDBX grows into this lazily.
const MDBX_GROWTH_STEP: isize = 100 * 1024_isize.pow(2); // 100MB
const MDBX_PAGE_SIZE: Option<PageSize> = None;
const MDBX_GEOMETRY: Geometry<Range<usize>> = Geometry {
    size: Some(0..MDBX_MAX_MAP_SIZE),
    growth_step: Some(MDBX_GROWTH_STEP),
    shrink_threshold: None,
    page_size: MDBX_PAGE_SIZE,
};

/// Maximum number of named sub-databases (one per table index) a single
/// environment may hold open at once.
const MDBX_MAX_TABLES: usize = 4096;

fn sync_mode_to_mdbx(mode: SyncMode) -> libmdbx::SyncMode {
    match mode {
        SyncMode::Safe => libmdbx::SyncMode::Durable,
        SyncMode::Fastest => libmdbx::SyncMode::UtterlyNoSync,
    }
}

//---------------------------------------------------------------------------------------------------- ConcreteEnv
/// A strongly typed, concrete database environment, backed by `libmdbx`.
pub struct ConcreteEnv {
    /// The actual database environment.
    ///
    /// # `WriteMap` usage
    /// Reference: <https://erthink.github.io/libmdbx/intro.html>.
    pub(crate) env: libmdbx::Database<libmdbx::WriteMap>,

    /// The configuration we were opened with (and in current use).
    config: Config,

    /// Bumped once per successful write/schema commit. A [`ReadTxn`](
    /// crate::txn::ReadTxn) captures this counter's value at creation; the
    /// gap between that snapshot and the live value is how far behind the
    /// latest commit the reader is (`lag_ex`).
    commit_seq: Arc<AtomicU64>,
}

impl ConcreteEnv {
    /// A handle to the shared commit-sequence counter, for
    /// [`crate::txn::ReadTxn::lag_ex`]/[`crate::txn::WriteTxn::commit`].
    pub(crate) fn commit_seq(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.commit_seq)
    }
}

impl Drop for ConcreteEnv {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            error2!("failed to sync environment on drop: {e}");
        }
    }
}

//---------------------------------------------------------------------------------------------------- Env Impl
impl Env for ConcreteEnv {
    // MDBX resizes automatically, with customizable settings:
    // <https://erthink.github.io/libmdbx/group__c__settings.html#ga79065e4f3c5fb2ad37a52b59224d583e>.
    const MANUAL_RESIZE: bool = false;
    const SYNCS_PER_TX: bool = false;

    type RoTx<'db> = libmdbx::Transaction<'db, libmdbx::RO, libmdbx::WriteMap>;
    type RwTx<'db> = libmdbx::Transaction<'db, libmdbx::RW, libmdbx::WriteMap>;

    #[cold]
    #[inline(never)] // called once.
    fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.db_directory).map_err(|_| Error::Einval)?;

        trace2!("opening mdbx environment at {:?}", config.db_directory);

        let env = libmdbx::Database::<libmdbx::WriteMap>::new()
            .set_geometry(MDBX_GEOMETRY)
            .set_max_tables(MDBX_MAX_TABLES)
            .set_sync_mode(sync_mode_to_mdbx(config.sync_mode))
            .open(&config.db_directory)?;

        Ok(Self { env, config, commit_seq: Arc::new(AtomicU64::new(0)) })
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn sync(&self) -> Result<()> {
        self.env.sync(true)?;
        Ok(())
    }

    #[inline]
    fn ro_tx(&self) -> Result<Self::RoTx<'_>> {
        Ok(self.env.begin_ro_txn()?)
    }

    #[inline]
    fn rw_tx(&self) -> Result<Self::RwTx<'_>> {
        Ok(self.env.begin_rw_txn()?)
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sync_mode_maps_both_variants() {
        assert!(matches!(sync_mode_to_mdbx(SyncMode::Safe), libmdbx::SyncMode::Durable));
        assert!(matches!(
            sync_mode_to_mdbx(SyncMode::Fastest),
            libmdbx::SyncMode::UtterlyNoSync
        ));
    }
}
