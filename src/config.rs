//! Database [`Env`] configuration.

//---------------------------------------------------------------------------------------------------- Import
use std::{num::NonZeroUsize, path::PathBuf};

#[allow(unused_imports)] // docs
use crate::env::Env;

//---------------------------------------------------------------------------------------------------- Config
/// [`Env`] configuration.
///
/// This is the struct passed to [`Env::open`] that allows the database
/// environment to be configured in various ways.
#[derive(Clone, PartialEq, PartialOrd, Debug)]
pub struct Config {
    /// Directory the environment's backing files live in.
    pub db_directory: PathBuf,

    /// How aggressively to flush to disk on commit.
    pub sync_mode: SyncMode,

    /// How many reader slots/threads the environment should permit.
    pub reader_threads: ReaderThreads,
}

impl Config {
    /// The default configuration: safe sync, one reader slot per available
    /// thread.
    pub fn new(db_directory: PathBuf) -> Self {
        Self {
            db_directory,
            sync_mode: SyncMode::Safe,
            reader_threads: ReaderThreads::OnePerThread,
        }
    }

    /// Prioritize write throughput over durability.
    pub fn fast(db_directory: PathBuf) -> Self {
        Self {
            db_directory,
            sync_mode: SyncMode::Fastest,
            reader_threads: ReaderThreads::OnePerThread,
        }
    }

    /// Prioritize low resource usage (a single reader slot) over
    /// throughput.
    pub fn low_power(db_directory: PathBuf) -> Self {
        Self {
            db_directory,
            sync_mode: SyncMode::Safe,
            reader_threads: ReaderThreads::One,
        }
    }
}

//---------------------------------------------------------------------------------------------------- SyncMode
/// Durability vs. throughput tradeoff for commits.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Eq, Ord, Hash, Debug)]
pub enum SyncMode {
    /// Fully sync to disk per transaction.
    #[default]
    Safe,
    /// Asynchronously sync, only flush at environment shutdown.
    Fastest,
}

//---------------------------------------------------------------------------------------------------- ReaderThreads
/// How many concurrent reader slots the environment should size itself for.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Debug)]
pub enum ReaderThreads {
    #[default]
    /// One reader slot per available OS thread.
    OnePerThread,

    /// A single reader slot.
    One,

    /// An explicit reader slot count, clamped to the available thread
    /// count.
    Number(NonZeroUsize),

    /// A percentage (`0.0..=1.0`) of the available thread count.
    Percent(f32),
}

impl ReaderThreads {
    /// Resolve `self` against the number of threads actually available on
    /// this machine.
    pub fn as_threads(&self) -> NonZeroUsize {
        let total_threads = crate::thread::thread_count();

        match self {
            Self::OnePerThread => total_threads,
            Self::One => NonZeroUsize::MIN,
            Self::Number(n) => std::cmp::min(*n, total_threads),

            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            Self::Percent(f) => {
                if !f.is_normal() || !(0.0..=1.0).contains(f) {
                    return total_threads;
                }

                let thread_percent = (total_threads.get() as f32) * f;
                let Some(threads) = NonZeroUsize::new(thread_percent as usize) else {
                    return total_threads;
                };

                std::cmp::min(threads, total_threads)
            }
        }
    }
}
