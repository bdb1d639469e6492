//! Available-parallelism helper used by [`crate::config::ReaderThreads`].

use std::{num::NonZeroUsize, sync::OnceLock};

const NON_ZERO_USIZE_1: NonZeroUsize = NonZeroUsize::MIN;

static THREADS_CELL: OnceLock<NonZeroUsize> = OnceLock::new();

/// The number of threads available on this machine, cached after first
/// call. Falls back to `1` if the OS can't report a figure.
pub fn thread_count() -> NonZeroUsize {
    *THREADS_CELL.get_or_init(|| {
        std::thread::available_parallelism().unwrap_or(NON_ZERO_USIZE_1)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn thread_count_is_stable() {
        assert_eq!(thread_count(), thread_count());
    }
}
