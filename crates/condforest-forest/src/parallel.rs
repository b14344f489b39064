//! Thread-count hints for rayon-parallel operations.

use tracing::debug;

use crate::error::ForestError;

/// Run `op` on a dedicated pool of `threads` workers, or on the global rayon
/// pool when `threads` is `None`.
///
/// `Some(0)` lets rayon pick its default. Results never depend on the pool
/// size: callers only parallelize over independent rows or trees.
///
/// # Errors
///
/// Returns [`ForestError::ThreadPool`] if the dedicated pool cannot be built.
pub fn with_thread_hint<T, F>(threads: Option<usize>, op: F) -> Result<T, ForestError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match threads {
        None => Ok(op()),
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|source| ForestError::ThreadPool { threads, source })?;
            debug!(threads = pool.current_num_threads(), "using dedicated thread pool");
            Ok(pool.install(op))
        }
    }
}
