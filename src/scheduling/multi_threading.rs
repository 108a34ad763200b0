//! Multi-threaded back-end of the category scheduler

use crate::Result;

use rayon::prelude::*;

/// Process categories in parallel on the rayon thread pool
///
/// Collecting into a `Result<Vec<_>>` preserves the input ordering, so the
/// output is the same as in sequential mode.
///
pub fn run_categories_impl<T: Send>(
    categories: &[String],
    process: impl Send + Sync + Fn(&str) -> Result<T>,
) -> Result<Vec<T>> {
    tracing::debug!(
        threads = rayon::current_num_threads(),
        "processing categories in parallel"
    );
    categories
        .par_iter()
        .map(|category| {
            let _span = tracing::info_span!("category", name = %category).entered();
            process(category)
        })
        .collect()
}
