//! Sequential back-end of the category scheduler

use crate::Result;

/// Process categories one after the other
pub fn run_categories_impl<T>(
    categories: &[String],
    process: impl Fn(&str) -> Result<T>,
) -> Result<Vec<T>> {
    categories
        .iter()
        .map(|category| {
            let _span = tracing::info_span!("category", name = %category).entered();
            process(category)
        })
        .collect()
}
