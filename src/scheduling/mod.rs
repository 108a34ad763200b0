//! This module takes care of scheduling the per-category work, encapsulating
//! use of multiple threads

#[cfg(feature = "multi-threading")]
mod multi_threading;
#[cfg(not(feature = "multi-threading"))]
mod sequential;

use crate::Result;

/// Process every category in the manner that was configured at build time
///
/// Categories are independent from each other, so they may be processed in
/// any order, but results are returned in the order of `categories`. The
/// first failure aborts the whole run.
///
pub fn run_categories<T: Send>(
    categories: &[String],
    process: impl Send + Sync + Fn(&str) -> Result<T>,
) -> Result<Vec<T>> {
    // ...in sequential mode
    #[cfg(not(feature = "multi-threading"))]
    {
        sequential::run_categories_impl(categories, process)
    }

    // ...in multi-threaded mode
    #[cfg(feature = "multi-threading")]
    {
        multi_threading::run_categories_impl(categories, process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::bail;

    fn categories() -> Vec<String> {
        ["muTau_0jet_low", "muTau_1jet_high", "muTau_vbf"]
            .iter()
            .map(|&c| c.to_owned())
            .collect()
    }

    #[test]
    fn results_follow_category_order() {
        let lengths = run_categories(&categories(), |category| Ok(category.len())).unwrap();
        assert_eq!(lengths, [14, 15, 9]);
    }

    #[test]
    fn failures_abort_the_run() {
        let result = run_categories(&categories(), |category| {
            if category.ends_with("vbf") {
                bail!("No input for {}", category)
            }
            Ok(())
        });
        assert!(result.unwrap_err().to_string().contains("muTau_vbf"));
    }
}
