//! Failures of the histogram transformation pipeline
//!
//! These are the domain errors that must stop the processing of a category.
//! Arithmetic corner cases (empty bins, empty integrals) are not errors: they
//! are handled by the zero-guard policies of the histogram and ratio code.

use thiserror::Error;

/// Fatal pipeline failures
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// A required histogram is absent from the histogram source
    #[error("histogram not found: {category}/{process}")]
    MissingInput {
        /// Category (directory) which was searched
        category: String,
        /// Name of the missing histogram
        process: String,
    },

    /// A fit index which the active process registry does not define
    #[error("no process with fit index {index} in the {hypothesis} registry")]
    UnknownProcess {
        /// Requested fit index
        index: usize,
        /// Human-readable description of the active registry
        hypothesis: String,
    },

    /// A process name which the active process registry does not define
    #[error("process {0:?} is not known to the active registry")]
    UnknownProcessName(String),

    /// Bin-wise operation between histograms of different binnings
    #[error("incompatible binnings: {left} vs {right}")]
    BinningMismatch {
        /// Name of the destination histogram
        left: String,
        /// Name of the source histogram
        right: String,
    },

    /// A fit correction that cannot be applied to its target histogram
    #[error("cannot apply fit correction of {process}: {reason}")]
    BadCorrection {
        /// Process whose correction is malformed
        process: String,
        /// What is wrong with it
        reason: String,
    },
}
