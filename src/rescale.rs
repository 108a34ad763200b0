//! Application of the fit-derived corrections to the process histograms
//!
//! The corrections themselves are computed upstream by the maximum likelihood
//! fit, and reach us as a table which maps each input histogram name to one
//! correction rule.

use crate::{
    error::PipelineError, histogram::Histogram, numeric::Float, process::Registry, Result,
};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use std::{collections::BTreeMap, fmt, fs, path::Path};

/// Correction of one process histogram
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleRule {
    /// Multiply every bin (content and uncertainty) by a constant
    Scale(Float),

    /// Add a per-bin offset to the contents
    Shift {
        /// Offset of each bin content
        content: Vec<Float>,
    },

    /// Replace the contents and uncertainties with fitted values
    Replace {
        /// New bin contents
        content: Vec<Float>,
        /// New bin uncertainties
        uncertainty: Vec<Float>,
    },
}
//
impl ScaleRule {
    /// Apply this correction to a histogram, in place
    ///
    /// Corrections compound: applying the same rule twice applies the
    /// correction twice.
    ///
    fn apply(&self, hist: &mut Histogram) -> std::result::Result<(), String> {
        let num_bins = hist.num_bins();
        let check_len = move |len: usize| {
            if len == num_bins {
                Ok(())
            } else {
                Err(format!("{} values for {} bins", len, num_bins))
            }
        };
        match self {
            Self::Scale(factor) => hist.scale(*factor),
            Self::Shift { content } => {
                check_len(content.len())?;
                for (bin, &delta) in content.iter().enumerate() {
                    hist.set_content(bin, hist.content(bin) + delta);
                }
            }
            Self::Replace {
                content,
                uncertainty,
            } => {
                check_len(content.len())?;
                check_len(uncertainty.len())?;
                if uncertainty.iter().any(|&u| u < 0.) {
                    return Err("negative uncertainty".to_owned());
                }
                for (bin, (&value, &error)) in content.iter().zip(uncertainty).enumerate() {
                    hist.set_content(bin, value);
                    hist.set_uncertainty(bin, error);
                }
            }
        }
        Ok(())
    }
}
//
impl fmt::Display for ScaleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale(factor) => write!(f, "scale by {}", factor),
            Self::Shift { content } => write!(f, "shift {} bins", content.len()),
            Self::Replace { content, .. } => write!(f, "replace {} bins", content.len()),
        }
    }
}

/// Fit-derived correction of each process, keyed by input histogram name
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScaleTable(BTreeMap<String, ScaleRule>);
//
impl ScaleTable {
    /// Load a correction table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read fit result {}", path.display()))?;
        serde_json::from_str(&json)
            .wrap_err_with(|| format!("Could not decode fit result {}", path.display()))
    }

    /// Correction of a given process, if the fit provided one
    pub fn get(&self, input_name: &str) -> Option<&ScaleRule> {
        self.0.get(input_name)
    }

    /// Input names of every corrected process
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    /// Register the correction of a process
    pub fn insert(&mut self, input_name: impl Into<String>, rule: ScaleRule) {
        self.0.insert(input_name.into(), rule);
    }
}

/// Rescale a process histogram according to the fit result
///
/// `fit_index` must designate a process of the active registry, otherwise
/// the configuration is inconsistent and an error is returned. Processes for
/// which the fit provided no correction are left untouched.
///
pub fn rescale(
    hist: &mut Histogram,
    fit_index: usize,
    registry: &Registry,
    table: &ScaleTable,
) -> std::result::Result<(), PipelineError> {
    let (_, process) = registry.by_fit_index(fit_index)?;
    let Some(rule) = table.get(&process.input_name) else {
        tracing::warn!(
            process = %process.input_name,
            "no fit correction available, histogram left unchanged"
        );
        return Ok(());
    };
    tracing::info!(process = %process.input_name, fit_index, "{}", rule);
    rule.apply(hist)
        .map_err(|reason| PipelineError::BadCorrection {
            process: process.input_name.clone(),
            reason,
        })
}
