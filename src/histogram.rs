//! Minimal one-dimensional binned histogram
//!
//! This is deliberately not a general histogram library. It only supports the
//! handful of bin-level operations needed to turn stored event-count
//! histograms into the densities, stacks and ratios that end up on the plots.
//!
//! Bin edges are fixed at construction time. Only bin contents and bin
//! uncertainties are ever mutated afterwards.

use crate::{
    error::PipelineError,
    numeric::{BinVector, Float},
    Result,
};

use eyre::ensure;

/// One-dimensional histogram with per-bin content and uncertainty
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// Name under which the histogram is stored or displayed
    name: String,

    /// Bin edges, strictly increasing, one more than there are bins
    edges: Vec<Float>,

    /// Bin contents
    content: BinVector,

    /// Bin uncertainties (non-negative)
    uncertainty: BinVector,
}
//
impl Histogram {
    /// Build a histogram from raw parts, checking their consistency
    pub fn from_parts(
        name: impl Into<String>,
        edges: Vec<Float>,
        content: Vec<Float>,
        uncertainty: Vec<Float>,
    ) -> Result<Self> {
        let name = name.into();
        ensure!(
            edges.len() >= 2,
            "Histogram {} must have at least one bin",
            name
        );
        ensure!(
            edges.windows(2).all(|w| w[0] < w[1]),
            "Bin edges of histogram {} must be strictly increasing",
            name
        );
        let num_bins = edges.len() - 1;
        ensure!(
            content.len() == num_bins && uncertainty.len() == num_bins,
            "Histogram {} has {} bins but {} contents and {} uncertainties",
            name,
            num_bins,
            content.len(),
            uncertainty.len()
        );
        ensure!(
            uncertainty.iter().all(|&u| u >= 0.),
            "Histogram {} has negative bin uncertainties",
            name
        );
        Ok(Self {
            name,
            edges,
            content: BinVector::from_vec(content),
            uncertainty: BinVector::from_vec(uncertainty),
        })
    }

    /// Build an empty histogram with `num_bins` bins of equal width
    pub fn uniform(name: impl Into<String>, num_bins: usize, low: Float, high: Float) -> Self {
        assert!(num_bins > 0, "A histogram needs at least one bin");
        assert!(low < high, "Histogram range must not be empty");
        let width = (high - low) / num_bins as Float;
        let edges = (0..=num_bins)
            .map(|i| if i == num_bins { high } else { low + i as Float * width })
            .collect();
        Self {
            name: name.into(),
            edges,
            content: BinVector::zeros(num_bins),
            uncertainty: BinVector::zeros(num_bins),
        }
    }

    /// Name of this histogram
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone this histogram under a different name
    pub fn clone_named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Number of bins
    pub fn num_bins(&self) -> usize {
        self.content.len()
    }

    /// Bin edges
    pub fn edges(&self) -> &[Float] {
        &self.edges[..]
    }

    /// Width of bin `bin`
    pub fn bin_width(&self, bin: usize) -> Float {
        self.edges[bin + 1] - self.edges[bin]
    }

    /// Center of bin `bin`
    pub fn bin_center(&self, bin: usize) -> Float {
        0.5 * (self.edges[bin] + self.edges[bin + 1])
    }

    /// Index of the bin which contains `x`, if any
    ///
    /// Bins are half-open, [low, high), except for the last one which also
    /// includes its upper edge.
    ///
    pub fn find_bin(&self, x: Float) -> Option<usize> {
        let last = *self.edges.last()?;
        if x < self.edges[0] || x > last {
            return None;
        }
        let upper = self.edges.partition_point(|&edge| edge <= x);
        Some(upper.saturating_sub(1).min(self.num_bins() - 1))
    }

    /// Content of bin `bin`
    pub fn content(&self, bin: usize) -> Float {
        self.content[bin]
    }

    /// Uncertainty of bin `bin`
    pub fn uncertainty(&self, bin: usize) -> Float {
        self.uncertainty[bin]
    }

    /// All bin contents
    pub fn contents(&self) -> &BinVector {
        &self.content
    }

    /// All bin uncertainties
    pub fn uncertainties(&self) -> &BinVector {
        &self.uncertainty
    }

    /// Overwrite the content of bin `bin`
    pub fn set_content(&mut self, bin: usize, value: Float) {
        self.content[bin] = value;
    }

    /// Overwrite the uncertainty of bin `bin`
    pub fn set_uncertainty(&mut self, bin: usize, value: Float) {
        debug_assert!(value >= 0., "Uncertainties must not be negative");
        self.uncertainty[bin] = value;
    }

    /// Zero all contents and uncertainties, keeping the binning
    pub fn clear(&mut self) {
        self.content.fill(0.);
        self.uncertainty.fill(0.);
    }

    /// Density version of this histogram: content and uncertainty of every
    /// bin are divided by the bin width
    pub fn to_density(&self) -> Self {
        let mut density = self.clone();
        for bin in 0..self.num_bins() {
            let width = self.bin_width(bin);
            density.content[bin] /= width;
            density.uncertainty[bin] /= width;
        }
        density
    }

    /// Sum of the bin contents, as currently stored
    ///
    /// No bin width weighting is applied, so this is only meaningful when
    /// comparing histograms which were brought to the same scale.
    ///
    pub fn integral(&self) -> Float {
        self.content.sum()
    }

    /// Largest bin content (zero for an all-negative histogram)
    pub fn maximum(&self) -> Float {
        self.content.iter().copied().fold(0., Float::max)
    }

    /// Multiply contents and uncertainties by a constant factor
    pub fn scale(&mut self, factor: Float) {
        self.content *= factor;
        self.uncertainty *= factor.abs();
    }

    /// Truth that `other` uses the same bin edges
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.edges == other.edges
    }

    /// Accumulate the contents of `other` into this histogram
    ///
    /// Only contents are accumulated. Uncertainties of the destination are
    /// left as they are: once histograms are stacked, the uncertainties of
    /// the individual simulated components are not displayed anymore, and
    /// the observed data is never part of a sum.
    ///
    pub fn add(&mut self, other: &Histogram) -> std::result::Result<(), PipelineError> {
        self.check_binning(other)?;
        self.content += &other.content;
        Ok(())
    }

    /// Divide this histogram by `divisor`, bin by bin
    ///
    /// Bins where the divisor content is zero are skipped and keep their
    /// original content and uncertainty. The divisor is treated as exact, so
    /// uncertainties of divided bins are scaled like their contents.
    ///
    pub fn divide(&mut self, divisor: &Histogram) -> std::result::Result<(), PipelineError> {
        self.check_binning(divisor)?;
        for ((content, uncertainty), &denom) in self
            .content
            .iter_mut()
            .zip(self.uncertainty.iter_mut())
            .zip(divisor.content.iter())
        {
            if denom != 0. {
                *content /= denom;
                *uncertainty /= denom.abs();
            }
        }
        Ok(())
    }

    /// Make sure that a bin-wise operation with `other` makes sense
    fn check_binning(&self, other: &Histogram) -> std::result::Result<(), PipelineError> {
        if self.same_binning(other) {
            Ok(())
        } else {
            Err(PipelineError::BinningMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            })
        }
    }
}
