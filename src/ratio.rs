//! Ratio and relative-shift computations

use crate::{error::PipelineError, histogram::Histogram, numeric::Float};

/// Relative deviation of `numerator` with respect to `denominator`
///
/// Computes numerator/denominator - 1 bin by bin, so that agreement shows up
/// as zero. Bins where the denominator is empty keep the numerator content
/// (see `Histogram::divide`), and the -1 offset is only applied to bins with
/// a positive ratio, so that empty bins stay at zero instead of showing up
/// as a spurious -100% deviation.
///
pub fn deviation(
    numerator: &Histogram,
    denominator: &Histogram,
    name: &str,
) -> Result<Histogram, PipelineError> {
    let mut ratio = numerator.clone_named(name);
    ratio.divide(denominator)?;
    for bin in 0..ratio.num_bins() {
        let content = ratio.content(bin);
        if content > 0. {
            ratio.set_content(bin, content - 1.);
        }
    }
    Ok(ratio)
}

/// Integral of a group of processes before and after the fit corrections
#[derive(Clone, Debug, PartialEq)]
pub struct RelativeShift {
    /// Name of the process group
    pub group: &'static str,

    /// Integral before rescaling
    pub before: Float,

    /// Integral after rescaling
    pub after: Float,
}
//
impl RelativeShift {
    /// Relative change of the integral, or zero if there was nothing to scale
    pub fn value(&self) -> Float {
        if self.before > 0. {
            self.after / self.before - 1.
        } else {
            0.
        }
    }
}

/// One histogram per shift, with only the bin of that shift filled
///
/// This is the layout expected by the side-by-side bar display, where each
/// group gets its own color.
///
pub fn shift_histograms(shifts: &[RelativeShift]) -> Vec<Histogram> {
    let num_bins = shifts.len().max(1);
    shifts
        .iter()
        .enumerate()
        .map(|(bin, shift)| {
            let mut hist = Histogram::uniform(
                format!("scales-{}", shift.group),
                num_bins,
                0.,
                num_bins as Float,
            );
            hist.set_content(bin, shift.value());
            hist
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::tests::hist;
    use approx::assert_relative_eq;

    #[test]
    fn data_over_model() {
        let data = hist("data_obs", 1., &[4., 8., 0.], &[2., 2., 0.]);
        let model = hist("Ztt", 1., &[5., 10., 10.], &[0., 0., 0.]);
        let ratio = deviation(&data, &model, "rat1").unwrap();
        assert_eq!(ratio.name(), "rat1");
        assert_relative_eq!(ratio.content(0), -0.2, epsilon = 1e-6);
        assert_relative_eq!(ratio.content(1), -0.2, epsilon = 1e-6);
        assert_eq!(ratio.content(2), 0.);
        // The inputs are left untouched
        assert_eq!(data.content(0), 4.);
    }

    #[test]
    fn empty_denominator_keeps_numerator_offset() {
        let post = hist("post", 1., &[3.], &[0.]);
        let pre = hist("pre", 1., &[0.], &[0.]);
        assert_eq!(deviation(&post, &pre, "rat2").unwrap().content(0), 2.);
    }

    #[test]
    fn relative_shift_guard() {
        let shift = RelativeShift {
            group: "Ztt",
            before: 0.,
            after: 3.,
        };
        assert_eq!(shift.value(), 0.);
        let shift = RelativeShift {
            group: "Ztt",
            before: 30.,
            after: 33.,
        };
        assert_relative_eq!(shift.value(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn one_bin_per_shift() {
        let shifts = [
            RelativeShift {
                group: "Fakes",
                before: 10.,
                after: 5.,
            },
            RelativeShift {
                group: "EWK",
                before: 10.,
                after: 12.,
            },
        ];
        let hists = shift_histograms(&shifts);
        assert_eq!(hists.len(), 2);
        assert_eq!(hists[0].name(), "scales-Fakes");
        assert_eq!(hists[0].contents().as_slice(), &[-0.5, 0.]);
        assert_relative_eq!(hists[1].content(1), 0.2, epsilon = 1e-6);
        assert_eq!(hists[1].content(0), 0.);
    }
}
