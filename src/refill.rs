//! Conversion of stored event-count histograms into display densities

use crate::{error::PipelineError, histogram::Histogram, numeric::Float};

use eyre::{bail, Error};

use std::{fmt, str::FromStr};

/// Which bins of the observed data must be hidden
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Blinding {
    /// Show all the data
    Off,

    /// Hide all the data
    Full,

    /// Hide bins whose center lies above a mass threshold
    Above(Float),

    /// Hide bins whose center lies strictly between two mass bounds
    Window(Float, Float),
}
//
impl Blinding {
    /// Truth that a data bin centered on `mass` must be hidden
    pub fn hides(self, mass: Float) -> bool {
        match self {
            Self::Off => false,
            Self::Full => true,
            Self::Above(threshold) => threshold < mass,
            Self::Window(low, high) => low < mass && mass < high,
        }
    }
}
//
impl FromStr for Blinding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let words = s.split_whitespace().collect::<Vec<_>>();
        let number = |word: &str| -> Result<Float, Error> { Ok(word.parse::<Float>()?) };
        match words[..] {
            ["off"] => Ok(Self::Off),
            ["full"] => Ok(Self::Full),
            ["above", threshold] => Ok(Self::Above(number(threshold)?)),
            ["window", low, high] => Ok(Self::Window(number(low)?, number(high)?)),
            _ => bail!(
                "Unknown blinding policy {:?} (expected off, full, above T or window T1 T2)",
                s
            ),
        }
    }
}
//
impl fmt::Display for Blinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Full => write!(f, "full"),
            Self::Above(threshold) => write!(f, "above {}", threshold),
            Self::Window(low, high) => write!(f, "window {} {}", low, high),
        }
    }
}

/// Turn a raw histogram into a density histogram
///
/// Every bin content is divided by its bin width. For simulated samples, the
/// uncertainties are zeroed, since only the observed data is displayed with
/// error bars. For the observed data, uncertainties are divided by the bin
/// width too, and bins which fall inside the blinding region are zeroed.
///
/// A missing input histogram is a fatal error: the comparison would be
/// meaningless without it.
///
pub fn refill(
    raw: Option<&Histogram>,
    category: &str,
    sample: &str,
    data_blinding: Option<Blinding>,
) -> Result<Histogram, PipelineError> {
    let raw = raw.ok_or_else(|| PipelineError::MissingInput {
        category: category.to_owned(),
        process: sample.to_owned(),
    })?;
    let mut density = raw.to_density();
    for bin in 0..density.num_bins() {
        match data_blinding {
            Some(blinding) if blinding.hides(raw.bin_center(bin)) => {
                density.set_content(bin, 0.);
                density.set_uncertainty(bin, 0.);
            }
            Some(_) => {}
            None => density.set_uncertainty(bin, 0.),
        }
    }
    tracing::debug!(
        category,
        sample,
        integral = density.integral() as f64,
        "refilled histogram"
    );
    Ok(density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::tests::hist;
    use approx::assert_relative_eq;

    #[test]
    fn simulation_loses_its_uncertainties() {
        let raw = hist("A", 2., &[10., 20., 30.], &[1., 2., 3.]);
        let density = refill(Some(&raw), "cat", "A", None).unwrap();
        assert_eq!(density.contents().as_slice(), &[5., 10., 15.]);
        assert_eq!(density.uncertainties().as_slice(), &[0., 0., 0.]);
    }

    #[test]
    fn data_keeps_scaled_uncertainties() {
        let raw = hist("data_obs", 4., &[8., 12.], &[2., 4.]);
        let density = refill(Some(&raw), "cat", "data", Some(Blinding::Off)).unwrap();
        assert_eq!(density.contents().as_slice(), &[2., 3.]);
        assert_relative_eq!(density.uncertainty(0), 0.5);
        assert_relative_eq!(density.uncertainty(1), 1.);
    }

    #[test]
    fn missing_input_is_fatal() {
        assert_eq!(
            refill(None, "muTau_vbf", "QCD", None),
            Err(PipelineError::MissingInput {
                category: "muTau_vbf".into(),
                process: "QCD".into()
            })
        );
    }

    #[test]
    fn high_mass_blinding() {
        // Bins of width 100 centered at 50 and 150
        let raw = hist("data_obs", 100., &[300., 200.], &[10., 20.]);
        let blinded = refill(Some(&raw), "cat", "data", Some(Blinding::Above(100.))).unwrap();
        assert_eq!(blinded.contents().as_slice(), &[3., 0.]);
        assert_eq!(blinded.uncertainty(1), 0.);
        let open = refill(Some(&raw), "cat", "data", Some(Blinding::Off)).unwrap();
        assert_eq!(open.contents().as_slice(), &[3., 2.]);
        assert_relative_eq!(open.uncertainty(1), 0.2);
    }

    #[test]
    fn window_blinding_is_exclusive() {
        let blinding = Blinding::Window(100., 150.);
        assert!(!blinding.hides(100.));
        assert!(blinding.hides(125.));
        assert!(!blinding.hides(150.));
        assert!(Blinding::Full.hides(-1.));
        assert!(!Blinding::Off.hides(125.));
    }

    #[test]
    fn blinding_syntax() {
        assert_eq!("off".parse::<Blinding>().unwrap(), Blinding::Off);
        assert_eq!("above 100".parse::<Blinding>().unwrap(), Blinding::Above(100.));
        assert_eq!(
            "window 100 150".parse::<Blinding>().unwrap(),
            Blinding::Window(100., 150.)
        );
        assert!("window 100".parse::<Blinding>().is_err());
        assert!("above x".parse::<Blinding>().is_err());
    }
}
