//! Visual documents and their export to image files
//!
//! The pipeline does not draw anything itself. It describes each plot as a
//! `Document` (a sequence of histograms with drawing attributes, axes and
//! labels) and hands it over to a `Plotter`, which is responsible for turning
//! it into image files.

mod convert;
mod svg;

pub use self::svg::SvgPlotter;

use crate::{histogram::Histogram, Result};

use eyre::{bail, Error};

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// RGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
//
impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const GRAY: Self = Self::rgb(0xcc, 0xcc, 0xcc);
    pub const DARK_RED: Self = Self::rgb(0x66, 0x00, 0x00);
    pub const PALE_RED: Self = Self::rgb(0xff, 0xcc, 0xcc);

    /// Build a color from its components
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
//
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Image file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Png,
    Pdf,
}
//
impl ImageFormat {
    /// Formats which this build of the program can produce
    pub fn available() -> Vec<Self> {
        let mut formats = vec![Self::Svg];
        if cfg!(feature = "png") {
            formats.push(Self::Png);
        }
        if cfg!(feature = "pdf") {
            formats.push(Self::Pdf);
        }
        formats
    }

    /// File extension of this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }
}
//
impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.to_lowercase().as_str() {
            "svg" => Self::Svg,
            "png" => Self::Png,
            "pdf" => Self::Pdf,
            "eps" | "ps" => bail!(
                "PostScript output ({}) is not supported, use pdf for vector images",
                s
            ),
            other => bail!("Unknown image format {:?} (expected svg, png or pdf)", other),
        };
        if !Self::available().contains(&format) {
            bail!("Support for {} images was not compiled in", format.extension());
        }
        Ok(format)
    }
}

/// How a histogram is drawn
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Draw {
    /// Area between the x axis and the bin contents
    Filled { fill: Color, line: Color },

    /// Outline of the bin contents
    Line { color: Color, dashed: bool },

    /// Hatched area between the x axis and the bin contents
    Hatched(Color),

    /// Markers at the bin centers, with vertical error bars
    Markers(Color),
}

/// A histogram together with its drawing attributes
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub hist: Histogram,
    pub draw: Draw,
}

/// Axis range and labelling
#[derive(Clone, Debug, PartialEq)]
pub struct Axis {
    /// Title of the axis
    pub title: String,

    /// Displayed range
    pub min: f64,
    pub max: f64,

    /// Logarithmic scale
    pub log: bool,

    /// Text labels replacing the numerical ticks, one per bin
    pub bin_labels: Vec<String>,
}
//
impl Axis {
    /// Linear axis without bin labels
    pub fn linear(title: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            title: title.into(),
            min,
            max,
            log: false,
            bin_labels: Vec::new(),
        }
    }
}

/// Description of one plot
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Size in points
    pub width: f64,
    pub height: f64,

    /// Text lines displayed above the plot frame
    pub header: Vec<String>,

    /// Text lines displayed inside the frame, top left
    pub annotations: Vec<String>,

    /// Axes
    pub x: Axis,
    pub y: Axis,

    /// Histograms, drawn in order (first one at the back)
    pub layers: Vec<Layer>,

    /// Legend entries, top to bottom
    pub legend: Vec<(String, Draw)>,

    /// Draw a horizontal line at y = 0
    pub zero_line: bool,

    /// Draw a grid at the axis ticks
    pub grid: bool,
}

/// Something which can turn documents into image files
pub trait Plotter {
    /// Save `doc` as `<stem>.<extension>` for each requested format, and
    /// return the paths of the files that were written
    fn save(&self, doc: &Document, stem: &Path, formats: &[ImageFormat]) -> Result<Vec<PathBuf>>;
}

/// Path of the file of a given format for some file stem
pub fn file_path(stem: &Path, extension: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
