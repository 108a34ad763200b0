//! SVG rendering of plot documents
//!
//! Everything is first drawn as an SVG string, in points. Other image
//! formats are derived from this string by the `convert` module.

use super::{convert, file_path, Axis, Color, Document, Draw, ImageFormat, Layer, Plotter};
use crate::Result;

use eyre::WrapErr;

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

// Space between the document border and the plot frame
const MARGIN_LEFT: f64 = 80.;
const MARGIN_RIGHT: f64 = 25.;
const MARGIN_TOP: f64 = 55.;
const MARGIN_BOTTOM: f64 = 55.;

// Text geometry
const FONT_SIZE: f64 = 12.;
const LINE_HEIGHT: f64 = 16.;
const TICK_LENGTH: f64 = 6.;

/// Plotter which renders documents as SVG, then converts them as needed
#[derive(Clone, Copy, Debug, Default)]
pub struct SvgPlotter;
//
impl SvgPlotter {
    /// Render a document into an SVG string
    pub fn render(&self, doc: &Document) -> Result<String> {
        let frame = Frame::new(doc);
        let mut out = String::new();
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="{FONT_SIZE}">"#,
            w = doc.width,
            h = doc.height,
        )?;
        writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;

        // Clip path of the frame and hatch patterns of the hatched layers
        writeln!(out, "<defs>")?;
        writeln!(
            out,
            r#"<clipPath id="frame"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath>"#,
            frame.left,
            frame.top,
            frame.right - frame.left,
            frame.bottom - frame.top
        )?;
        for (idx, layer) in doc.layers.iter().enumerate() {
            if let Draw::Hatched(color) = layer.draw {
                writeln!(
                    out,
                    r#"<pattern id="hatch{idx}" patternUnits="userSpaceOnUse" width="6" height="6" patternTransform="rotate(45)"><line x1="0" y1="0" x2="0" y2="6" stroke="{color}" stroke-width="1.2"/></pattern>"#
                )?;
            }
        }
        writeln!(out, "</defs>")?;

        if doc.grid {
            frame.grid(&mut out)?;
        }

        writeln!(out, r#"<g clip-path="url(#frame)">"#)?;
        for (idx, layer) in doc.layers.iter().enumerate() {
            frame.layer(&mut out, idx, layer)?;
        }
        if doc.zero_line && frame.y.min < 0. && frame.y.max > 0. {
            let y = frame.map_y(0.);
            writeln!(
                out,
                r#"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="black" stroke-dasharray="4 3"/>"#,
                frame.left, frame.right
            )?;
        }
        writeln!(out, "</g>")?;

        frame.axes(&mut out)?;
        frame.texts(&mut out, doc)?;
        frame.legend(&mut out, &doc.legend)?;
        writeln!(out, "</svg>")?;
        Ok(out)
    }
}
//
impl Plotter for SvgPlotter {
    fn save(&self, doc: &Document, stem: &Path, formats: &[ImageFormat]) -> Result<Vec<PathBuf>> {
        let svg = self.render(doc)?;
        let mut written = Vec::with_capacity(formats.len());
        for &format in formats {
            let path = file_path(stem, format.extension());
            let bytes = match format {
                ImageFormat::Svg => svg.as_bytes().to_vec(),
                ImageFormat::Png => convert::svg_to_png(&svg)?,
                ImageFormat::Pdf => convert::svg_to_pdf(&svg)?,
            };
            fs::write(&path, bytes)
                .wrap_err_with(|| format!("Could not write plot {}", path.display()))?;
            tracing::info!(path = %path.display(), "plot written");
            written.push(path);
        }
        Ok(written)
    }
}

/// Plot frame of a document, with the data to point coordinate mapping
struct Frame<'doc> {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    x: &'doc Axis,
    y: &'doc Axis,
}
//
impl<'doc> Frame<'doc> {
    fn new(doc: &'doc Document) -> Self {
        Self {
            left: MARGIN_LEFT,
            right: doc.width - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: doc.height - MARGIN_BOTTOM,
            x: &doc.x,
            y: &doc.y,
        }
    }

    fn map_x(&self, x: f64) -> f64 {
        self.left + axis_fraction(self.x, x) * (self.right - self.left)
    }

    fn map_y(&self, y: f64) -> f64 {
        self.bottom - axis_fraction(self.y, y) * (self.bottom - self.top)
    }

    /// Vertical position from which filled areas start
    fn baseline(&self) -> f64 {
        if self.y.log {
            self.bottom
        } else {
            self.map_y(0f64.clamp(self.y.min, self.y.max))
        }
    }

    /// Draw one histogram layer
    fn layer(&self, out: &mut String, idx: usize, layer: &Layer) -> Result<()> {
        let hist = &layer.hist;
        let edges = hist.edges();
        let value = |bin: usize| self.map_y(hist.content(bin) as f64);
        match layer.draw {
            Draw::Filled { fill, line } => self.area(out, layer, &fill.to_string(), line)?,
            Draw::Hatched(color) => self.area(out, layer, &format!("url(#hatch{idx})"), color)?,
            Draw::Line { color, dashed } => {
                let mut d = format!("M{:.2},{:.2}", self.map_x(edges[0] as f64), value(0));
                for bin in 0..hist.num_bins() {
                    if bin > 0 {
                        write!(d, " V{:.2}", value(bin))?;
                    }
                    write!(d, " H{:.2}", self.map_x(edges[bin + 1] as f64))?;
                }
                let dash = if dashed { r#" stroke-dasharray="6 3""# } else { "" };
                writeln!(
                    out,
                    r#"<path d="{d}" fill="none" stroke="{color}" stroke-width="2"{dash}/>"#
                )?;
            }
            Draw::Markers(color) => {
                for bin in 0..hist.num_bins() {
                    let (content, error) = (hist.content(bin) as f64, hist.uncertainty(bin) as f64);
                    // Blinded and empty bins have no marker
                    if content == 0. && error == 0. {
                        continue;
                    }
                    let x = self.map_x(hist.bin_center(bin) as f64);
                    writeln!(
                        out,
                        r#"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" stroke="{color}" stroke-width="1"/>"#,
                        self.map_y(content - error),
                        self.map_y(content + error)
                    )?;
                    writeln!(
                        out,
                        r#"<circle cx="{x:.2}" cy="{:.2}" r="3" fill="{color}"/>"#,
                        self.map_y(content)
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Draw the area between the baseline and the bin contents
    fn area(&self, out: &mut String, layer: &Layer, fill: &str, stroke: Color) -> Result<()> {
        let hist = &layer.hist;
        let edges = hist.edges();
        let base = self.baseline();
        let mut d = format!("M{:.2},{:.2}", self.map_x(edges[0] as f64), base);
        for bin in 0..hist.num_bins() {
            let y = self.map_y(hist.content(bin) as f64);
            write!(
                d,
                " L{:.2},{y:.2} L{:.2},{y:.2}",
                self.map_x(edges[bin] as f64),
                self.map_x(edges[bin + 1] as f64),
            )?;
        }
        write!(d, " L{:.2},{base:.2} Z", self.map_x(edges[hist.num_bins()] as f64))?;
        writeln!(
            out,
            r#"<path d="{d}" fill="{fill}" stroke="{stroke}" stroke-width="1"/>"#
        )?;
        Ok(())
    }

    /// Light grid lines at the major ticks
    fn grid(&self, out: &mut String) -> Result<()> {
        for (x, _) in ticks(self.x) {
            let x = self.map_x(x);
            writeln!(
                out,
                r#"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" stroke="{}"/>"#,
                self.top,
                self.bottom,
                Color::GRAY
            )?;
        }
        for (y, _) in ticks(self.y) {
            let y = self.map_y(y);
            writeln!(
                out,
                r#"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="{}"/>"#,
                self.left,
                self.right,
                Color::GRAY
            )?;
        }
        Ok(())
    }

    /// Frame, ticks, tick labels and axis titles
    fn axes(&self, out: &mut String) -> Result<()> {
        writeln!(
            out,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="black"/>"#,
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top
        )?;

        // Horizontal axis, either numerical or labelled bin by bin
        if self.x.bin_labels.is_empty() {
            for (x, label) in ticks(self.x) {
                let x = self.map_x(x);
                writeln!(
                    out,
                    r#"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" stroke="black"/>"#,
                    self.bottom,
                    self.bottom - TICK_LENGTH
                )?;
                writeln!(
                    out,
                    r#"<text x="{x:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
                    self.bottom + LINE_HEIGHT,
                    escape(&label)
                )?;
            }
        } else {
            let num_labels = self.x.bin_labels.len() as f64;
            for (idx, label) in self.x.bin_labels.iter().enumerate() {
                let center = self.x.min + (idx as f64 + 0.5) * (self.x.max - self.x.min) / num_labels;
                writeln!(
                    out,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
                    self.map_x(center),
                    self.bottom + LINE_HEIGHT,
                    escape(label)
                )?;
            }
        }
        writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
            self.right,
            self.bottom + 2.5 * LINE_HEIGHT,
            escape(&self.x.title)
        )?;

        // Vertical axis
        for (y, label) in ticks(self.y) {
            let y = self.map_y(y);
            writeln!(
                out,
                r#"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="black"/>"#,
                self.left,
                self.left + TICK_LENGTH
            )?;
            writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
                self.left - 4.,
                y + FONT_SIZE / 3.,
                escape(&label)
            )?;
        }
        let (x, y) = (self.left - 4. * FONT_SIZE, self.top);
        writeln!(
            out,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" transform="rotate(-90 {x:.2} {y:.2})">{}</text>"#,
            escape(&self.y.title)
        )?;
        Ok(())
    }

    /// Header lines above the frame and annotations inside of it
    fn texts(&self, out: &mut String, doc: &Document) -> Result<()> {
        let num_header = doc.header.len();
        for (idx, line) in doc.header.iter().enumerate() {
            let y = self.top - 8. - LINE_HEIGHT * (num_header - 1 - idx) as f64;
            writeln!(
                out,
                r#"<text x="{:.2}" y="{y:.2}">{}</text>"#,
                self.left,
                escape(line)
            )?;
        }
        for (idx, line) in doc.annotations.iter().enumerate() {
            writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" font-weight="bold">{}</text>"#,
                self.left + 10.,
                self.top + LINE_HEIGHT * (idx + 1) as f64,
                escape(line)
            )?;
        }
        Ok(())
    }

    /// Legend box in the top right corner of the frame
    fn legend(&self, out: &mut String, entries: &[(String, Draw)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let longest = entries.iter().map(|(text, _)| text.chars().count()).max().unwrap_or(0);
        let width = 36. + 0.6 * FONT_SIZE * longest as f64;
        let height = LINE_HEIGHT * entries.len() as f64 + 8.;
        let (x0, y0) = (self.right - width - 8., self.top + 8.);
        writeln!(
            out,
            r#"<rect x="{x0:.2}" y="{y0:.2}" width="{width:.2}" height="{height:.2}" fill="white" stroke="black" stroke-width="0.5"/>"#
        )?;
        for (idx, (text, draw)) in entries.iter().enumerate() {
            let y = y0 + 4. + LINE_HEIGHT * idx as f64;
            let (sx, sy) = (x0 + 6., y + 3.);
            match *draw {
                Draw::Filled { fill, line } => writeln!(
                    out,
                    r#"<rect x="{sx:.2}" y="{sy:.2}" width="18" height="10" fill="{fill}" stroke="{line}"/>"#
                )?,
                Draw::Hatched(color) => writeln!(
                    out,
                    r#"<rect x="{sx:.2}" y="{sy:.2}" width="18" height="10" fill="none" stroke="{color}" stroke-dasharray="1 1"/>"#
                )?,
                Draw::Line { color, dashed } => writeln!(
                    out,
                    r#"<line x1="{sx:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{color}" stroke-width="2"{}/>"#,
                    sy + 5.,
                    sx + 18.,
                    sy + 5.,
                    if dashed { r#" stroke-dasharray="4 2""# } else { "" }
                )?,
                Draw::Markers(color) => writeln!(
                    out,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="{color}"/>"#,
                    sx + 9.,
                    sy + 5.
                )?,
            }
            writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}">{}</text>"#,
                sx + 26.,
                sy + 9.,
                escape(text)
            )?;
        }
        Ok(())
    }
}

/// Position of `value` along an axis, as a fraction of the axis length
fn axis_fraction(axis: &Axis, value: f64) -> f64 {
    if axis.log {
        let (min, max) = (axis.min.max(1e-20).log10(), axis.max.max(1e-20).log10());
        // Values which cannot be displayed on a log axis sink below it
        let value = if value > 0. { value.log10() } else { min - 1. };
        (value - min) / (max - min)
    } else {
        (value - axis.min) / (axis.max - axis.min)
    }
}

/// Major ticks of an axis, with their labels
fn ticks(axis: &Axis) -> Vec<(f64, String)> {
    if axis.log {
        let (low, high) = (
            axis.min.max(1e-20).log10().floor() as i32,
            axis.max.max(1e-20).log10().ceil() as i32,
        );
        (low..=high)
            .map(|exp| (10f64.powi(exp), format!("10{}", superscript(exp))))
            .filter(|&(value, _)| value >= axis.min * 0.999 && value <= axis.max * 1.001)
            .collect()
    } else {
        let step = nice_step((axis.max - axis.min) / 5.);
        if !step.is_normal() {
            return Vec::new();
        }
        let first = (axis.min / step).ceil() as i64;
        let last = (axis.max / step + 1e-9).floor() as i64;
        (first..=last)
            .map(|idx| {
                let value = idx as f64 * step;
                (value, format_tick(value, step))
            })
            .collect()
    }
}

/// Round a tick spacing to 1, 2 or 5 times a power of ten
fn nice_step(rough: f64) -> f64 {
    let exp = rough.abs().log10().floor();
    let frac = rough / 10f64.powf(exp);
    let nice_frac = if frac <= 1.5 {
        1.
    } else if frac <= 3.5 {
        2.
    } else if frac <= 7.5 {
        5.
    } else {
        10.
    };
    nice_frac * 10f64.powf(exp)
}

fn format_tick(value: f64, step: f64) -> String {
    if step >= 1. {
        // Avoid "-0"
        let value = if value.abs() < step * 0.01 { 0. } else { value };
        format!("{}", value.round() as i64)
    } else {
        let decimals = (-step.log10().floor()) as usize;
        format!("{:.prec$}", value, prec = decimals)
    }
}

fn superscript(n: i32) -> String {
    n.to_string()
        .chars()
        .map(|c| match c {
            '-' => '\u{207B}',
            '0' => '\u{2070}',
            '1' => '\u{00B9}',
            '2' => '\u{00B2}',
            '3' => '\u{00B3}',
            '4' => '\u{2074}',
            '5' => '\u{2075}',
            '6' => '\u{2076}',
            '7' => '\u{2077}',
            '8' => '\u{2078}',
            '9' => '\u{2079}',
            _ => c,
        })
        .collect()
}

/// Escape text for inclusion in XML
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::tests::hist;

    fn document() -> Document {
        Document {
            width: 600.,
            height: 600.,
            header: vec!["CMS Preliminary".to_owned()],
            annotations: vec!["μτh".to_owned()],
            x: Axis::linear("m_ττ [GeV]", 0., 6.),
            y: Axis {
                log: true,
                ..Axis::linear("dN/dm", 0.1, 100.)
            },
            layers: vec![
                Layer {
                    hist: hist("Ztt", 2., &[5., 10., 15.], &[0., 0., 0.]),
                    draw: Draw::Filled {
                        fill: Color::rgb(0xff, 0xcc, 0x66),
                        line: Color::BLACK,
                    },
                },
                Layer {
                    hist: hist("errorBand", 2., &[5., 10., 15.], &[1., 1., 1.]),
                    draw: Draw::Hatched(Color::BLACK),
                },
                Layer {
                    hist: hist("data_obs", 2., &[4., 0., 16.], &[2., 0., 4.]),
                    draw: Draw::Markers(Color::BLACK),
                },
            ],
            legend: vec![("Z→ττ & <friends>".to_owned(), Draw::Markers(Color::BLACK))],
            zero_line: false,
            grid: false,
        }
    }

    #[test]
    fn renders_every_layer() {
        let svg = SvgPlotter.render(&document()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"id="hatch1""#));
        assert!(svg.contains("url(#hatch1)"));
        assert!(svg.contains("#ffcc66"));
        // Two non-empty data bins, one marker each (plus the legend marker)
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("Z→ττ &amp; &lt;friends&gt;"));
        assert!(svg.contains("10²"));
    }

    #[test]
    fn log_axis_maps_decades_evenly() {
        let axis = Axis {
            log: true,
            ..Axis::linear("", 0.1, 1000.)
        };
        assert!((axis_fraction(&axis, 1.) - 0.25).abs() < 1e-12);
        assert!((axis_fraction(&axis, 100.) - 0.75).abs() < 1e-12);
        assert!(axis_fraction(&axis, 0.) < 0.);
        let labels = ticks(&axis).into_iter().map(|(_, l)| l).collect::<Vec<_>>();
        assert_eq!(labels, ["10⁻¹", "10⁰", "10¹", "10²", "10³"]);
    }

    #[test]
    fn linear_ticks() {
        let ticks = ticks(&Axis::linear("", -0.5, 0.5));
        let labels = ticks.iter().map(|(_, l)| l.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, ["-0.4", "-0.2", "0.0", "0.2", "0.4"]);
        assert!((nice_step(3.2) - 2.).abs() < 1e-9);
        assert!((nice_step(0.7) - 0.5).abs() < 1e-9);
        assert!((nice_step(15.) - 10.).abs() < 1e-9);
    }

    #[test]
    fn saves_svg_files() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("muTau_vbf_postfit_8TeV_LOG");
        let written = SvgPlotter
            .save(&document(), &stem, &[ImageFormat::Svg])
            .unwrap();
        assert_eq!(written, [dir.path().join("muTau_vbf_postfit_8TeV_LOG.svg")]);
        let content = fs::read_to_string(&written[0]).unwrap();
        assert!(content.contains("CMS Preliminary"));
    }
}
