//! This module is in charge of outputting the results of each category to
//! disk: plots, histogram snapshots and a text summary

use crate::{
    config::Configuration,
    figures::Figures,
    numeric::{reals, Float},
    pipeline::Comparison,
    plot::{file_path, Plotter},
    process::{Registry, Role},
    storage::HistogramFile,
    Result,
};

use eyre::WrapErr;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

// Number of significant digits in file output
const SIG_DIGITS: usize = (reals::DIGITS - 1) as usize;

/// Which plot a file holds, as encoded in its name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlotKind {
    Main,
    DataOverModel,
    FitOverPrefit,
    Shifts,
}
//
impl PlotKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Main => "",
            Self::DataOverModel => "datamc_",
            Self::FitOverPrefit => "prefit_",
            Self::Shifts => "sample_",
        }
    }
}

/// File stem of a given plot of a category, without extension
fn stem(config: &Configuration, category: &str, kind: PlotKind) -> PathBuf {
    let name = format!(
        "{}_{}{}fit_{}_{}",
        category,
        kind.prefix(),
        if config.apply_fit_scaling { "post" } else { "pre" },
        config.energy_tag(),
        if config.log_scale { "LOG" } else { "LIN" },
    );
    config.output_dir.join(name)
}

/// Write the plots, histograms and summary of a category, returning the
/// paths of every file that was written
pub fn dump_results(
    cmp: &Comparison,
    figures: &Figures,
    config: &Configuration,
    registry: &Registry,
    plotter: &impl Plotter,
) -> Result<Vec<PathBuf>> {
    let category = &cmp.category[..];
    let (log, scaled) = (config.log_scale, config.apply_fit_scaling);
    let mut written = Vec::new();

    // Plots which are redundant for this mode are only written on request
    let plots = [
        (PlotKind::Main, &figures.main, true),
        (PlotKind::DataOverModel, &figures.data_ratio, !log),
        (PlotKind::FitOverPrefit, &figures.fit_ratio, !log && scaled),
        (PlotKind::Shifts, &figures.shifts, !log && scaled),
    ];
    for (kind, doc, wanted) in plots {
        if wanted || config.full_plots {
            let paths = plotter
                .save(doc, &stem(config, category, kind), &config.formats)
                .wrap_err_with(|| format!("Failed to write the plots of {}", category))?;
            written.extend(paths);
        }
    }

    // Histogram snapshot, which can be plotted again later on
    let main_stem = stem(config, category, PlotKind::Main);
    let mut snapshots = vec![file_path(&main_stem, "bin")];
    if config.snapshot_json {
        snapshots.push(file_path(&main_stem, "json"));
    }
    for path in snapshots {
        write_snapshot(&path, cmp, registry)?;
        written.push(path);
    }

    // Text summary of the run
    let summary = file_path(&main_stem, "txt");
    write_summary(&summary, cmp, config, registry)
        .wrap_err_with(|| format!("Failed to write summary {}", summary.display()))?;
    tracing::info!(path = %summary.display(), "summary written");
    written.push(summary);
    Ok(written)
}

/// Write the final histograms of a category to a fresh histogram file
///
/// Any previous file at `path` is replaced, so that histograms of processes
/// which are not part of the current catalog do not linger.
///
fn write_snapshot(path: &Path, cmp: &Comparison, registry: &Registry) -> Result<()> {
    let mut file = HistogramFile::default();
    let category = &cmp.category[..];
    file.insert(category, &cmp.data);

    // Processes are persisted in stacked form, under their output name
    let layers = cmp.backgrounds.layers().iter().chain(cmp.signals.layers());
    let processes = registry
        .with_role(Role::Background)
        .chain(registry.with_role(Role::Signal));
    for ((_, process), layer) in processes.zip(layers) {
        if let Some(name) = process.output_name {
            file.insert(category, &layer.clone_named(name));
        }
    }
    file.insert(category, &cmp.error_band);
    file.save(path)
}

/// Write the text summary of a category
fn write_summary(
    path: &Path,
    cmp: &Comparison,
    config: &Configuration,
    registry: &Registry,
) -> Result<()> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .wrap_err("Failed to format the current time")?;
    let mut file = BufWriter::new(File::create(path)?);
    let file = &mut file;

    writeln_3p(file, &timestamp[..])?;
    writeln_3p(file, "---------------------------------------------")?;
    writeln_3p(file, ("Category", &cmp.category[..]))?;
    writeln_3p(file, ("Catalog", &registry.description()[..]))?;
    let fit_state = if config.apply_fit_scaling {
        "post-fit"
    } else {
        "pre-fit"
    };
    writeln_3p(file, ("Fit state", fit_state))?;
    writeln_3p(file, ("Signal scale", config.signal_scale))?;
    writeln_3p(file, ("Displayed processes", registry.processes().len()))?;
    writeln_3p(file, "---------------------------------------------")?;
    for shift in &cmp.shifts {
        writeln_3p(file, (&format!("{} before fit", shift.group)[..], shift.before))?;
        writeln_3p(file, (&format!("{} after fit", shift.group)[..], shift.after))?;
        writeln_3p(file, (&format!("{} relative shift", shift.group)[..], shift.value()))?;
    }
    file.flush()?;
    Ok(())
}

/// Text output facility that uses the aligned summary styling
fn writeln_3p(file: &mut impl Write, data: impl Write3p) -> io::Result<()> {
    write!(file, " ")?;
    data.write(file)?;
    writeln!(file)
}

/// Trait implemented by things which can be printed in the summary style
trait Write3p: Sized {
    /// Write down `self` to the output file
    fn write(self, file: &mut impl Write) -> io::Result<()>;
}

impl Write3p for &str {
    // Strings work in the usual way
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{}", self)
    }
}

impl Write3p for usize {
    // Integers work in the usual way too
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{}", self)
    }
}

impl Write3p for Float {
    // Close approximation of C's %g
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write_engineering(file, self, SIG_DIGITS)
    }
}

impl<T: Write3p> Write3p for (&str, T) {
    // Key-value output that uses fixed-size columns for better readability
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{:<31}: ", self.0)?;
        self.1.write(file)
    }
}

/// Write a floating-point number using "engineering" notation
///
/// Analogous to the %g format of the C printf function, this method switches
/// between naive and scientific notation for floating-point numbers when the
/// number being printed becomes so small that printing leading zeroes could end
/// up larger than the scientific notation, or so large that we would be forced
/// to print more significant digits than requested.
///
fn write_engineering(writer: &mut impl Write, x: Float, sig_digits: usize) -> io::Result<()> {
    let mut precision = sig_digits - 1;
    if x == 0. {
        // Zero is special because you can't take its log
        write!(writer, "0")
    } else {
        // Otherwise, use log to evaluate order of magnitude
        let log_x = x.abs().log10();
        if (-3. ..(sig_digits as Float)).contains(&log_x) {
            // Rust's precision controls the number of digits after the decimal
            // point, so it must be adjusted to the order of magnitude
            precision = (precision as isize - log_x.trunc() as isize) as usize;

            // The leading zero of numbers below 1 is not significant
            if log_x < 0. {
                precision += 1
            }

            // No trailing zeros or decimal point in naive notation, but be
            // careful with integer numbers...
            let str_with_zeros = format!("{:.1$}", x, precision);
            if str_with_zeros.contains('.') {
                write!(
                    writer,
                    "{}",
                    str_with_zeros.trim_end_matches('0').trim_end_matches('.')
                )
            } else {
                write!(writer, "{}", str_with_zeros)
            }
        } else {
            // Print using scientific notation
            write!(writer, "{:.1$e}", x, precision)
        }
    }
}
