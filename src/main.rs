//! H→ττ post-fit plots: comparison of data with the fitted background model
//!
//!
//! # Introduction (for the physicist)
//!
//! This program takes the histograms which were fed to a binned maximum
//! likelihood fit of the Higgs boson to tau pair decay, applies the
//! corrections which the fit found for each process, and produces the usual
//! stacked plot of observed data against the background model and signal,
//! along with the bin-by-bin ratio of data over model, the ratio of the fitted
//! over the unfitted model, and a summary of how much each process group was
//! pulled by the fit.
//!
//! It knows about the μ+τh (mt) and μ+μ (mm) final states, for both the
//! Standard Model and MSSM hypotheses, at 7 and 8 TeV.
//!
//!
//! # Introduction (for the computer guy)
//!
//! Each analysis category is handled independently, going through the
//! following phases:
//!
//! * fetch the raw histograms and refill them into density form
//! * stack the backgrounds (and signals) as they were before the fit
//! * apply the fit corrections and stack again
//! * derive the ratios, error band and per-group shifts
//! * compose plot documents, render them and dump them to disk along with a
//!   histogram snapshot and a text summary
//!
//! Categories can be processed in parallel when the `multi-threading` feature
//! is enabled.

#![warn(missing_docs)]

mod config;
mod error;
mod figures;
mod histogram;
mod numeric;
mod output;
mod pipeline;
mod plot;
mod process;
mod ratio;
mod refill;
mod rescale;
mod scheduling;
mod stack;
mod storage;

use clap::Parser;
use eyre::WrapErr;

use crate::{
    config::Configuration,
    pipeline::{Analysis, SharedSource},
    plot::SvgPlotter,
    process::Registry,
    rescale::ScaleTable,
    storage::HistogramFile,
};

use std::{fs, path::PathBuf, time::Instant};

/// We'll use eyre's type-erased result type throughout the application
type Result<T> = eyre::Result<T>;

/// Command-line interface
#[derive(Debug, Parser)]
#[command(version, about = "Pre-fit and post-fit plots of H→ττ analysis categories")]
struct Cli {
    /// Run-card to be used
    #[arg(short, long, default_value = "postfit.cfg")]
    config: PathBuf,

    /// Ignore the fit result and plot the pre-fit model
    #[arg(long)]
    prefit: bool,

    /// Use a linear y axis
    #[arg(long)]
    linear: bool,

    /// Only process this category (can be repeated)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Maximal level of log messages
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

/// This will act as our main function, with suitable error handling
fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    // ### CONFIGURATION READOUT ###

    let config_path = cli.config.to_string_lossy();
    let mut config =
        Configuration::load(&config_path).wrap_err("Failed to load the configuration")?;
    config
        .override_with(cli.prefit, cli.linear, &cli.categories)
        .wrap_err("Invalid command-line overrides")?;
    config.print();

    // ### INPUT LOADING ###

    let saved_time = Instant::now();
    let registry = Registry::new(config.registry.clone());
    tracing::info!("{}", registry.description());

    let table = match &config.fit_result {
        Some(path) => ScaleTable::load(path)?,
        None => ScaleTable::default(),
    };
    for name in table.names() {
        if registry.by_input_name(name).is_err() {
            tracing::warn!(process = name, "fit result names an unknown process");
        }
    }

    let main_file = HistogramFile::open(&config.input)?;
    let signal_file = config
        .signal_input
        .as_deref()
        .map(HistogramFile::open)
        .transpose()?;
    let analysis = Analysis {
        config: &config,
        registry: &registry,
        table: &table,
        main: &main_file,
        signal: signal_file.as_ref().map(|file| file as SharedSource),
    };

    fs::create_dir_all(&config.output_dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    // ### CATEGORY PROCESSING ###

    let written = scheduling::run_categories(&config.categories, |category| {
        let cmp = analysis
            .run(category)
            .wrap_err_with(|| format!("Failed to process category {}", category))?;
        let figures = figures::compose(&cmp, &config, &registry);
        output::dump_results(&cmp, &figures, &config, &registry, &SvgPlotter)
            .wrap_err("Failed to output the results")
    })?;

    let num_files = written.iter().map(Vec::len).sum::<usize>();
    tracing::info!(
        categories = written.len(),
        files = num_files,
        elapsed = ?saved_time.elapsed(),
        "all done"
    );
    Ok(())
}
