//! Per-category histogram transformation pipeline
//!
//! For each category, every process of the registry goes through the same
//! strictly ordered sequence of stages: refill, integral snapshot, rescale,
//! second integral snapshot, stacking, ratios. The outcome is a `Comparison`,
//! from which the plots and the persisted histograms are derived.

use crate::{
    config::Configuration,
    error::PipelineError,
    histogram::Histogram,
    numeric::{functions::nint, Float},
    process::{Channel, Hypothesis, Origin, Registry, Role},
    ratio::{deviation, RelativeShift},
    refill::refill,
    rescale::{rescale, ScaleTable},
    stack::Stack,
    storage::HistogramSource,
    Result,
};

use eyre::{format_err, WrapErr};

/// Ratio of y_max to y_min when the automatic maximum does not exceed y_min
/// (y_max is at least 1 in that case)
const EMPTY_PLOT_HEADROOM: Float = 10.;

/// Histogram source which may be shared between threads
pub type SharedSource<'a> = &'a (dyn HistogramSource + Sync);

/// Everything needed to process the categories of one run
#[derive(Clone, Copy)]
pub struct Analysis<'a> {
    /// Run configuration
    pub config: &'a Configuration,

    /// Active process catalog
    pub registry: &'a Registry,

    /// Fit-derived corrections
    pub table: &'a ScaleTable,

    /// Main histogram source
    pub main: SharedSource<'a>,

    /// Source of the signal histograms, if they are stored separately
    pub signal: Option<SharedSource<'a>>,
}

/// Processed histograms of one category
#[derive(Clone, Debug)]
pub struct Comparison {
    /// Category (input directory) name
    pub category: String,

    /// Observed (or Asimov) data, named `data_obs`
    pub data: Histogram,

    /// Cumulative background stack, in registry order
    pub backgrounds: Stack,

    /// Cumulative signal stack, in registry order
    pub signals: Stack,

    /// Background sum before any fit correction
    pub reference: Histogram,

    /// Copy of the top of the background stack, drawn as a hatched band
    pub error_band: Histogram,

    /// Data over background model, minus one
    pub data_ratio: Histogram,

    /// Corrected over uncorrected background model, minus one
    pub fit_ratio: Histogram,

    /// Relative integral shift of each shift group
    pub shifts: Vec<RelativeShift>,

    /// Displayed range of the mass axis
    pub x_range: (Float, Float),

    /// Displayed range of the main plot's vertical axis
    pub y_range: (Float, Float),
}

impl<'a> Analysis<'a> {
    /// Source from which the processes of a given origin are read
    fn source(&self, origin: Origin) -> SharedSource<'a> {
        match origin {
            Origin::Main => self.main,
            Origin::Signal => self.signal.unwrap_or(self.main),
        }
    }

    /// Run the full pipeline on one category
    pub fn run(&self, category: &str) -> Result<Comparison> {
        let config = self.config;
        let processes = self.registry.processes();

        // Fetch every process and turn it into a density
        let mut raws = Vec::with_capacity(processes.len());
        let mut hists = Vec::with_capacity(processes.len());
        for process in processes {
            let raw = self
                .source(process.origin)
                .fetch(category, &process.input_name)?;
            let mut hist = refill(raw.as_ref(), category, &process.input_name, None)?;
            if process.role == Role::Signal {
                hist.scale(config.signal_scale);
            }
            raws.push(raw);
            hists.push(hist);
        }
        let data = self.observed(category, &raws)?;

        // The reference sum must be taken before the fit corrections
        let reference = Stack::build(with_role(self.registry, &hists, Role::Background), None)?
            .top()
            .ok_or_else(|| no_background(self.registry))?
            .clone_named("ref");

        // Apply the fit corrections, monitoring the integral of each group
        let groups = self.registry.shift_groups();
        let group_integrals = |hists: &[Histogram]| -> Vec<Float> {
            groups
                .iter()
                .map(|&group| {
                    processes
                        .iter()
                        .zip(hists)
                        .filter(|(process, _)| process.shift_group == group)
                        .map(|(_, hist)| hist.integral())
                        .sum()
                })
                .collect()
        };
        let before = group_integrals(&hists);
        if config.apply_fit_scaling {
            for (process, hist) in processes.iter().zip(&mut hists) {
                rescale(hist, process.fit_index, self.registry, self.table)?;
            }
        }
        let after = group_integrals(&hists);
        let shifts = groups
            .iter()
            .zip(before.into_iter().zip(after))
            .map(|(&group, (before, after))| RelativeShift {
                group,
                before,
                after,
            })
            .collect::<Vec<_>>();

        // Stack the processes up
        let backgrounds = Stack::build(with_role(self.registry, &hists, Role::Background), None)?;
        let model = backgrounds
            .top()
            .ok_or_else(|| no_background(self.registry))?;
        let signal_base = (!config.log_scale).then_some(model);
        let signals = Stack::build(with_role(self.registry, &hists, Role::Signal), signal_base)?;

        // Compare the data and the corrected model to their references
        let data_ratio = deviation(&data, model, "rat1")?;
        let fit_ratio = deviation(model, &reference, "rat2")?;

        let error_band = model.clone_named("errorBand");
        if let Some(bin) = (0..error_band.num_bins()).find(|&bin| error_band.content(bin) > 0.) {
            tracing::info!(
                category,
                relative = (error_band.uncertainty(bin) / error_band.content(bin)) as f64,
                "uncertainty on summed background samples"
            );
        }

        // Axis ranges of the main plot
        let log = config.log_scale;
        let y_max = if config.y_max > 0. {
            config.y_max
        } else {
            let auto = auto_maximum(data.maximum(), log).max(auto_maximum(model.maximum(), log));
            if auto > config.y_min {
                auto
            } else {
                tracing::warn!(
                    category,
                    y_min = config.y_min as f64,
                    "nothing to display above y_min, using a default vertical range"
                );
                (EMPTY_PLOT_HEADROOM * config.y_min).max(1.)
            }
        };
        let options = self.registry.options();
        let x_range = display_range(&data, options.channel, options.hypothesis, log);

        Ok(Comparison {
            category: category.to_owned(),
            data,
            backgrounds,
            signals,
            reference,
            error_band,
            data_ratio,
            fit_ratio,
            shifts,
            x_range,
            y_range: (config.y_min, y_max),
        })
    }

    /// Fetch, synthesize if needed, and refill the observed data
    fn observed(&self, category: &str, raws: &[Option<Histogram>]) -> Result<Histogram> {
        let name = if self.config.asimov {
            "data_obs_asimov"
        } else {
            "data_obs"
        };
        let mut raw = self.main.fetch(category, name)?;
        if raw.is_none() && self.config.asimov {
            tracing::info!(category, "no stored Asimov dataset, using the raw expectation");
            raw = asimov(name, raws.iter().flatten())
                .wrap_err_with(|| format!("Could not build the Asimov dataset of {}", category))?;
        }
        let data = refill(raw.as_ref(), category, name, Some(self.config.blinding))?;
        Ok(data.clone_named("data_obs"))
    }
}

/// Histograms of the processes of a given role, in stacking order
fn with_role<'h>(
    registry: &'h Registry,
    hists: &'h [Histogram],
    role: Role,
) -> impl Iterator<Item = &'h Histogram> + 'h {
    registry.with_role(role).map(move |(idx, _)| &hists[idx])
}

fn no_background(registry: &Registry) -> eyre::Report {
    format_err!("The {} registry has no background process", registry.description())
}

/// Build an Asimov dataset from raw expected yields
///
/// The contents are the sum of the expected yields, with Poisson uncertainties.
/// Returns None if there is nothing to sum.
///
fn asimov<'h>(
    name: &str,
    expected: impl IntoIterator<Item = &'h Histogram>,
) -> std::result::Result<Option<Histogram>, PipelineError> {
    let mut expected = expected.into_iter().peekable();
    let Some(first) = expected.peek() else {
        return Ok(None);
    };
    let mut sum = first.clone_named(name);
    sum.clear();
    for hist in expected {
        sum.add(hist)?;
    }
    for bin in 0..sum.num_bins() {
        sum.set_uncertainty(bin, sum.content(bin).max(0.).sqrt());
    }
    Ok(Some(sum))
}

/// Round a histogram maximum up to a pleasant vertical axis maximum
///
/// Log-scale plots get a lot of headroom so that the legend does not hide
/// the data.
///
pub fn auto_maximum(max: Float, log: bool) -> Float {
    if log {
        if max > 1000. {
            1000. * nint(500. * max / 1000.)
        } else if max > 10. {
            10. * nint(50. * max / 10.)
        } else {
            50. * max
        }
    } else if max > 12. {
        10. * nint(1.3 * max / 10.)
    } else if max > 1.2 {
        nint(1.6 * max)
    } else {
        1.6 * max
    }
}

/// Displayed range of the mass axis
///
/// The visible range ends at the upper edge of the bin which contains the
/// cut-off mass, or at the end of the histogram if it is shorter.
///
pub fn display_range(
    hist: &Histogram,
    channel: Channel,
    hypothesis: Hypothesis,
    log: bool,
) -> (Float, Float) {
    let edges = hist.edges();
    let low = edges[0];
    let high = edges[edges.len() - 1];
    let cutoff = match (channel, hypothesis, log) {
        (Channel::MuMu, _, _) => None,
        (Channel::MuTau, Hypothesis::Sm, _) | (Channel::MuTau, Hypothesis::Mssm, false) => {
            Some(350.)
        }
        (Channel::MuTau, Hypothesis::Mssm, true) => Some(1000.),
    };
    let high = cutoff
        .and_then(|mass| hist.find_bin(mass))
        .map_or(high, |bin| edges[bin + 1]);
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{histogram::tests::hist, rescale::ScaleRule, storage::HistogramFile};
    use approx::assert_relative_eq;

    const CATEGORY: &str = "muTau_vbf";

    const RUN_CARD: &str = "
        input       root/htt_mt.inputs-sm-8TeV.json
        fit_result  mlfit.json
        channel     mt
        hypothesis  sm
        categories  muTau_vbf
        formats     svg
    ";

    const PROCESSES: [&str; 9] = [
        "QCD", "W", "ZLL", "VV", "TT", "ZTT", "VH125", "qqH125", "ggH125",
    ];

    /// Input file where every process is empty unless specified otherwise
    fn sample_file(contents: &[(&str, [Float; 3])], skip: &[&str]) -> HistogramFile {
        let mut file = HistogramFile::default();
        let names = PROCESSES.iter().copied().chain(["data_obs"]);
        for name in names.filter(|name| !skip.contains(name)) {
            let content = contents
                .iter()
                .find(|(n, _)| *n == name)
                .map_or([0.; 3], |(_, c)| *c);
            let unc = content.map(|c: Float| c.sqrt());
            file.insert(CATEGORY, &hist(name, 2., &content, &unc));
        }
        file
    }

    fn config(extra: &str) -> Configuration {
        config_from(RUN_CARD, extra)
    }

    fn config_from(card: &str, extra: &str) -> Configuration {
        Configuration::parse(&format!("{}\n{}", card, extra)).unwrap()
    }

    fn ztt_table() -> ScaleTable {
        let mut table = ScaleTable::default();
        table.insert("ZTT", ScaleRule::Scale(1.1));
        table
    }

    fn run(config: &Configuration, table: &ScaleTable, file: &HistogramFile) -> Result<Comparison> {
        let registry = Registry::new(config.registry.clone());
        let analysis = Analysis {
            config,
            registry: &registry,
            table,
            main: file,
            signal: None,
        };
        analysis.run(CATEGORY)
    }

    /// Input file holding every process of a given origin, data included in
    /// the main file, empty unless specified otherwise
    fn catalog_file(
        registry: &Registry,
        origin: Origin,
        contents: &[(&str, [Float; 3])],
    ) -> HistogramFile {
        let mut file = HistogramFile::default();
        let data = (origin == Origin::Main).then_some("data_obs");
        let names = registry
            .processes()
            .iter()
            .filter(|process| process.origin == origin)
            .map(|process| process.input_name.as_str())
            .chain(data);
        for name in names {
            let content = contents
                .iter()
                .find(|(n, _)| *n == name)
                .map_or([0.; 3], |(_, c)| *c);
            file.insert(CATEGORY, &hist(name, 2., &content, &[0.; 3]));
        }
        file
    }

    fn shift(cmp: &Comparison, group: &str) -> Float {
        cmp.shifts
            .iter()
            .find(|shift| shift.group == group)
            .unwrap()
            .value()
    }

    fn contents(hist: &Histogram) -> Vec<Float> {
        hist.contents().iter().copied().collect()
    }

    #[test]
    fn postfit_rescaling_and_shifts() {
        let file = sample_file(&[("ZTT", [10., 20., 30.]), ("data_obs", [8., 16., 0.])], &[]);
        let cmp = run(&config(""), &ztt_table(), &file).unwrap();

        let ztt = &cmp.backgrounds.layers()[5];
        assert_eq!(ztt.name(), "ZTT");
        assert_relative_eq!(ztt.content(0), 5.5, epsilon = 1e-5);
        assert_relative_eq!(ztt.content(1), 11., epsilon = 1e-5);
        assert_relative_eq!(ztt.content(2), 16.5, epsilon = 1e-5);
        assert_eq!(contents(&cmp.reference), [5., 10., 15.]);
        assert_eq!(ztt.uncertainties().sum(), 0.);

        let shift = |group: &str| {
            cmp.shifts
                .iter()
                .find(|shift| shift.group == group)
                .unwrap()
                .value()
        };
        assert_relative_eq!(shift("Ztt"), 0.1, epsilon = 1e-5);
        assert_eq!(shift("Fakes"), 0.);
        assert_eq!(shift("ggH"), 0.);

        for bin in 0..3 {
            assert_relative_eq!(cmp.fit_ratio.content(bin), 0.1, epsilon = 1e-5);
        }
        assert_eq!(cmp.error_band.name(), "errorBand");
        assert_eq!(contents(&cmp.error_band), contents(ztt));
    }

    #[test]
    fn prefit_data_over_model() {
        let file = sample_file(&[("ZTT", [10., 20., 30.]), ("data_obs", [8., 16., 0.])], &[]);
        let cmp = run(&config("apply_fit_scaling no"), &ztt_table(), &file).unwrap();
        assert_eq!(cmp.data.name(), "data_obs");
        assert_eq!(contents(&cmp.data), [4., 8., 0.]);
        assert_relative_eq!(cmp.data_ratio.content(0), -0.2, epsilon = 1e-6);
        assert_relative_eq!(cmp.data_ratio.content(1), -0.2, epsilon = 1e-6);
        assert_eq!(cmp.data_ratio.content(2), 0.);
        assert_eq!(contents(&cmp.fit_ratio), [0., 0., 0.]);
        assert!(cmp.shifts.iter().all(|shift| shift.value() == 0.));
    }

    #[test]
    fn signal_stacking_depends_on_scale() {
        let file = sample_file(&[("ZTT", [10., 20., 30.]), ("ggH125", [2., 2., 2.])], &[]);
        let table = ScaleTable::default();

        let log = run(&config("apply_fit_scaling no\nsignal_scale 2"), &table, &file).unwrap();
        assert_eq!(contents(log.signals.top().unwrap()), [2., 2., 2.]);

        let linear = config("apply_fit_scaling no\nsignal_scale 2\nlog_scale no");
        let linear = run(&linear, &table, &file).unwrap();
        assert_eq!(contents(linear.signals.top().unwrap()), [7., 12., 17.]);
        assert_eq!(linear.signals.layers().len(), 3);
        assert_eq!(linear.signals.top().unwrap().name(), "ggH125");
    }

    #[test]
    fn blinding_hides_data_bins() {
        let file = sample_file(&[("ZTT", [10., 20., 30.]), ("data_obs", [8., 16., 4.])], &[]);
        let cfg = config("apply_fit_scaling no\nblinding above 2");
        let cmp = run(&cfg, &ScaleTable::default(), &file).unwrap();
        assert_eq!(contents(&cmp.data), [4., 0., 0.]);
        assert_eq!(cmp.data.uncertainty(1), 0.);
        assert!(cmp.data.uncertainty(0) > 0.);
    }

    #[test]
    fn missing_inputs_are_fatal() {
        let file = sample_file(&[], &["TT"]);
        let err = run(&config(""), &ztt_table(), &file).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingInput {
                category: CATEGORY.to_owned(),
                process: "TT".to_owned(),
            })
        );
        let file = sample_file(&[], &["data_obs"]);
        assert!(run(&config(""), &ztt_table(), &file).is_err());
    }

    #[test]
    fn asimov_data_is_built_from_the_expectation() {
        let file = sample_file(
            &[("ZTT", [10., 20., 30.]), ("ggH125", [2., 2., 2.])],
            &["data_obs"],
        );
        let cfg = config("apply_fit_scaling no\nasimov yes");
        let cmp = run(&cfg, &ScaleTable::default(), &file).unwrap();
        assert_eq!(cmp.data.name(), "data_obs");
        assert_eq!(contents(&cmp.data), [6., 11., 16.]);
        assert_relative_eq!(cmp.data.uncertainty(0), (12 as Float).sqrt() / 2., epsilon = 1e-5);
    }

    #[test]
    fn automatic_maximum() {
        assert_relative_eq!(auto_maximum(2000., true), 1e6);
        assert_relative_eq!(auto_maximum(20., true), 1000.);
        assert_relative_eq!(auto_maximum(5., true), 250.);
        assert_relative_eq!(auto_maximum(20., false), 30.);
        assert_relative_eq!(auto_maximum(5., false), 8.);
        assert_relative_eq!(auto_maximum(1., false), 1.6, epsilon = 1e-6);
    }

    #[test]
    fn explicit_maximum_wins() {
        let file = sample_file(&[("ZTT", [10., 20., 30.])], &[]);
        let cmp = run(&config("apply_fit_scaling no\ny_max 42"), &ScaleTable::default(), &file)
            .unwrap();
        assert_eq!(cmp.y_range, (0.1, 42.));
        let cmp = run(&config("apply_fit_scaling no"), &ScaleTable::default(), &file).unwrap();
        assert_relative_eq!(cmp.y_range.1, 750.);
    }

    #[test]
    fn mass_axis_cutoffs() {
        let h = Histogram::uniform("data_obs", 10, 0., 500.);
        assert_eq!(display_range(&h, Channel::MuTau, Hypothesis::Sm, true), (0., 400.));
        assert_eq!(display_range(&h, Channel::MuTau, Hypothesis::Mssm, false), (0., 400.));
        assert_eq!(display_range(&h, Channel::MuTau, Hypothesis::Mssm, true), (0., 500.));
        assert_eq!(display_range(&h, Channel::MuMu, Hypothesis::Sm, false), (0., 500.));
    }

    #[test]
    fn empty_log_plots_keep_an_upright_axis() {
        let file = sample_file(&[], &[]);
        let cmp = run(&config("apply_fit_scaling no"), &ScaleTable::default(), &file).unwrap();
        assert_eq!(cmp.y_range.0, 0.1);
        assert_relative_eq!(cmp.y_range.1, 1., epsilon = 1e-6);
        assert!(cmp.y_range.1 > cmp.y_range.0);

        let linear = config("apply_fit_scaling no\nlog_scale no\ny_min 0");
        let cmp = run(&linear, &ScaleTable::default(), &file).unwrap();
        assert_eq!(cmp.y_range, (0., 1.));
    }

    #[test]
    fn extra_samples_are_summed_into_the_ewk_group() {
        let cfg = config("extra_samples yes");
        let registry = Registry::new(cfg.registry.clone());
        let file = catalog_file(
            &registry,
            Origin::Main,
            &[
                ("W", [2., 2., 2.]),
                ("ZJ", [2., 2., 2.]),
                ("ZL", [4., 4., 4.]),
                ("VV", [2., 2., 2.]),
            ],
        );
        let mut table = ScaleTable::default();
        table.insert("W", ScaleRule::Scale(2.));
        table.insert("ZJ", ScaleRule::Scale(1.5));
        let cmp = run(&cfg, &table, &file).unwrap();

        let ewk = cmp.shifts.iter().find(|shift| shift.group == "EWK").unwrap();
        assert_relative_eq!(ewk.before, 15., epsilon = 1e-5);
        assert_relative_eq!(ewk.after, 19.5, epsilon = 1e-5);
        assert_relative_eq!(ewk.value(), 0.3, epsilon = 1e-5);

        // The drawn EWK layer is the running sum of W, ZJ, ZL and VV
        let (idx, _) = registry.by_input_name("VV").unwrap();
        let vv = &cmp.backgrounds.layers()[idx];
        for bin in 0..3 {
            assert_relative_eq!(vv.content(bin), 6.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn mumu_groups_and_signal_indices() {
        let card = RUN_CARD.replace("channel     mt", "channel     mm");
        let cfg = Configuration::parse(&card).unwrap();
        let registry = Registry::new(cfg.registry.clone());
        let file = catalog_file(
            &registry,
            Origin::Main,
            &[
                ("ZMM", [4., 4., 4.]),
                ("WJets", [2., 2., 2.]),
                ("ggH125", [2., 2., 2.]),
                ("data_obs", [6., 6., 6.]),
            ],
        );
        let mut table = ScaleTable::default();
        table.insert("ZMM", ScaleRule::Scale(0.5));
        table.insert("ggH125", ScaleRule::Scale(2.));
        let cmp = run(&cfg, &table, &file).unwrap();

        assert_eq!(cmp.shifts.len(), 9);
        assert_relative_eq!(shift(&cmp, "ZMM"), -0.5, epsilon = 1e-5);
        assert_eq!(shift(&cmp, "WJets"), 0.);
        assert_eq!(shift(&cmp, "ZTT"), 0.);
        assert_relative_eq!(shift(&cmp, "ggH"), 1., epsilon = 1e-5);
        assert_eq!(shift(&cmp, "VH"), 0.);

        assert_eq!(cmp.backgrounds.layers().len(), 6);
        assert_eq!(cmp.backgrounds.top().unwrap().name(), "WJets");
        assert_eq!(contents(cmp.backgrounds.top().unwrap()), [2., 2., 2.]);
        assert_eq!(contents(cmp.signals.top().unwrap()), [2., 2., 2.]);
        assert_relative_eq!(cmp.data_ratio.content(0), 0.5, epsilon = 1e-5);
        assert_eq!(cmp.x_range, (0., 6.));
    }

    #[test]
    fn mssm_signals_are_read_from_the_signal_source() {
        let card = RUN_CARD.replace("hypothesis  sm", "hypothesis  mssm\nsignal_mass 160");
        let cfg = config_from(&card, "apply_fit_scaling no");
        let registry = Registry::new(cfg.registry.clone());
        let main = catalog_file(&registry, Origin::Main, &[("ZTT", [10., 20., 30.])]);
        let signal = catalog_file(
            &registry,
            Origin::Signal,
            &[("ggH160", [2., 2., 2.]), ("bbH160", [4., 4., 4.])],
        );
        assert!(main.names(CATEGORY).iter().all(|name| !name.ends_with("160")));

        let table = ScaleTable::default();
        let analysis = Analysis {
            config: &cfg,
            registry: &registry,
            table: &table,
            main: &main,
            signal: Some(&signal),
        };
        let cmp = analysis.run(CATEGORY).unwrap();
        let names = cmp
            .signals
            .layers()
            .iter()
            .map(|layer| layer.name())
            .collect::<Vec<_>>();
        assert_eq!(names, ["bbH160", "ggH160"]);
        assert_eq!(contents(cmp.signals.top().unwrap()), [3., 3., 3.]);

        // Without a signal source, the signals are looked up in the main file
        let err = run(&cfg, &table, &main).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingInput {
                category: CATEGORY.to_owned(),
                process: "bbH160".to_owned(),
            })
        );
    }
}
