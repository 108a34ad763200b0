//! Mechanism for loading and sharing the plotting configuration

use crate::{
    numeric::Float,
    plot::ImageFormat,
    process::{Channel, Hypothesis, RegistryOptions},
    refill::Blinding,
    Result,
};

use eyre::{bail, ensure, format_err, Report, WrapErr};

use std::{collections::BTreeMap, fs, path::PathBuf, str::FromStr};

/// Keys which may appear in a run-card
const KNOWN_KEYS: &[&str] = &[
    "input",
    "signal_input",
    "fit_result",
    "output_dir",
    "channel",
    "hypothesis",
    "categories",
    "apply_fit_scaling",
    "log_scale",
    "y_min",
    "y_max",
    "blinding",
    "drop_signal",
    "asimov",
    "extra_samples",
    "signal_scale",
    "signal_mass",
    "full_plots",
    "formats",
    "snapshot_json",
];

/// Plotting configuration
#[derive(Clone, Debug)]
pub struct Configuration {
    /// File holding the per-category input histograms
    pub input: PathBuf,

    /// File holding the signal histograms, if not the main input file
    pub signal_input: Option<PathBuf>,

    /// Fit-result correction table (needed when applying the fit)
    pub fit_result: Option<PathBuf>,

    /// Directory where plots and histograms are written
    pub output_dir: PathBuf,

    /// Selection of the process catalog
    pub registry: RegistryOptions,

    /// Event categories (input directories) to be processed
    pub categories: Vec<String>,

    /// Whether the fit-derived corrections should be applied (post-fit plots)
    pub apply_fit_scaling: bool,

    /// Whether the main plot uses a logarithmic y axis
    pub log_scale: bool,

    /// Minimum of the main plot's y axis
    pub y_min: Float,

    /// Maximum of the main plot's y axis (computed automatically if <= 0)
    pub y_max: Float,

    /// Blinding policy for the observed data
    pub blinding: Blinding,

    /// Use an Asimov dataset in place of the observed data
    pub asimov: bool,

    /// Multiplier applied to every signal histogram
    pub signal_scale: Float,

    /// Write every plot, even those that are redundant for this mode
    pub full_plots: bool,

    /// Image formats to be produced
    pub formats: Vec<ImageFormat>,

    /// Also write a JSON copy of the histogram snapshot
    pub snapshot_json: bool,
}
//
impl Configuration {
    /// Load the configuration from a file
    ///
    /// The result is not checked yet, since command-line overrides may still
    /// change it. Call `override_with` (or `check`) before using it.
    ///
    pub fn load(file_name: &str) -> Result<Self> {
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Could not read configuration file {}", file_name))?;
        Self::parse(&config_str)
    }

    /// Decode a run-card, without checking it
    pub fn parse(config_str: &str) -> Result<Self> {
        let mut items = ConfigItems::new(config_str)?;

        // Decode the configuration items into concrete values
        let hypothesis = items.required("hypothesis")?.parse::<Hypothesis>()?;
        let registry = RegistryOptions {
            channel: items.required("channel")?.parse::<Channel>()?,
            hypothesis,
            extra_samples: items.flag("extra_samples", false)?,
            drop_signal: items.flag("drop_signal", false)?,
            signal_mass: items
                .optional("signal_mass")
                .map(|item| item.data.to_owned())
                .unwrap_or_else(|| "125".to_owned()),
        };
        Ok(Configuration {
            input: items.required("input")?.parse::<PathBuf>()?,
            signal_input: items
                .optional("signal_input")
                .map(ConfigItem::parse::<PathBuf>)
                .transpose()?,
            fit_result: items
                .optional("fit_result")
                .map(ConfigItem::parse::<PathBuf>)
                .transpose()?,
            output_dir: items
                .optional("output_dir")
                .map(ConfigItem::parse::<PathBuf>)
                .transpose()?
                .unwrap_or_else(|| PathBuf::from(".")),
            registry,
            categories: items.required("categories")?.words(),
            apply_fit_scaling: items.flag("apply_fit_scaling", true)?,
            log_scale: items.flag("log_scale", true)?,
            y_min: items.number("y_min", 0.1)?,
            y_max: items.number("y_max", -1.)?,
            blinding: items
                .optional("blinding")
                .map(ConfigItem::parse::<Blinding>)
                .transpose()?
                .unwrap_or(Blinding::Off),
            asimov: items.flag("asimov", false)?,
            signal_scale: items.number("signal_scale", 1.)?,
            full_plots: items.flag("full_plots", false)?,
            formats: match items.optional("formats") {
                Some(item) => item
                    .words()
                    .iter()
                    .map(|word| word.parse::<ImageFormat>())
                    .collect::<Result<Vec<_>>>()
                    .wrap_err("Could not parse configuration of formats")?,
                None => ImageFormat::available().to_vec(),
            },
            snapshot_json: items.flag("snapshot_json", false)?,
        })
    }

    /// Apply command-line overrides, then re-check the configuration
    pub fn override_with(
        &mut self,
        prefit: bool,
        linear: bool,
        categories: &[String],
    ) -> Result<()> {
        if prefit {
            self.apply_fit_scaling = false;
        }
        if linear {
            self.log_scale = false;
        }
        if !categories.is_empty() {
            for category in categories {
                ensure!(
                    self.categories.contains(category),
                    "Category {} is not part of the configuration",
                    category
                );
            }
            self.categories = categories.to_vec();
        }
        self.check()
    }

    /// Check the consistency of the configuration
    pub fn check(&self) -> Result<()> {
        ensure!(
            !self.categories.is_empty(),
            "Please configure at least one category"
        );
        for (idx, category) in self.categories.iter().enumerate() {
            ensure!(
                !self.categories[..idx].contains(category),
                "Category {} is listed twice",
                category
            );
        }
        ensure!(
            !self.log_scale || self.y_min > 0.,
            "A logarithmic y axis needs a positive y_min"
        );
        ensure!(
            self.y_max <= 0. || self.y_max > self.y_min,
            "y_max must be larger than y_min (or <= 0 for automatic)"
        );
        ensure!(self.signal_scale > 0., "signal_scale must be positive");
        ensure!(
            !self.apply_fit_scaling || self.fit_result.is_some(),
            "Applying the fit corrections requires a fit_result table"
        );
        ensure!(!self.formats.is_empty(), "Please request at least one image format");
        if let Blinding::Window(low, high) = self.blinding {
            ensure!(low < high, "Blinding window bounds must be ordered");
        }
        Ok(())
    }

    /// Center-of-mass energy tag, deduced from the input file name
    pub fn energy_tag(&self) -> &'static str {
        if self.input.to_string_lossy().contains("7TeV") {
            "7TeV"
        } else {
            "8TeV"
        }
    }

    /// Display the configuration
    pub fn print(&self) {
        let opt_path = |path: &Option<PathBuf>| {
            path.as_ref()
                .map_or_else(|| "-".to_owned(), |p| p.display().to_string())
        };
        let formats = self
            .formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!("INPUT             : {}", self.input.display());
        tracing::info!("SIGNAL INPUT      : {}", opt_path(&self.signal_input));
        tracing::info!("FIT RESULT        : {}", opt_path(&self.fit_result));
        tracing::info!("OUTPUT DIR        : {}", self.output_dir.display());
        tracing::info!("CHANNEL           : {}", self.registry.channel);
        tracing::info!("HYPOTHESIS        : {}", self.registry.hypothesis);
        tracing::info!("CATEGORIES        : {}", self.categories.join(" "));
        tracing::info!("APPLY FIT SCALING : {}", self.apply_fit_scaling);
        tracing::info!("LOG SCALE         : {}", self.log_scale);
        tracing::info!("Y RANGE           : {} .. {}", self.y_min, self.y_max);
        tracing::info!("BLINDING          : {}", self.blinding);
        tracing::info!("DROP SIGNAL       : {}", self.registry.drop_signal);
        tracing::info!("ASIMOV            : {}", self.asimov);
        tracing::info!("EXTRA SAMPLES     : {}", self.registry.extra_samples);
        tracing::info!("SIGNAL SCALE      : {}", self.signal_scale);
        tracing::info!("SIGNAL MASS       : {}", self.registry.signal_mass);
        tracing::info!("FULL PLOTS        : {}", self.full_plots);
        tracing::info!("FORMATS           : {}", formats);
        tracing::info!("SNAPSHOT JSON     : {}", self.snapshot_json);
    }
}

/// Run-card items, indexed by key
struct ConfigItems<'data>(BTreeMap<&'data str, ConfigItem<'data>>);
//
impl<'data> ConfigItems<'data> {
    /// Split a run-card into items, rejecting unknown and duplicate keys
    fn new(config_str: &'data str) -> Result<Self> {
        let mut items = BTreeMap::new();
        for (line_idx, line) in config_str.lines().enumerate() {
            // Strip comments and surrounding whitespace, ignore blank lines
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            // The key is the first word, the rest of the line is its value
            let (name, data) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(name, data)| (name, data.trim()));
            let name = KNOWN_KEYS
                .iter()
                .copied()
                .find(|&known| known == name)
                .ok_or_else(|| {
                    format_err!("Unknown configuration key {} on line {}", name, line_idx + 1)
                })?;
            if items.insert(name, ConfigItem::new(name, data)).is_some() {
                bail!("Configuration key {} appears twice", name);
            }
        }
        Ok(Self(items))
    }

    /// Fetch a mandatory item
    fn required(&mut self, name: &'static str) -> Result<ConfigItem<'data>> {
        self.0
            .remove(name)
            .ok_or_else(|| format_err!("Missing configuration of {}", name))
    }

    /// Fetch an optional item
    fn optional(&mut self, name: &'static str) -> Option<ConfigItem<'data>> {
        self.0.remove(name)
    }

    /// Fetch an optional boolean item
    fn flag(&mut self, name: &'static str, default: bool) -> Result<bool> {
        self.optional(name)
            .map_or(Ok(default), ConfigItem::parse_bool)
    }

    /// Fetch an optional numerical item
    fn number(&mut self, name: &'static str, default: Float) -> Result<Float> {
        self.optional(name)
            .map_or(Ok(default), ConfigItem::parse::<Float>)
    }
}

/// A value from the configuration file, tagged with the configuration key
/// which it belongs to for error reporting purposes.
struct ConfigItem<'data> {
    name: &'static str,
    data: &'data str,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from a key and the raw value text
    fn new(name: &'static str, data: &'data str) -> Self {
        Self { name, data }
    }

    /// Parse this data using Rust's standard parsing logic
    fn parse<T: FromStr>(self) -> Result<T>
    where
        <T as FromStr>::Err: Into<Report>,
    {
        ensure!(!self.data.is_empty(), "Missing value for {}", self.name);
        self.data
            .parse::<T>()
            .map_err(Into::into)
            .wrap_err_with(|| format!("Could not parse configuration of {}", self.name))
    }

    /// Parse this data as a boolean, accepting the usual spellings
    fn parse_bool(self) -> Result<bool> {
        match self.data.to_lowercase().as_str() {
            "yes" | "on" | "1" => Ok(true),
            "no" | "off" | "0" => Ok(false),
            // Delegate other booleans to the standard Rust parser
            _ => self.parse::<bool>(),
        }
    }

    /// Split this data into whitespace-separated words
    fn words(self) -> Vec<String> {
        self.data.split_whitespace().map(str::to_owned).collect()
    }
}
