//! Catalog of the physical processes which appear on the plots
//!
//! Which processes exist depends on the analysis channel and on the physics
//! hypothesis (Standard Model or MSSM). Rather than duplicating the pipeline
//! for each combination, the combination is turned into one `Registry` value
//! at startup, and the pipeline iterates over it uniformly.

use crate::{error::PipelineError, plot::Color};

use eyre::{bail, Error};

use std::{fmt, str::FromStr};

/// Physics hypothesis under which the fit was performed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hypothesis {
    /// Standard Model Higgs boson (m_H = 125 GeV)
    Sm,

    /// MSSM neutral Higgs bosons
    Mssm,
}
//
impl FromStr for Hypothesis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "sm" => Ok(Self::Sm),
            "mssm" => Ok(Self::Mssm),
            other => bail!("Unknown hypothesis {:?} (expected sm or mssm)", other),
        }
    }
}
//
impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sm => write!(f, "SM"),
            Self::Mssm => write!(f, "MSSM"),
        }
    }
}

/// Final state of the analysis channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// One muon and one hadronically decaying tau
    MuTau,

    /// Two muons
    MuMu,
}
//
impl Channel {
    /// Text label of the final state, as displayed on the main plot
    pub fn label(self) -> &'static str {
        match self {
            Self::MuTau => "μτh",
            Self::MuMu => "μμ",
        }
    }

    /// Human-readable label of an event category, if it is a known one
    pub fn category_label(self, category: &str) -> Option<&'static str> {
        match (self, category) {
            (Self::MuTau, "muTau_0jet_low") => Some("0 jet, low pT"),
            (Self::MuTau, "muTau_0jet_high") => Some("0 jet, high pT"),
            (Self::MuTau, "muTau_1jet_low") => Some("1 jet, low pT"),
            (Self::MuTau, "muTau_1jet_high") => Some("1 jet, high pT"),
            (Self::MuTau, "muTau_vbf") => Some("2 jet (VBF)"),
            (Self::MuTau, "muTau_nobtag") => Some("No B-Tag"),
            (Self::MuTau, "muTau_btag") => Some("B-Tag"),
            _ => None,
        }
    }

    /// Header describing the dataset for a given center-of-mass energy tag
    pub fn dataset_label(self, energy: &str) -> String {
        match (self, energy) {
            (Self::MuTau, "7TeV") => "CMS Preliminary, H→ττ, 4.9 fb⁻¹ at 7 TeV".to_owned(),
            (Self::MuTau, _) => "CMS Preliminary, H→ττ, 19.8 fb⁻¹ at 8 TeV".to_owned(),
            (Self::MuMu, "7TeV") => "√s = 7 TeV, L = 4.8 fb⁻¹".to_owned(),
            (Self::MuMu, _) => "√s = 8 TeV, L = 5.1 fb⁻¹".to_owned(),
        }
    }

    /// Title of the x axis
    pub fn x_title(self) -> &'static str {
        match self {
            Self::MuTau => "m_ττ [GeV]",
            Self::MuMu => "N_bin",
        }
    }

    /// Title of the y axis of the main plot
    pub fn y_title(self) -> &'static str {
        match self {
            Self::MuTau => "dN/dm_ττ [1/GeV]",
            Self::MuMu => "dN/dN_bin",
        }
    }

    /// Symmetric y range of the data over model ratio plot
    pub fn data_ratio_range(self) -> f64 {
        match self {
            Self::MuTau => 0.5,
            Self::MuMu => 1.5,
        }
    }

    /// Symmetric y range of the per-sample shift summary
    pub fn shift_range(self) -> f64 {
        match self {
            Self::MuTau => 1.0,
            Self::MuMu => 1.5,
        }
    }
}
//
impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "mt" | "mutau" => Ok(Self::MuTau),
            "mm" | "mumu" => Ok(Self::MuMu),
            other => bail!("Unknown channel {:?} (expected mt or mm)", other),
        }
    }
}
//
impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MuTau => write!(f, "mt"),
            Self::MuMu => write!(f, "mm"),
        }
    }
}

/// Role of a process in the comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Simulated or data-driven background, drawn as a filled stack
    Background,

    /// Hypothetical signal, drawn as an outlined layer
    Signal,
}

/// Which input file a process histogram is read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// The main histogram file
    Main,

    /// The dedicated signal file (MSSM mass/tanβ point), if any
    Signal,
}

/// How a process is displayed
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Style {
    /// Filled area of the given color
    Filled(Color),

    /// Unfilled dashed outline
    Outline(Color),
}

/// One physical process of the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct Process {
    /// Name of the histogram in the input file
    pub input_name: String,

    /// Name under which the processed histogram is persisted and labelled,
    /// or None for intermediate components that are only part of the stack
    pub output_name: Option<&'static str>,

    /// Background or signal
    pub role: Role,

    /// Input file which holds this process
    pub origin: Origin,

    /// Index identifying the process in the fit-result correction table
    pub fit_index: usize,

    /// Group of processes whose relative shift is reported together
    pub shift_group: &'static str,

    /// Display style
    pub style: Style,

    /// Legend text, for the processes which have a legend entry
    pub legend: Option<&'static str>,
}

/// Options which alter the content of a catalog
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryOptions {
    /// Analysis channel
    pub channel: Channel,

    /// Physics hypothesis
    pub hypothesis: Hypothesis,

    /// Split the Z→ll background into jet-faked (ZJ) and lepton-faked (ZL)
    pub extra_samples: bool,

    /// Remove all signal processes
    pub drop_signal: bool,

    /// Mass suffix of the signal histograms (e.g. "125", or the MSSM mA)
    pub signal_mass: String,
}

/// Ordered catalog of the processes of one analysis configuration
///
/// The order of the processes is the stacking order: backgrounds come first,
/// from the bottom of the stack to its top, followed by the signals in the
/// same bottom-to-top order.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    /// Options from which the catalog was built
    options: RegistryOptions,

    /// Processes, in stacking order
    processes: Vec<Process>,
}
//
impl Registry {
    /// Build the catalog matching some registry options
    pub fn new(options: RegistryOptions) -> Self {
        let mut processes = match options.channel {
            Channel::MuTau => mutau_backgrounds(options.extra_samples),
            Channel::MuMu => mumu_backgrounds(),
        };
        if !options.drop_signal {
            processes.extend(signals(&options));
        }
        Self { options, processes }
    }

    /// Options from which this catalog was built
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// All processes, in stacking order
    pub fn processes(&self) -> &[Process] {
        &self.processes[..]
    }

    /// Processes of a given role, in stacking order, with their position
    pub fn with_role(&self, role: Role) -> impl Iterator<Item = (usize, &Process)> + '_ {
        self.processes
            .iter()
            .enumerate()
            .filter(move |(_, process)| process.role == role)
    }

    /// Find a process from its fit-result index
    pub fn by_fit_index(&self, index: usize) -> Result<(usize, &Process), PipelineError> {
        self.processes
            .iter()
            .enumerate()
            .find(|(_, process)| process.fit_index == index)
            .ok_or_else(|| PipelineError::UnknownProcess {
                index,
                hypothesis: self.description(),
            })
    }

    /// Find a process from its input histogram name
    pub fn by_input_name(&self, name: &str) -> Result<(usize, &Process), PipelineError> {
        self.processes
            .iter()
            .enumerate()
            .find(|(_, process)| process.input_name == name)
            .ok_or_else(|| PipelineError::UnknownProcessName(name.to_owned()))
    }

    /// Relative-shift groups, in order of first appearance
    pub fn shift_groups(&self) -> Vec<&'static str> {
        let mut groups = Vec::new();
        for process in &self.processes {
            if !groups.contains(&process.shift_group) {
                groups.push(process.shift_group);
            }
        }
        groups
    }

    /// Short description of this catalog, for messages
    pub fn description(&self) -> String {
        let mut desc = format!("{}/{}", self.options.channel, self.options.hypothesis);
        if self.options.drop_signal {
            desc.push_str(" (no signal)");
        }
        desc
    }
}

// ROOT-like palette of the background processes
const PINK: Color = Color::rgb(0xff, 0xcc, 0xff);
const DARK_RED: Color = Color::rgb(0x99, 0x00, 0x00);
const LAVENDER: Color = Color::rgb(0x99, 0x99, 0xcc);
const LIGHT_ORANGE: Color = Color::rgb(0xff, 0xcc, 0x66);
const GREEN: Color = Color::rgb(0x33, 0xcc, 0x33);
const OLIVE: Color = Color::rgb(0xcc, 0xcc, 0x00);
const SIGNAL_BLUE: Color = Color::rgb(0x00, 0x00, 0xff);

/// Shorthand for defining a background process
fn background(
    input_name: &str,
    output_name: Option<&'static str>,
    fit_index: usize,
    shift_group: &'static str,
    color: Color,
    legend: Option<&'static str>,
) -> Process {
    Process {
        input_name: input_name.to_owned(),
        output_name,
        role: Role::Background,
        origin: Origin::Main,
        fit_index,
        shift_group,
        style: Style::Filled(color),
        legend,
    }
}

/// Backgrounds of the μτ channel, bottom of the stack first
fn mutau_backgrounds(extra_samples: bool) -> Vec<Process> {
    let mut processes = vec![
        background("QCD", Some("Fakes"), 7, "Fakes", PINK, Some("QCD")),
        background("W", None, 3, "EWK", DARK_RED, None),
    ];
    if extra_samples {
        processes.push(background("ZJ", None, 4, "EWK", DARK_RED, None));
        processes.push(background("ZL", None, 5, "EWK", DARK_RED, None));
    } else {
        processes.push(background("ZLL", None, 4, "EWK", DARK_RED, None));
    }
    processes.extend([
        background("VV", Some("EWK"), 6, "EWK", DARK_RED, Some("electroweak")),
        background("TT", Some("ttbar"), 2, "ttbar", LAVENDER, Some("tt̄")),
        background("ZTT", Some("Ztt"), 1, "Ztt", LIGHT_ORANGE, Some("Z→ττ")),
    ]);
    processes
}

/// Backgrounds of the μμ channel, bottom of the stack first
fn mumu_backgrounds() -> Vec<Process> {
    vec![
        background("ZTT", Some("ZTT"), 1, "ZTT", GREEN, Some("Z→ττ")),
        background("ZMM", Some("ZMM"), 2, "ZMM", OLIVE, Some("Z→μμ")),
        background("TTJ", Some("TTJ"), 3, "TTJ", PINK, Some("tt̄")),
        background("QCD", Some("QCD"), 4, "QCD", DARK_RED, Some("QCD")),
        background("Dibosons", Some("Dibosons"), 5, "Dibosons", LAVENDER, Some("Dibosons")),
        background("WJets", Some("WJets"), 6, "WJets", LIGHT_ORANGE, Some("WJets")),
    ]
}

/// Signal processes, bottom of the signal stack first
fn signals(options: &RegistryOptions) -> Vec<Process> {
    // Fit indices of the signals follow those of the backgrounds
    let first_index = match options.channel {
        Channel::MuTau => 8,
        Channel::MuMu => 7,
    };
    let (names, origin): (&[&'static str], _) = match options.hypothesis {
        Hypothesis::Sm => (&["ggH", "qqH", "VH"], Origin::Main),
        Hypothesis::Mssm => (&["ggH", "bbH"], Origin::Signal),
    };
    let mut processes = names
        .iter()
        .enumerate()
        .map(|(offset, &name)| Process {
            input_name: format!("{}{}", name, options.signal_mass),
            output_name: Some(name),
            role: Role::Signal,
            origin,
            fit_index: first_index + offset,
            shift_group: name,
            style: Style::Outline(SIGNAL_BLUE),
            // Only the top of the signal stack gets a legend entry
            legend: (offset == 0).then_some(match options.hypothesis {
                Hypothesis::Sm => "H(125 GeV)→ττ",
                Hypothesis::Mssm => "φ→ττ",
            }),
        })
        .collect::<Vec<_>>();

    // The signal stack is built bottom-up, so the dominant ggH goes last
    processes.reverse();
    processes
}
