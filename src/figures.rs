//! Composition of the plot documents of a category

use crate::{
    config::Configuration,
    histogram::Histogram,
    pipeline::Comparison,
    plot::{Axis, Color, Document, Draw, Layer},
    process::{Hypothesis, Process, Registry, Role, Style},
    ratio::shift_histograms,
};

// Document sizes, in points
const MAIN_SIZE: (f64, f64) = (600., 600.);
const RATIO_SIZE: (f64, f64) = (600., 400.);

/// Symmetric vertical range of the fit over prefit comparison
const FIT_RATIO_RANGE: f64 = 0.3;

/// The plots of one category
#[derive(Clone, Debug, PartialEq)]
pub struct Figures {
    /// Stacked comparison of the data and the model
    pub main: Document,

    /// Data over model ratio
    pub data_ratio: Document,

    /// Corrected over uncorrected model ratio
    pub fit_ratio: Document,

    /// Relative shift of each process group
    pub shifts: Document,
}

/// Drawing attributes of a process
fn draw(process: &Process) -> Draw {
    match process.style {
        Style::Filled(fill) => Draw::Filled {
            fill,
            line: Color::BLACK,
        },
        Style::Outline(color) => Draw::Line {
            color,
            dashed: true,
        },
    }
}

/// Build the plots of a processed category
pub fn compose(cmp: &Comparison, config: &Configuration, registry: &Registry) -> Figures {
    let options = registry.options();
    let channel = options.channel;
    let (x_min, x_max) = (cmp.x_range.0 as f64, cmp.x_range.1 as f64);
    let mass_axis = || Axis::linear(channel.x_title(), x_min, x_max);

    // Backgrounds which are drawn on their own, top of the stack first
    let mut backgrounds = registry
        .with_role(Role::Background)
        .zip(cmp.backgrounds.layers())
        .filter(|((_, process), _)| process.output_name.is_some())
        .map(|((_, process), hist)| (process, hist))
        .collect::<Vec<_>>();
    backgrounds.reverse();

    // Only the top of the signal stack is drawn
    let signal = registry
        .with_role(Role::Signal)
        .map(|(_, process)| process)
        .last()
        .zip(cmp.signals.top());

    let layer = |hist: &Histogram, draw: Draw| Layer {
        hist: hist.clone(),
        draw,
    };
    let mut layers = Vec::new();
    if let (Some((process, hist)), false) = (signal, config.log_scale) {
        layers.push(layer(hist, draw(process)));
    }
    layers.extend(backgrounds.iter().map(|&(process, hist)| layer(hist, draw(process))));
    layers.push(layer(&cmp.error_band, Draw::Hatched(Color::BLACK)));
    if let (Some((process, hist)), true) = (signal, config.log_scale) {
        layers.push(layer(hist, draw(process)));
    }
    layers.push(layer(&cmp.data, Draw::Markers(Color::BLACK)));

    // Legend, mirroring the stack
    let mut legend = Vec::new();
    if let Some((process, _)) = signal {
        if let Some(text) = signal_legend(process, config.signal_scale as f64) {
            legend.push((text, draw(process)));
        }
    }
    let data_legend = if config.asimov {
        "sum(bkg) + signal"
    } else {
        "observed"
    };
    legend.push((data_legend.to_owned(), Draw::Markers(Color::BLACK)));
    legend.extend(backgrounds.iter().filter_map(|(process, _)| {
        process
            .legend
            .map(|text| (text.to_owned(), draw(process)))
    }));
    legend.push(("bkg. uncertainty".to_owned(), Draw::Hatched(Color::BLACK)));

    let mut annotations = vec![channel.label().to_owned()];
    annotations.extend(channel.category_label(&cmp.category).map(str::to_owned));
    if options.hypothesis == Hypothesis::Mssm {
        annotations.push(format!("m_A = {} GeV", options.signal_mass));
    }
    let header = vec![channel.dataset_label(config.energy_tag())];

    let main = Document {
        width: MAIN_SIZE.0,
        height: MAIN_SIZE.1,
        header: header.clone(),
        annotations,
        x: mass_axis(),
        y: Axis {
            log: config.log_scale,
            ..Axis::linear(
                channel.y_title(),
                cmp.y_range.0 as f64,
                cmp.y_range.1 as f64,
            )
        },
        layers,
        legend,
        zero_line: false,
        grid: false,
    };

    // Ratio plots share their layout
    let ratio = |hist: &Histogram, title: &str, range: f64, fill: Color, line: Color| Document {
        width: RATIO_SIZE.0,
        height: RATIO_SIZE.1,
        header: header.clone(),
        annotations: Vec::new(),
        x: mass_axis(),
        y: Axis::linear(title, -range, range),
        layers: vec![layer(hist, Draw::Filled { fill, line })],
        legend: Vec::new(),
        zero_line: true,
        grid: true,
    };
    let data_ratio = ratio(
        &cmp.data_ratio,
        "Data/MC-1",
        channel.data_ratio_range(),
        Color::GRAY,
        Color::BLACK,
    );
    let fit_ratio = ratio(
        &cmp.fit_ratio,
        "Fit/Prefit-1",
        FIT_RATIO_RANGE,
        Color::PALE_RED,
        Color::DARK_RED,
    );

    // One bar per shift group, styled like the first process of the group
    let shift_layers = shift_histograms(&cmp.shifts)
        .iter()
        .zip(&cmp.shifts)
        .map(|(hist, shift)| {
            let style = registry
                .processes()
                .iter()
                .find(|process| process.shift_group == shift.group)
                .map_or(
                    Draw::Filled {
                        fill: Color::GRAY,
                        line: Color::BLACK,
                    },
                    draw,
                );
            layer(hist, style)
        })
        .collect();
    let num_groups = cmp.shifts.len().max(1) as f64;
    let shifts = Document {
        width: RATIO_SIZE.0,
        height: RATIO_SIZE.1,
        header,
        annotations: Vec::new(),
        x: Axis {
            bin_labels: cmp.shifts.iter().map(|s| s.group.to_owned()).collect(),
            ..Axis::linear("", 0., num_groups)
        },
        y: Axis::linear("Fit/Prefit-1", -channel.shift_range(), channel.shift_range()),
        layers: shift_layers,
        legend: Vec::new(),
        zero_line: true,
        grid: true,
    };

    Figures {
        main,
        data_ratio,
        fit_ratio,
        shifts,
    }
}

/// Legend text of the signal, mentioning its scale factor if any
fn signal_legend(process: &Process, scale: f64) -> Option<String> {
    let text = process.legend?;
    Some(if scale == 1. {
        text.to_owned()
    } else {
        format!("{:.0}×{}", scale, text)
    })
}
