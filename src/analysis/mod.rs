//! Turns takes on disk into waveform and spectrum figures.
//!
//! `Analyzer::render` builds a backend-free [`Figure`]; `Analyzer::export`
//! additionally rasterises it with plotters.

mod export;
mod figure;
mod signal;

pub use figure::{
    Analyzer, COMPOSITE_LABEL, Figure, PALETTE, Panel, PanelKind, PlotMode, PlotRequest, SkippedFile, Trace,
};
pub use signal::{composite, compute_spectrum, compute_waveform, peak_frequency};
