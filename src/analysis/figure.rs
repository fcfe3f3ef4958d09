use super::signal::{compute_spectrum, compute_waveform, composite};
use crate::audio::{self, LoadedTake};
use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const COMPOSITE_LABEL: &str = "Composite Signal";

/// Blue, green, red, cyan, magenta, yellow.
pub const PALETTE: [[u8; 3]; 6] = [
    [0, 0, 255],
    [0, 128, 0],
    [255, 0, 0],
    [0, 191, 191],
    [191, 0, 191],
    [191, 191, 0],
];
const ALPHAS: [f64; 3] = [0.7, 0.5, 0.3];
const COMPOSITE_COLOR: [u8; 3] = [255, 0, 0];
const COMPOSITE_ALPHA: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    Waveform,
    Spectrum,
    Both,
}

impl PlotMode {
    pub fn panels(self) -> &'static [PanelKind] {
        match self {
            PlotMode::Waveform => &[PanelKind::Waveform],
            PlotMode::Spectrum => &[PanelKind::Spectrum],
            PlotMode::Both => &[PanelKind::Waveform, PanelKind::Spectrum],
        }
    }
}

impl FromStr for PlotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waveform" | "oscilloscope" => Ok(PlotMode::Waveform),
            "spectrum" | "spectrum-analyzer" => Ok(PlotMode::Spectrum),
            "both" => Ok(PlotMode::Both),
            other => Err(format!("unknown plot mode '{other}' (expected waveform, spectrum or both)")),
        }
    }
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlotMode::Waveform => "waveform",
            PlotMode::Spectrum => "spectrum",
            PlotMode::Both => "both",
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlotRequest {
    pub files: Vec<PathBuf>,
    pub mode: PlotMode,
    pub export_path: Option<PathBuf>,
}

impl PlotRequest {
    pub fn new(files: impl IntoIterator<Item = impl Into<PathBuf>>, mode: PlotMode) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            mode,
            export_path: None,
        }
    }

    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Waveform,
    Spectrum,
}

impl PanelKind {
    pub fn x_label(self) -> &'static str {
        match self {
            PanelKind::Waveform => "Time (s)",
            PanelKind::Spectrum => "Frequency (Hz)",
        }
    }

    pub fn y_label(self) -> &'static str {
        match self {
            PanelKind::Waveform => "Amplitude",
            PanelKind::Spectrum => "Magnitude",
        }
    }

    /// Spectra are drawn on a logarithmic frequency axis.
    pub fn log_x(self) -> bool {
        self == PanelKind::Spectrum
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub label: String,
    pub color: [u8; 3],
    pub alpha: f64,
    pub dashed: bool,
    #[serde(rename = "point_count", serialize_with = "serialize_len")]
    pub points: Vec<(f64, f64)>,
}

#[allow(clippy::ptr_arg)]
fn serialize_len<S: serde::Serializer>(points: &Vec<(f64, f64)>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(points.len() as u64)
}

impl Trace {
    pub fn is_composite(&self) -> bool {
        self.label == COMPOSITE_LABEL
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub kind: PanelKind,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub log_x: bool,
    pub traces: Vec<Trace>,
}

impl Panel {
    fn new(kind: PanelKind) -> Self {
        Self {
            kind,
            x_label: kind.x_label(),
            y_label: kind.y_label(),
            log_x: kind.log_x(),
            traces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything needed to draw a plot request, independent of any backend.
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub mode: PlotMode,
    pub panels: Vec<Panel>,
    pub skipped: Vec<SkippedFile>,
}

impl Figure {
    pub fn is_empty(&self) -> bool {
        self.panels.iter().all(|p| p.traces.is_empty())
    }

    pub fn panel(&self, kind: PanelKind) -> Option<&Panel> {
        self.panels.iter().find(|p| p.kind == kind)
    }
}

/// Builds figures from takes on disk and writes them out as images.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    pub width: u32,
    pub height: u32,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

impl Analyzer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Loads every file in the request and lays out its traces. Files that
    /// are missing or undecodable are recorded in `skipped` and left out.
    pub fn render(&self, request: &PlotRequest) -> Figure {
        let mut panels: Vec<Panel> = request.mode.panels().iter().map(|&k| Panel::new(k)).collect();
        let mut skipped = Vec::new();
        let mut signals: Vec<Vec<f64>> = Vec::new();
        let mut composite_rate: Option<u32> = None;

        for (i, path) in request.files.iter().enumerate() {
            let take = match audio::load_take(path) {
                Ok(take) => take,
                Err(e) => {
                    log_skip(&e);
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let color = PALETTE[i % PALETTE.len()];
            let alpha = ALPHAS[i.min(ALPHAS.len() - 1)];
            let label = path
                .file_name()
                .unwrap_or(path.as_os_str())
                .to_string_lossy()
                .into_owned();
            let signal = take.mono();

            for panel in &mut panels {
                panel.traces.push(Trace {
                    label: label.clone(),
                    color,
                    alpha,
                    dashed: false,
                    points: trace_points(panel.kind, &signal, take.sample_rate),
                });
            }

            match composite_rate {
                None => composite_rate = Some(take.sample_rate),
                Some(rate) if rate != take.sample_rate => warn_rate_mismatch(&take, rate),
                Some(_) => {}
            }
            signals.push(signal);
        }

        if let (Some(mixed), Some(rate)) = (composite(&signals), composite_rate) {
            for panel in &mut panels {
                panel.traces.push(Trace {
                    label: COMPOSITE_LABEL.to_string(),
                    color: COMPOSITE_COLOR,
                    alpha: COMPOSITE_ALPHA,
                    dashed: true,
                    points: trace_points(panel.kind, &mixed, rate),
                });
            }
        }

        if signals.is_empty() {
            tracing::warn!(files = request.files.len(), "no readable takes, plot will be empty");
        } else {
            tracing::info!(mode = %request.mode, takes = signals.len(), "rendered plot");
        }

        Figure {
            mode: request.mode,
            panels,
            skipped,
        }
    }
}

fn trace_points(kind: PanelKind, signal: &[f64], sample_rate: u32) -> Vec<(f64, f64)> {
    match kind {
        PanelKind::Waveform => compute_waveform(signal, sample_rate).collect(),
        PanelKind::Spectrum => compute_spectrum(signal, sample_rate),
    }
}

fn log_skip(err: &Error) {
    match err {
        Error::FileNotFound(path) => tracing::warn!(path = %path.display(), "take not found, skipping"),
        other => tracing::warn!(error = %other, "cannot read take, skipping"),
    }
}

fn warn_rate_mismatch(take: &LoadedTake, rate: u32) {
    tracing::warn!(
        path = %take.path.display(),
        sample_rate = take.sample_rate,
        composite_rate = rate,
        "sample rates differ, composite uses the first take's rate"
    );
}
