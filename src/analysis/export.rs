use super::figure::{Analyzer, Figure, Panel, PlotRequest, Trace};
use crate::error::{Error, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Without a font backend plotters cannot draw text, so tick labels, axis
/// descriptions and the legend are left out.
const DRAW_TEXT: bool = cfg!(feature = "ttf");

fn render_err(err: impl std::fmt::Display) -> Error {
    Error::Render(err.to_string())
}

impl Analyzer {
    /// Renders the request and writes it as an image at `path`, creating
    /// parent directories. The image format follows the file extension.
    pub fn export(&self, request: &PlotRequest, path: impl AsRef<Path>) -> Result<Figure> {
        let figure = self.render(request);
        self.draw(&figure, path.as_ref())?;
        Ok(figure)
    }

    /// Renders the request, exporting it when it names an export path.
    pub fn plot(&self, request: &PlotRequest) -> Result<Figure> {
        match &request.export_path {
            Some(path) => self.export(request, path),
            None => Ok(self.render(request)),
        }
    }

    pub fn draw(&self, figure: &Figure, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let areas = root.split_evenly((figure.panels.len().max(1), 1));
        for (panel, area) in figure.panels.iter().zip(&areas) {
            draw_panel(panel, area)?;
        }

        root.present().map_err(render_err)?;
        tracing::info!(path = %path.display(), mode = %figure.mode, "plot saved");
        Ok(())
    }
}

/// Points in plot space. Log-x panels drop non-positive frequencies and
/// plot log10(f).
fn plot_points(panel: &Panel, trace: &Trace) -> Vec<(f64, f64)> {
    if panel.log_x {
        trace
            .points
            .iter()
            .filter(|(x, _)| *x > 0.0)
            .map(|&(x, y)| (x.log10(), y))
            .collect()
    } else {
        trace.points.clone()
    }
}

fn padded(range: Option<(f64, f64)>, fallback: Range<f64>) -> Range<f64> {
    match range {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            lo - pad..hi + pad
        }
        Some((lo, _)) => lo - 1.0..lo + 1.0,
        None => fallback,
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn draw_panel(panel: &Panel, area: &Area<'_>) -> Result<()> {
    let series: Vec<(&Trace, Vec<(f64, f64)>)> = panel
        .traces
        .iter()
        .map(|trace| (trace, plot_points(panel, trace)))
        .collect();

    let all = || series.iter().flat_map(|(_, pts)| pts.iter());
    let x_extent = extent(all().map(|&(x, _)| x));
    let y_extent = extent(all().map(|&(_, y)| y));

    let (x_range, y_range) = if panel.log_x {
        let x = match x_extent {
            Some((lo, hi)) if hi > lo => lo..hi,
            _ => 0.0..4.0,
        };
        let top = y_extent.map(|(_, hi)| hi * 1.05).filter(|&hi| hi > 0.0).unwrap_or(1.0);
        (x, 0.0..top)
    } else {
        let x = match x_extent {
            Some((lo, hi)) if hi > lo => lo..hi,
            _ => 0.0..1.0,
        };
        (x, padded(y_extent, -1.0..1.0))
    };

    // Label areas of size zero are never drawn into.
    let (x_area, y_area) = if DRAW_TEXT { (35, 70) } else { (0, 0) };
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(x_area)
        .y_label_area_size(y_area)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_err)?;

    let log_labels = |v: &f64| format!("{:.0}", 10f64.powf(*v));
    let linear_labels = |v: &f64| format!("{v:.2}");
    let x_labels: &dyn Fn(&f64) -> String = if panel.log_x { &log_labels } else { &linear_labels };

    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(BLACK.mix(0.08)).bold_line_style(BLACK.mix(0.2));
    if DRAW_TEXT {
        mesh.x_desc(panel.x_label)
            .y_desc(panel.y_label)
            .x_label_formatter(x_labels);
    }
    mesh.draw().map_err(render_err)?;

    for (trace, points) in series {
        let [r, g, b] = trace.color;
        let style = RGBColor(r, g, b).mix(trace.alpha).stroke_width(1);
        let anno = if trace.dashed {
            chart.draw_series(DashedLineSeries::new(points, 6, 4, style))
        } else {
            chart.draw_series(LineSeries::new(points, style))
        }
        .map_err(render_err)?;
        anno.label(trace.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    if DRAW_TEXT && !panel.traces.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::figure::PlotMode;
    use crate::audio;
    use crate::config::CaptureFormat;

    fn tone(path: &Path, freq: f64) {
        let samples: Vec<i16> = (0..4000)
            .map(|i| (6000.0 * (std::f64::consts::TAU * freq * i as f64 / 16000.0).sin()) as i16)
            .collect();
        audio::write_take(path, &[samples], &CaptureFormat::default()).unwrap();
    }

    #[test]
    fn export_writes_jpeg_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("recording_1.wav");
        let b = dir.path().join("recording_2.wav");
        tone(&a, 440.0);
        tone(&b, 660.0);

        let out = dir.path().join("plots").join("recorded_plot.jpeg");
        let figure = Analyzer::new(400, 300)
            .export(&PlotRequest::new([&a, &b], PlotMode::Both), &out)
            .unwrap();

        assert_eq!(figure.panels.len(), 2);
        let bytes = std::fs::read(&out).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn empty_request_still_exports_axes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.png");
        let figure = Analyzer::new(320, 240)
            .export(&PlotRequest::new([dir.path().join("missing.wav")], PlotMode::Spectrum), &out)
            .unwrap();
        assert!(figure.is_empty());
        assert_eq!(figure.skipped.len(), 1);
        assert!(out.metadata().unwrap().len() > 0);
    }

    #[test]
    fn spectrum_points_drop_dc_and_use_log_axis() {
        let panel = Panel {
            kind: crate::analysis::figure::PanelKind::Spectrum,
            x_label: "Frequency (Hz)",
            y_label: "Magnitude",
            log_x: true,
            traces: Vec::new(),
        };
        let trace = Trace {
            label: "t".into(),
            color: [0, 0, 0],
            alpha: 1.0,
            dashed: false,
            points: vec![(0.0, 5.0), (10.0, 1.0), (1000.0, 2.0)],
        };
        let points = plot_points(&panel, &trace);
        assert_eq!(points.len(), 2);
        assert!((points[0].0 - 1.0).abs() < 1e-12);
        assert!((points[1].0 - 3.0).abs() < 1e-12);
        assert_eq!(points[1].1, 2.0);
    }

    #[test]
    fn plot_only_writes_when_export_path_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        tone(&a, 440.0);
        let out = dir.path().join("plot.png");
        let analyzer = Analyzer::new(320, 240);

        let request = PlotRequest::new([&a], PlotMode::Waveform);
        analyzer.plot(&request).unwrap();
        assert!(!out.exists());

        let figure = analyzer.plot(&request.with_export(&out)).unwrap();
        assert_eq!(figure.panels[0].traces.len(), 1);
        assert!(out.exists());
    }

    #[test]
    fn padding_handles_flat_and_missing_ranges() {
        assert_eq!(padded(None, -1.0..1.0), -1.0..1.0);
        assert_eq!(padded(Some((3.0, 3.0)), -1.0..1.0), 2.0..4.0);
        let r = padded(Some((0.0, 100.0)), -1.0..1.0);
        assert_eq!(r, -5.0..105.0);
    }
}
