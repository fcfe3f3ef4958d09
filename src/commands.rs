//! Line-oriented command surface over a recorder and an analyzer.
//!
//! ```text
//! start <slot> [filename]
//! stop <slot>
//! plot <waveform|spectrum|both> [files...]
//! export <waveform|spectrum|both> [path] [-- files...]
//! status | help | quit
//! ```

use crate::analysis::{Analyzer, Figure, PlotMode, PlotRequest};
use crate::config::Slot;
use crate::error::Result;
use crate::recorder::Recorder;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  start <1|2> [filename]      begin recording a take
  stop <1|2>                  stop recording and save the take
  plot <mode> [files...]      render waveform|spectrum|both
  export <mode> [path] [-- files...]
                              render and save the plot as an image
  status                      show slot and file state
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { slot: Slot, filename: Option<String> },
    Stop { slot: Slot },
    Plot { mode: PlotMode, files: Vec<PathBuf> },
    Export { mode: PlotMode, path: Option<PathBuf>, files: Vec<PathBuf> },
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or("empty command")?.to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        let slot = |rest: &[&str]| -> std::result::Result<Slot, String> {
            rest.first().ok_or("missing slot (1 or 2)")?.parse()
        };
        let mode = |rest: &[&str]| -> std::result::Result<PlotMode, String> {
            rest.first().ok_or("missing plot mode")?.parse()
        };

        match name.as_str() {
            "start" => Ok(Command::Start {
                slot: slot(&rest)?,
                filename: rest.get(1).map(|s| s.to_string()),
            }),
            "stop" => Ok(Command::Stop { slot: slot(&rest)? }),
            "plot" => Ok(Command::Plot {
                mode: mode(&rest)?,
                files: rest.iter().skip(1).map(PathBuf::from).collect(),
            }),
            "export" => {
                let mode = mode(&rest)?;
                let args = &rest[1..];
                let (head, files) = match args.iter().position(|&a| a == "--") {
                    Some(split) => (&args[..split], args[split + 1..].iter().map(PathBuf::from).collect()),
                    None => (args, Vec::new()),
                };
                if head.len() > 1 {
                    return Err("export takes one output path; list input files after --".into());
                }
                Ok(Command::Export {
                    mode,
                    path: head.first().map(PathBuf::from),
                    files,
                })
            }
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

#[derive(Debug)]
pub enum Reply {
    Message(String),
    Plotted { figure: Figure, saved: Option<PathBuf> },
    Quit,
}

pub struct Controller {
    recorder: Recorder,
    analyzer: Analyzer,
}

impl Controller {
    pub fn new(recorder: Recorder, analyzer: Analyzer) -> Self {
        Self { recorder, analyzer }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn execute(&self, command: Command) -> Result<Reply> {
        match command {
            Command::Start { slot, filename } => {
                let filename = filename.unwrap_or_else(|| slot.default_filename());
                self.recorder.start(slot, &filename)?;
                Ok(Reply::Message(format!("slot {slot}: recording to {filename}")))
            }
            Command::Stop { slot } => Ok(Reply::Message(match self.recorder.stop(slot)? {
                Some(path) => format!("slot {slot}: saved {}", path.display()),
                None => format!("slot {slot}: not recording"),
            })),
            Command::Plot { mode, files } => {
                let Some(request) = self.request(mode, files) else {
                    return Ok(Reply::Message(self.not_ready_reason()));
                };
                let figure = self.analyzer.render(&request);
                Ok(Reply::Plotted { figure, saved: None })
            }
            Command::Export { mode, path, files } => {
                let Some(request) = self.request(mode, files) else {
                    return Ok(Reply::Message(self.not_ready_reason()));
                };
                let path = path
                    .map(|p| self.recorder.config().resolve(p))
                    .unwrap_or_else(|| self.recorder.config().plot_path());
                let figure = self.analyzer.plot(&request.with_export(&path))?;
                Ok(Reply::Plotted {
                    figure,
                    saved: Some(path),
                })
            }
            Command::Status => Ok(Reply::Message(self.status())),
            Command::Help => Ok(Reply::Message(HELP.to_string())),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    /// `None` while plotting is not allowed yet.
    fn request(&self, mode: PlotMode, files: Vec<PathBuf>) -> Option<PlotRequest> {
        if self.recorder.any_recording() {
            return None;
        }
        if files.is_empty() {
            if !self.recorder.takes_ready() {
                return None;
            }
            return Some(PlotRequest::new(self.recorder.slot_paths(), mode));
        }
        let files = files.into_iter().map(|f| self.recorder.config().resolve(f));
        Some(PlotRequest::new(files, mode))
    }

    fn not_ready_reason(&self) -> String {
        if self.recorder.any_recording() {
            "stop recording before plotting".into()
        } else {
            "record both takes before plotting".into()
        }
    }

    fn status(&self) -> String {
        let mut out = String::new();
        for slot in Slot::ALL {
            let path = self.recorder.config().slot_path(slot);
            let state = if self.recorder.is_recording(slot) {
                "recording"
            } else if path.exists() {
                "saved"
            } else {
                "empty"
            };
            let _ = writeln!(out, "slot {slot}: {state} ({})", path.display());
        }
        let _ = write!(
            out,
            "plot: {}",
            if self.recorder.takes_ready() && !self.recorder.any_recording() {
                "ready"
            } else {
                "unavailable"
            }
        );
        out
    }
}

/// One line per panel, naming its traces and their point counts.
pub fn describe(figure: &Figure) -> String {
    let mut out = String::new();
    for panel in &figure.panels {
        let _ = write!(out, "{} panel:", panel.x_label);
        if panel.traces.is_empty() {
            out.push_str(" (no traces)");
        }
        for trace in &panel.traces {
            let _ = write!(out, " [{}: {} points]", trace.label, trace.points.len());
        }
        out.push('\n');
    }
    for skipped in &figure.skipped {
        let _ = writeln!(out, "skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::COMPOSITE_LABEL;
    use crate::capture::ToneInput;
    use crate::config::RecorderConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(dir: &std::path::Path) -> Controller {
        let input = ToneInput::burst(440.0, Duration::from_millis(400));
        let recorder = Recorder::new(RecorderConfig::new(dir), Arc::new(input)).unwrap();
        Controller::new(recorder, Analyzer::new(320, 240))
    }

    fn run(c: &Controller, line: &str) -> Reply {
        c.execute(line.parse().unwrap()).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            "start 1".parse::<Command>(),
            Ok(Command::Start {
                slot: Slot::One,
                filename: None
            })
        );
        assert_eq!(
            "START 2 take.wav".parse::<Command>(),
            Ok(Command::Start {
                slot: Slot::Two,
                filename: Some("take.wav".into())
            })
        );
        assert_eq!(
            "plot both a.wav b.wav".parse::<Command>(),
            Ok(Command::Plot {
                mode: PlotMode::Both,
                files: vec!["a.wav".into(), "b.wav".into()]
            })
        );
        assert_eq!(
            "export spectrum out.png -- a.wav".parse::<Command>(),
            Ok(Command::Export {
                mode: PlotMode::Spectrum,
                path: Some("out.png".into()),
                files: vec!["a.wav".into()]
            })
        );
        assert!("stop".parse::<Command>().is_err());
        assert!("export both x.png y.png".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn plot_waits_for_both_takes() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path());
        assert!(matches!(run(&c, "plot both"), Reply::Message(m) if m.contains("record both")));

        run(&c, "start 1");
        assert!(matches!(run(&c, "plot both"), Reply::Message(m) if m.contains("stop recording")));
        run(&c, "stop 1");
        run(&c, "start 2");
        run(&c, "stop 2");

        let Reply::Plotted { figure, saved } = run(&c, "plot waveform") else {
            panic!("expected a figure");
        };
        assert!(saved.is_none());
        let labels: Vec<_> = figure.panels[0].traces.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["recording_1.wav", "recording_2.wav", COMPOSITE_LABEL]);
    }

    #[test]
    fn export_defaults_to_plot_file_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path());
        for line in ["start 1", "stop 1", "start 2", "stop 2"] {
            run(&c, line);
        }
        let Reply::Plotted { saved, .. } = run(&c, "export both") else {
            panic!("expected a figure");
        };
        let saved = saved.unwrap();
        assert_eq!(saved, dir.path().join("recorded_plot.jpeg"));
        assert!(saved.exists());
    }

    #[test]
    fn stop_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path());
        run(&c, "start 1");
        assert!(matches!(run(&c, "stop 1"), Reply::Message(m) if m.contains("saved")));
        assert!(matches!(run(&c, "stop 1"), Reply::Message(m) if m.contains("not recording")));
    }

    #[test]
    fn status_and_describe_render_text() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path());
        run(&c, "start 1");
        let Reply::Message(status) = run(&c, "status") else {
            panic!("expected status text");
        };
        assert!(status.contains("slot 1: recording"));
        assert!(status.contains("slot 2: empty"));
        assert!(status.ends_with("plot: unavailable"));
        run(&c, "stop 1");

        let Reply::Plotted { figure, .. } = run(&c, "plot spectrum recording_1.wav missing.wav") else {
            panic!("expected a figure");
        };
        let text = describe(&figure);
        assert!(text.contains("[recording_1.wav: 3200 points]"));
        assert!(text.contains("skipped"));
    }

    #[test]
    fn quit_and_help() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path());
        assert!(matches!(run(&c, "quit"), Reply::Quit));
        assert!(matches!(run(&c, "help"), Reply::Message(m) if m == HELP));
    }
}
