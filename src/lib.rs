//! Two-take microphone recorder with waveform, spectrum and composite plots.

pub mod analysis;
pub mod audio;
pub mod capture;
pub mod commands;
pub mod config;
pub mod error;
pub mod mixer;
pub mod recorder;

pub use analysis::{Analyzer, Figure, PlotMode, PlotRequest};
pub use config::{CaptureFormat, RecorderConfig, Slot};
pub use error::{Error, Result};
pub use recorder::{Recorder, RecorderEvent};
