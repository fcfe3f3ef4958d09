use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_BUFFER_FRAMES: usize = 3200;
pub const BITS_PER_SAMPLE: u16 = 16;
pub const PLOT_FILENAME: &str = "recorded_plot.jpeg";
pub const PREVIEW_FILENAME: &str = "plot_preview.png";

/// One of the two fixed recording slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    pub fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }

    pub fn default_filename(self) -> String {
        format!("recording_{self}.wav")
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index() + 1)
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Slot::One),
            "2" => Ok(Slot::Two),
            other => Err(format!("unknown slot '{other}' (expected 1 or 2)")),
        }
    }
}

/// PCM layout of every stored take. Samples are always 16-bit signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per capture buffer.
    pub buffer_frames: usize,
}

impl CaptureFormat {
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames * self.channels as usize
    }

    pub fn bytes_per_sample(&self) -> u16 {
        BITS_PER_SAMPLE / 8
    }

    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecorderConfig {
    pub output_dir: PathBuf,
    pub format: CaptureFormat,
}

impl RecorderConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: CaptureFormat::default(),
        }
    }

    pub fn with_format(mut self, format: CaptureFormat) -> Self {
        self.format = format;
        self
    }

    /// Relative names land in the output directory; absolute paths are kept.
    pub fn resolve(&self, filename: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(filename)
    }

    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        self.resolve(slot.default_filename())
    }

    pub fn plot_path(&self) -> PathBuf {
        self.resolve(PLOT_FILENAME)
    }

    /// Where `plot` writes its image when no export path is given.
    pub fn preview_path(&self) -> PathBuf {
        self.resolve(PREVIEW_FILENAME)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::new(default_output_dir())
    }
}

pub fn default_output_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "takescope")
        .map(|dirs| dirs.data_dir().join("recordings"))
        .unwrap_or_else(|| PathBuf::from("recordings"))
}
