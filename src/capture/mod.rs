mod mic;
mod tone;

pub use mic::{list_input_devices, MicCapture, MicInput};
pub use tone::{ToneCapture, ToneInput};

use crate::config::CaptureFormat;
use crate::error::Result;
use std::sync::mpsc;

/// A running input stream delivering interleaved f32 samples in [-1, 1].
///
/// The stream may run at a different rate or channel count than the one
/// requested; the capture loop converts.
pub trait Capture {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn rx(&self) -> &mpsc::Receiver<Vec<f32>>;
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// Opens capture streams. Streams are opened on the capture thread that
/// will own them, so only the opener has to cross threads.
pub trait InputDevice: Send + Sync {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn Capture>>;
}
