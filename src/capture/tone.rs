use super::{Capture, InputDevice};
use crate::config::CaptureFormat;
use crate::error::{Error, Result};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

const CHUNK_FRAMES: usize = 1024;

/// Synthetic input producing a sine wave instead of microphone audio.
#[derive(Debug, Clone)]
pub struct ToneInput {
    pub frequency: f32,
    pub amplitude: f32,
    /// Stop producing after this long. Required when `paced` is false.
    pub duration: Option<Duration>,
    /// Deliver chunks in real time rather than all at once on start.
    pub paced: bool,
    /// Stream format overrides; default to the requested capture format.
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl ToneInput {
    /// A live tone that runs until the capture is stopped.
    pub fn live(frequency: f32) -> Self {
        Self {
            frequency,
            amplitude: 0.5,
            duration: None,
            paced: true,
            sample_rate: None,
            channels: None,
        }
    }

    /// A fixed-length tone delivered in full as soon as the stream starts.
    pub fn burst(frequency: f32, duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            paced: false,
            ..Self::live(frequency)
        }
    }

    pub fn with_stream_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.sample_rate = Some(sample_rate);
        self.channels = Some(channels);
        self
    }
}

impl InputDevice for ToneInput {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn Capture>> {
        if !self.paced && self.duration.is_none() {
            return Err(Error::Device("an unpaced tone needs a duration".into()));
        }
        if self.frequency <= 0.0 {
            return Err(Error::Device(format!("invalid tone frequency {}", self.frequency)));
        }
        let (tx, rx) = mpsc::channel();
        Ok(Box::new(ToneCapture {
            tone: self.clone(),
            sample_rate: self.sample_rate.unwrap_or(format.sample_rate),
            channels: self.channels.unwrap_or(format.channels),
            tx,
            rx,
            running: Arc::new(AtomicBool::new(false)),
        }))
    }
}

pub struct ToneCapture {
    tone: ToneInput,
    sample_rate: u32,
    channels: u16,
    tx: mpsc::Sender<Vec<f32>>,
    rx: mpsc::Receiver<Vec<f32>>,
    running: Arc<AtomicBool>,
}

impl ToneCapture {
    fn total_frames(&self) -> Option<usize> {
        self.tone
            .duration
            .map(|d| (d.as_secs_f64() * self.sample_rate as f64).round() as usize)
    }
}

/// Interleaved chunk of `frames` frames starting at frame `offset`.
fn tone_chunk(tone: &ToneInput, rate: u32, channels: u16, offset: usize, frames: usize) -> Vec<f32> {
    let step = TAU * tone.frequency / rate as f32;
    let mut chunk = Vec::with_capacity(frames * channels as usize);
    for i in offset..offset + frames {
        // Wrap the phase in f64 so long takes keep their pitch.
        let phase = ((i as f64 * step as f64) % std::f64::consts::TAU) as f32;
        let value = tone.amplitude * phase.sin();
        chunk.extend(std::iter::repeat_n(value, channels as usize));
    }
    chunk
}

impl Capture for ToneCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn rx(&self) -> &mpsc::Receiver<Vec<f32>> {
        &self.rx
    }

    fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let total = self.total_frames();

        if !self.tone.paced {
            let total = total.unwrap_or(0);
            let mut offset = 0;
            while offset < total {
                let frames = CHUNK_FRAMES.min(total - offset);
                let chunk = tone_chunk(&self.tone, self.sample_rate, self.channels, offset, frames);
                let _ = self.tx.send(chunk);
                offset += frames;
            }
            return Ok(());
        }

        let tone = self.tone.clone();
        let (rate, channels) = (self.sample_rate, self.channels);
        let tx = self.tx.clone();
        let running = Arc::clone(&self.running);
        let period = Duration::from_secs_f64(CHUNK_FRAMES as f64 / rate as f64);

        thread::Builder::new()
            .name("tone-input".into())
            .spawn(move || {
                let mut offset = 0;
                while running.load(Ordering::SeqCst) {
                    let frames = match total {
                        Some(total) if offset >= total => break,
                        Some(total) => CHUNK_FRAMES.min(total - offset),
                        None => CHUNK_FRAMES,
                    };
                    if tx.send(tone_chunk(&tone, rate, channels, offset, frames)).is_err() {
                        break;
                    }
                    offset += frames;
                    thread::sleep(period);
                }
            })?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(capture: &dyn Capture) -> Vec<f32> {
        let mut samples = Vec::new();
        while let Ok(chunk) = capture.rx().try_recv() {
            samples.extend(chunk);
        }
        samples
    }

    #[test]
    fn burst_delivers_whole_duration_on_start() {
        let input = ToneInput::burst(440.0, Duration::from_millis(500));
        let capture = input.open(&CaptureFormat::default()).unwrap();
        capture.start().unwrap();
        let samples = drain(capture.as_ref());
        assert_eq!(samples.len(), 8000);
        assert!(samples.iter().all(|s| s.abs() <= 0.5 + f32::EPSILON));
    }

    #[test]
    fn stream_format_override_interleaves_channels() {
        let input = ToneInput::burst(100.0, Duration::from_millis(10)).with_stream_format(48000, 2);
        let capture = input.open(&CaptureFormat::default()).unwrap();
        assert_eq!(capture.sample_rate(), 48000);
        assert_eq!(capture.channels(), 2);
        capture.start().unwrap();
        let samples = drain(capture.as_ref());
        assert_eq!(samples.len(), 480 * 2);
        for frame in samples.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn unpaced_tone_without_duration_is_a_device_error() {
        let mut input = ToneInput::live(440.0);
        input.paced = false;
        assert!(matches!(input.open(&CaptureFormat::default()), Err(Error::Device(_))));
    }

    #[test]
    fn paced_tone_stops_producing_after_stop() {
        let input = ToneInput::live(440.0);
        let capture = input.open(&CaptureFormat::default()).unwrap();
        capture.start().unwrap();
        let first = capture.rx().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.len(), CHUNK_FRAMES);
        capture.stop().unwrap();
        thread::sleep(Duration::from_millis(200));
        drain(capture.as_ref());
        thread::sleep(Duration::from_millis(200));
        assert!(capture.rx().try_recv().is_err());
    }
}
