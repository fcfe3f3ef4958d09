use super::{Capture, InputDevice};
use crate::config::CaptureFormat;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;

/// Opens the host's default microphone.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicInput;

impl InputDevice for MicInput {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn Capture>> {
        Ok(Box::new(MicCapture::new(format)?))
    }
}

pub struct MicCapture {
    stream: cpal::Stream,
    rx: mpsc::Receiver<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl MicCapture {
    pub fn new(format: &CaptureFormat) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device found, check microphone permissions".into()))?;

        let device_name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".into());
        tracing::info!(device = %device_name, "using input device");

        let supported = match exact_config(&device, format) {
            Some(config) => config,
            None => {
                let fallback = device.default_input_config().map_err(Error::device)?;
                tracing::warn!(
                    requested_rate = format.sample_rate,
                    requested_channels = format.channels,
                    rate = fallback.sample_rate(),
                    channels = fallback.channels(),
                    "device rejected requested format, converting from default"
                );
                fallback
            }
        };
        let sample_rate = supported.sample_rate();
        let channels = supported.channels();

        tracing::debug!(
            sample_rate,
            channels,
            sample_format = ?supported.sample_format(),
            "opening input stream"
        );

        let (tx, rx) = mpsc::channel();

        // Overruns and transient driver errors must not end the take.
        let err_fn = |err: cpal::StreamError| {
            tracing::warn!(error = %err, "input stream error");
        };

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &supported.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let _ = tx.send(data.to_vec());
                    },
                    err_fn,
                    None,
                )
                .map_err(Error::device)?,
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &supported.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        let _ = tx.send(floats);
                    },
                    err_fn,
                    None,
                )
                .map_err(Error::device)?,
            other => return Err(Error::Device(format!("unsupported sample format: {other:?}"))),
        };

        Ok(Self {
            stream,
            rx,
            sample_rate,
            channels,
        })
    }
}

/// Prefers a native i16 stream at the requested rate and channel count,
/// then f32.
fn exact_config(device: &cpal::Device, format: &CaptureFormat) -> Option<cpal::SupportedStreamConfig> {
    let ranges: Vec<_> = device.supported_input_configs().ok()?.collect();
    [cpal::SampleFormat::I16, cpal::SampleFormat::F32]
        .into_iter()
        .find_map(|wanted| {
            ranges.iter().find(|range| {
                range.sample_format() == wanted
                    && range.channels() == format.channels
                    && range.min_sample_rate() <= format.sample_rate
                    && format.sample_rate <= range.max_sample_rate()
            })
        })
        .map(|range| range.clone().with_sample_rate(format.sample_rate))
}

impl Capture for MicCapture {
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
        self.stream.play().map_err(Error::device)
    }

    fn stop(&self) -> Result<()> {
        self.stream.pause().ok();
        Ok(())
    }
}

/// Names of the host's input devices, default first.
pub fn list_input_devices() -> Result<Vec<(String, bool)>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.description().ok())
        .map(|d| d.to_string());

    let mut names: Vec<(String, bool)> = host
        .input_devices()
        .map_err(Error::device)?
        .map(|device| {
            let name = device
                .description()
                .map(|d| d.to_string())
                .unwrap_or_else(|_| "unknown".into());
            let is_default = default_name.as_deref() == Some(name.as_str());
            (name, is_default)
        })
        .collect();
    names.sort_by_key(|(_, is_default)| !is_default);
    Ok(names)
}
