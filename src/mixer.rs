use crate::config::CaptureFormat;
use crate::error::{Error, Result};
use rubato::{FftFixedIn, Resampler};

pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Downmixes to mono first when the channel counts differ, then duplicates
/// the mono signal into every output channel.
pub fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    let mono = to_mono(samples, from);
    if to == 1 {
        return mono;
    }
    mono.iter()
        .flat_map(|&s| std::iter::repeat_n(s, to as usize))
        .collect()
}

pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Chunk-at-a-time FFT resampler over interleaved input.
///
/// Input that does not fill a whole resampler chunk is held until the next
/// push, so output lags input by at most one chunk.
pub struct StreamResampler {
    inner: FftFixedIn<f32>,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: u16) -> Result<Self> {
        let inner = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, 1024, 2, channels as usize)
            .map_err(|e| Error::Device(format!("cannot resample {from_rate}Hz to {to_rate}Hz: {e}")))?;
        Ok(Self {
            inner,
            pending: vec![Vec::new(); channels as usize],
        })
    }

    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let channels = self.pending.len();
        for frame in interleaved.chunks_exact(channels) {
            for (buf, &sample) in self.pending.iter_mut().zip(frame) {
                buf.push(sample);
            }
        }

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let chunk: Vec<&[f32]> = self.pending.iter().map(|c| &c[..needed]).collect();
            let result = self
                .inner
                .process(&chunk, None)
                .map_err(|e| Error::Device(format!("resampling failed: {e}")))?;
            for buf in &mut self.pending {
                buf.drain(..needed);
            }
            let frames = result[0].len();
            output.reserve(frames * channels);
            for i in 0..frames {
                for ch in &result {
                    output.push(ch[i]);
                }
            }
        }
        Ok(output)
    }
}

/// Converts stream chunks from the device's layout into the take format.
pub struct Converter {
    from_channels: u16,
    to_channels: u16,
    resampler: Option<StreamResampler>,
}

impl Converter {
    pub fn new(from_rate: u32, from_channels: u16, format: &CaptureFormat) -> Result<Self> {
        if from_rate == 0 || from_channels == 0 {
            return Err(Error::Device(format!(
                "input stream reports {from_rate}Hz with {from_channels} channels"
            )));
        }
        let resampler = if from_rate == format.sample_rate {
            None
        } else {
            tracing::debug!(from_rate, to_rate = format.sample_rate, "resampling capture stream");
            Some(StreamResampler::new(from_rate, format.sample_rate, format.channels)?)
        };
        Ok(Self {
            from_channels,
            to_channels: format.channels,
            resampler,
        })
    }

    pub fn convert(&mut self, chunk: &[f32]) -> Result<Vec<i16>> {
        let remapped = remap_channels(chunk, self.from_channels, self.to_channels);
        let resampled = match &mut self.resampler {
            Some(resampler) => resampler.push(&remapped)?,
            None => remapped,
        };
        Ok(f32_to_i16(&resampled))
    }
}
