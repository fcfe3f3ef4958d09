use crate::config::{BITS_PER_SAMPLE, CaptureFormat};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Writes captured buffers, in order, as one 16-bit PCM WAV file.
///
/// The parent directory must already exist; an unwritable target is an
/// `Error::Io`. Returns the number of frames written.
pub fn write_take(path: &Path, frames: &[Vec<i16>], format: &CaptureFormat) -> Result<usize> {
    let mut writer = hound::WavWriter::create(path, format.wav_spec())?;
    let mut samples = 0usize;
    for chunk in frames {
        for &sample in chunk {
            writer.write_sample(sample)?;
        }
        samples += chunk.len();
    }
    writer.finalize()?;

    let frame_count = samples / format.channels.max(1) as usize;
    let duration_secs = frame_count as f64 / format.sample_rate as f64;
    tracing::info!(
        path = %path.display(),
        frames = frame_count,
        "wrote {duration_secs:.1}s of audio"
    );

    Ok(frame_count)
}

/// A decoded take. `samples` are interleaved when `channels > 1`.
#[derive(Debug, Clone)]
pub struct LoadedTake {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl LoadedTake {
    /// Frames in the take.
    pub fn sample_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate as f64
    }

    /// Per-frame mean across channels.
    pub fn mono(&self) -> Vec<f64> {
        let ch = self.channels.max(1) as usize;
        self.samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / ch as f64)
            .collect()
    }
}

pub fn load_take(path: impl AsRef<Path>) -> Result<LoadedTake> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let decode = |reason: String| Error::Decode {
        path: path.to_path_buf(),
        reason,
    };

    // The file exists, so a short read means a truncated header.
    let reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => Error::Io(io),
        other => decode(other.to_string()),
    })?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(decode(format!(
            "expected {BITS_PER_SAMPLE}-bit integer PCM, found {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(decode("header declares zero channels or sample rate".into()));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| decode(e.to_string()))?;

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "loaded take"
    );

    Ok(LoadedTake {
        path: path.to_path_buf(),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn save_then_load_preserves_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        for (rate, channels) in [(16000, 1), (44100, 2), (8000, 1)] {
            let format = CaptureFormat {
                sample_rate: rate,
                channels,
                buffer_frames: 4,
            };
            let frames: Vec<Vec<i16>> = (0..3)
                .map(|n| (0..format.buffer_samples()).map(|i| (n * 1000 + i as i16) * -7).collect())
                .collect();
            let path = dir.path().join(format!("take_{rate}_{channels}.wav"));

            let written = write_take(&path, &frames, &format).unwrap();
            assert_eq!(written, 12);

            let take = load_take(&path).unwrap();
            assert_eq!(take.sample_rate, rate);
            assert_eq!(take.channels, channels);
            assert_eq!(take.sample_count(), 12);
            assert_eq!(take.samples, frames.concat());
        }
    }

    #[test]
    fn empty_take_is_a_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_take(&path, &[], &CaptureFormat::default()).unwrap();
        let take = load_take(&path).unwrap();
        assert!(take.samples.is_empty());
        assert_eq!(take.sample_rate, 16000);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_take(dir.path().join("nope.wav")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn garbage_header_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"definitely not a riff header")
            .unwrap();
        assert!(matches!(load_take(&path), Err(Error::Decode { .. })));
    }

    #[test]
    fn empty_or_truncated_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::File::create(&empty).unwrap();
        let err = load_take(&empty).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
        assert!(err.is_recoverable());

        let whole = dir.path().join("whole.wav");
        write_take(&whole, &[vec![1; 64]], &CaptureFormat::default()).unwrap();
        let bytes = std::fs::read(&whole).unwrap();
        let truncated = dir.path().join("truncated.wav");
        std::fs::write(&truncated, &bytes[..20]).unwrap();
        assert!(matches!(load_take(&truncated), Err(Error::Decode { .. })));
    }

    #[test]
    fn float_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();
        assert!(matches!(load_take(&path), Err(Error::Decode { .. })));
    }

    #[test]
    fn unwritable_target_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("take.wav");
        let err = write_take(&path, &[vec![1, 2, 3]], &CaptureFormat::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn mono_averages_stereo_frames() {
        let take = LoadedTake {
            path: PathBuf::from("t.wav"),
            sample_rate: 8000,
            channels: 2,
            samples: vec![100, 300, -4, 4],
        };
        assert_eq!(take.sample_count(), 2);
        assert_eq!(take.mono(), vec![200.0, 0.0]);
    }
}
