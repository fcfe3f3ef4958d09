use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Lazy `(time, amplitude)` pairs spanning `0..=n / rate` inclusively.
pub fn compute_waveform(samples: &[f64], sample_rate: u32) -> impl Iterator<Item = (f64, f64)> + Clone + '_ {
    let n = samples.len();
    let end = n as f64 / sample_rate as f64;
    let step = if n > 1 { end / (n - 1) as f64 } else { 0.0 };
    samples
        .iter()
        .enumerate()
        .map(move |(i, &amplitude)| (i as f64 * step, amplitude))
}

/// `(frequency, magnitude)` for the first `n / 2` DFT bins.
///
/// Magnitudes are the raw absolute values of the transform over the whole
/// buffer, without windowing or normalisation.
pub fn compute_spectrum(samples: &[f64], sample_rate: u32) -> Vec<(f64, f64)> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    fft.process(&mut buffer);

    let bin_width = sample_rate as f64 / n as f64;
    buffer
        .iter()
        .take(n / 2)
        .enumerate()
        .map(|(k, value)| (k as f64 * bin_width, value.norm()))
        .collect()
}

/// Per-sample mean of two or more signals, truncated to the shortest one.
///
/// The mean is taken in f64, so it always stays inside the range of the
/// inputs. Returns `None` for fewer than two signals.
pub fn composite<S: AsRef<[f64]>>(signals: &[S]) -> Option<Vec<f64>> {
    if signals.len() < 2 {
        return None;
    }
    let len = signals.iter().map(|s| s.as_ref().len()).min().unwrap_or(0);
    let count = signals.len() as f64;
    let mixed = (0..len)
        .map(|i| signals.iter().map(|s| s.as_ref()[i]).sum::<f64>() / count)
        .collect();
    Some(mixed)
}

/// Frequency of the strongest non-DC bin.
pub fn peak_frequency(spectrum: &[(f64, f64)]) -> Option<f64> {
    spectrum
        .iter()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|&(freq, _)| freq)
}
