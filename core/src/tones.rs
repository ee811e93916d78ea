use std::f32::consts::PI;

/// Edge taper ratio for synthesised symbols (8% on each side)
const EDGE_TAPER_RATIO: f32 = 0.08;

/// Minimum synthesis taper in samples
const MIN_TAPER_SAMPLES: usize = 32;

/// Analysis window taper ratio for the demodulator
const ANALYSIS_TAPER_RATIO: f32 = 0.06;

/// Minimum analysis taper in samples
const ANALYSIS_MIN_TAPER_SAMPLES: usize = 32;

/// Generate raised-cosine window for smooth edge tapering
pub fn raised_cosine_window(len: usize, taper_len: usize) -> Vec<f32> {
    if taper_len == 0 || len == 0 {
        return vec![1.0; len];
    }

    let taper = taper_len.min(len / 2);
    if taper == 0 {
        return vec![1.0; len];
    }

    let mut window = vec![1.0; len];
    for i in 0..taper {
        // Attack: smoothly increase from 0 to 1
        let progress = i as f32 / taper as f32;
        let value = (PI * progress / 2.0).sin().powi(2);
        window[i] = value;

        // Decay: smoothly decrease from 1 to 0
        window[len - 1 - i] = value;
    }

    window
}

fn bounded_taper(len: usize, ratio: f32, min: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let taper = ((len as f32) * ratio).round() as usize;
    taper.max(min).min(len / 2)
}

/// Symbol envelope scaled so its mean gain is 1
///
/// Every symbol of a protocol shares one envelope, so it is computed once per
/// modulator rather than per symbol.
pub fn symbol_envelope(symbol_samples: usize) -> Vec<f32> {
    let taper = bounded_taper(symbol_samples, EDGE_TAPER_RATIO, MIN_TAPER_SAMPLES);
    let mut window = raised_cosine_window(symbol_samples, taper);
    if window.is_empty() {
        return window;
    }

    let avg = window.iter().sum::<f32>() / window.len() as f32;
    let normalization = if avg > 0.0 { 1.0 / avg } else { 1.0 };
    for weight in window.iter_mut() {
        *weight *= normalization;
    }
    window
}

/// Power of `freq` in `samples` using the Goertzel algorithm
pub fn goertzel(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }
    let k = (0.5 + (n as f32 * freq / sample_rate)) as usize;
    let omega = 2.0 * PI * k as f32 / n as f32;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0;
    let mut q2 = 0.0;

    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }

    // Compute magnitude squared (power)
    let real = q1 - q2 * omega.cos();
    let imag = q2 * omega.sin();
    real * real + imag * imag
}

/// Remove DC offset and taper the edges of one symbol before analysis
pub fn condition_symbol(samples: &[f32]) -> Vec<f32> {
    let mut buffer = samples.to_vec();
    if buffer.is_empty() {
        return buffer;
    }

    let mean = buffer.iter().sum::<f32>() / buffer.len() as f32;
    for sample in buffer.iter_mut() {
        *sample -= mean;
    }

    let taper = bounded_taper(buffer.len(), ANALYSIS_TAPER_RATIO, ANALYSIS_MIN_TAPER_SAMPLES);
    if taper > 0 {
        let window = raised_cosine_window(buffer.len(), taper);
        for (sample, weight) in buffer.iter_mut().zip(window.iter()) {
            *sample *= *weight;
        }
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, len: usize, sample_rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_window_edges() {
        let window = raised_cosine_window(100, 10);
        assert_eq!(window.len(), 100);
        assert_eq!(window[0], 0.0);
        assert_eq!(window[99], 0.0);
        assert_eq!(window[50], 1.0);
    }

    #[test]
    fn test_window_without_taper() {
        assert_eq!(raised_cosine_window(4, 0), vec![1.0; 4]);
        assert!(raised_cosine_window(0, 8).is_empty());
    }

    #[test]
    fn test_envelope_has_unit_mean() {
        let envelope = symbol_envelope(2205);
        let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
        assert!((mean - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_goertzel_picks_matching_tone() {
        let sample_rate = 44100.0;
        let samples = tone(1500.0, 2205, sample_rate);

        let on = goertzel(&samples, 1500.0, sample_rate);
        let off = goertzel(&samples, 1600.0, sample_rate);
        assert!(on > off * 100.0, "on={} off={}", on, off);
    }

    #[test]
    fn test_condition_removes_dc() {
        let samples = vec![1.0; 256];
        let conditioned = condition_symbol(&samples);
        assert!(conditioned.iter().all(|s| s.abs() < 1e-5));
    }
}
