use crate::correlation::Correlator;
use crate::error::Result;
use crate::protocol::ProtocolDescriptor;
use crate::tones::raised_cosine_window;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Short fade on both ends of the frontdoor so it starts without a click
const FRONTDOOR_TAPER_RATIO: f32 = 0.02;

/// Windows quieter than this RMS are treated as silence and never match
const MIN_WINDOW_RMS: f64 = 1e-4;

/// Threshold applied to the normalised correlation peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionThreshold {
    /// Threshold scales with the loudness of the window being searched
    Adaptive,
    /// Fixed normalised correlation threshold, clamped to 0.001..=1.0
    Fixed(f32),
}

impl Default for DetectionThreshold {
    fn default() -> Self {
        DetectionThreshold::Adaptive
    }
}

impl DetectionThreshold {
    pub fn clamped(self) -> Self {
        match self {
            DetectionThreshold::Adaptive => DetectionThreshold::Adaptive,
            DetectionThreshold::Fixed(value) => DetectionThreshold::Fixed(value.clamp(0.001, 1.0)),
        }
    }

    fn resolve(self, window_rms: f32) -> f32 {
        match self {
            DetectionThreshold::Fixed(value) => value,
            DetectionThreshold::Adaptive => {
                if window_rms > 0.1 {
                    0.4 // Strong signal: strict detection
                } else if window_rms > 0.02 {
                    0.35
                } else {
                    0.3 // Weak signal: relaxed threshold for quiet recordings
                }
            }
        }
    }
}

/// Generates a chirp signal that sweeps linearly from `start_freq` to `end_freq`
pub fn generate_chirp(
    duration_samples: usize,
    start_freq: f32,
    end_freq: f32,
    amplitude: f32,
    sample_rate: f32,
) -> Vec<f32> {
    let duration = duration_samples as f32 / sample_rate;
    let k = (end_freq - start_freq) / duration;

    let mut samples = vec![0.0; duration_samples];
    for (n, sample) in samples.iter_mut().enumerate() {
        let t = n as f32 / sample_rate;
        let phase = 2.0 * PI * (start_freq * t + k * t * t / 2.0);
        *sample = amplitude * phase.sin();
    }
    samples
}

/// The frontdoor that precedes every chirp: a faded linear up-sweep
pub fn generate_frontdoor(protocol: &ProtocolDescriptor, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let len = protocol.frontdoor_samples(sample_rate);
    let mut samples = generate_chirp(
        len,
        protocol.frontdoor_start_frequency,
        protocol.frontdoor_end_frequency,
        amplitude,
        sample_rate as f32,
    );

    let taper = ((len as f32) * FRONTDOOR_TAPER_RATIO).round() as usize;
    let window = raised_cosine_window(len, taper);
    for (sample, weight) in samples.iter_mut().zip(window.iter()) {
        *sample *= weight;
    }
    samples
}

/// A frontdoor match inside a scanned window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Offset of the frontdoor's first sample within the window
    pub position: usize,
    /// Normalised correlation at `position`, in 0..=1
    pub confidence: f32,
}

/// Searches fixed-size windows for the frontdoor
pub struct FrontdoorDetector {
    correlator: Correlator,
    template_energy: f64,
    threshold: DetectionThreshold,
}

impl FrontdoorDetector {
    /// `window_len` must be at least the frontdoor length; each scan evaluates
    /// `window_len - frontdoor_len + 1` candidate start positions.
    pub fn new(
        protocol: &ProtocolDescriptor,
        sample_rate: u32,
        window_len: usize,
        threshold: DetectionThreshold,
    ) -> Result<Self> {
        let template = generate_frontdoor(protocol, sample_rate, 1.0);
        let template_energy = template.iter().map(|&x| (x as f64) * (x as f64)).sum();
        let correlator = Correlator::new(&template, window_len)?;

        Ok(Self {
            correlator,
            template_energy,
            threshold: threshold.clamped(),
        })
    }

    pub fn window_len(&self) -> usize {
        self.correlator.signal_len()
    }

    pub fn template_len(&self) -> usize {
        self.correlator.template_len()
    }

    pub fn threshold(&self) -> DetectionThreshold {
        self.threshold
    }

    /// Best frontdoor position in `window`, if it clears the threshold
    pub fn scan(&mut self, window: &[f32]) -> Result<Option<Detection>> {
        let template_len = self.template_len();
        let raw = self.correlator.correlate(window)?;

        // Prefix sums of squared samples give each candidate's energy in O(1)
        let mut sq_prefix = vec![0.0f64; window.len() + 1];
        for (k, &x) in window.iter().enumerate() {
            sq_prefix[k + 1] = sq_prefix[k] + (x as f64) * (x as f64);
        }

        let min_energy = MIN_WINDOW_RMS * MIN_WINDOW_RMS * template_len as f64;
        let mut best: Option<Detection> = None;

        for (i, &raw_correlation) in raw.iter().enumerate() {
            let window_energy = sq_prefix[i + template_len] - sq_prefix[i];
            if window_energy < min_energy {
                continue;
            }

            let denom = (window_energy * self.template_energy).sqrt();
            let normalized = if denom > 1e-10 {
                ((raw_correlation as f64) / denom).abs() as f32
            } else {
                0.0
            };

            if best.map_or(true, |b| normalized > b.confidence) {
                best = Some(Detection {
                    position: i,
                    confidence: normalized,
                });
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };

        let window_rms = (sq_prefix[window.len()] / window.len() as f64).sqrt() as f32;
        let threshold = self.threshold.resolve(window_rms);

        if best.confidence > threshold {
            log::debug!(
                "frontdoor candidate at {} (confidence {:.3}, threshold {:.3})",
                best.position,
                best.confidence,
                threshold
            );
            Ok(Some(best))
        } else {
            Ok(None)
        }
    }
}
