//! Streaming receiver: frontdoor search followed by symbol capture
//!
//! Audio arrives in arbitrary block sizes. Samples accumulate in a pending
//! buffer and are consumed only once enough are present for the current
//! step, so results do not depend on how the caller slices its input.

use crate::codec::{DecodeOutcome, PayloadCodec};
use crate::error::Result;
use crate::protocol::ProtocolDescriptor;
use crate::redundancy::SYMBOLS_PER_BLOCK;
use crate::sync::{DetectionThreshold, FrontdoorDetector};
use crate::tones::{condition_symbol, goertzel};

/// Samples kept ahead of a frontdoor found near the end of a search window
const SEARCH_GUARD_SAMPLES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DemodEvent {
    /// A frontdoor passed the detection threshold; symbols follow
    FrontdoorDetected { confidence: f32 },
    /// A chirp finished, successfully or not
    FrameDecoded(DecodeOutcome),
}

enum Phase {
    Searching,
    Capturing {
        symbols: Vec<u8>,
        expected: Option<usize>,
    },
}

pub struct Demodulator {
    detector: FrontdoorDetector,
    codec: PayloadCodec,
    tone_frequencies: Vec<f32>,
    sample_rate: f32,
    frontdoor_samples: usize,
    symbol_samples: usize,
    hop: usize,
    pending: Vec<f32>,
    phase: Phase,
}

impl Demodulator {
    pub fn new(protocol: &ProtocolDescriptor, sample_rate: u32, threshold: DetectionThreshold) -> Result<Self> {
        let frontdoor_samples = protocol.frontdoor_samples(sample_rate);
        let hop = frontdoor_samples;
        let detector = FrontdoorDetector::new(protocol, sample_rate, frontdoor_samples + hop, threshold)?;

        Ok(Self {
            detector,
            codec: PayloadCodec::new(protocol),
            tone_frequencies: (0..protocol.alphabet_size)
                .map(|symbol| protocol.tone_frequency(symbol as u8))
                .collect(),
            sample_rate: sample_rate as f32,
            frontdoor_samples,
            symbol_samples: protocol.symbol_samples(sample_rate),
            hop,
            pending: Vec::new(),
            phase: Phase::Searching,
        })
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.phase, Phase::Capturing { .. })
    }

    /// Drop buffered audio and any chirp in progress
    pub fn reset(&mut self) {
        self.pending.clear();
        self.phase = Phase::Searching;
    }

    /// Feed samples and collect whatever events they complete
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<DemodEvent>> {
        self.pending.extend_from_slice(samples);
        let mut events = Vec::new();

        loop {
            let progressed = match self.phase {
                Phase::Searching => self.search(&mut events)?,
                Phase::Capturing { .. } => self.capture(&mut events),
            };
            if !progressed {
                break;
            }
        }

        Ok(events)
    }

    fn search(&mut self, events: &mut Vec<DemodEvent>) -> Result<bool> {
        let span = self.detector.window_len();
        if self.pending.len() < span {
            return Ok(false);
        }

        let detection = self.detector.scan(&self.pending[..span])?;
        let Some(detection) = detection else {
            // Every start position up to `hop` was tested
            self.pending.drain(..self.hop + 1);
            return Ok(true);
        };

        // Near the window edge the true peak may lie just beyond it, so
        // re-centre and scan again before committing
        if detection.position > self.hop.saturating_sub(SEARCH_GUARD_SAMPLES)
            && detection.position > SEARCH_GUARD_SAMPLES
        {
            self.pending.drain(..detection.position - SEARCH_GUARD_SAMPLES);
            return Ok(true);
        }

        log::debug!(
            "Frontdoor detected (confidence {:.3}), capturing symbols",
            detection.confidence
        );
        events.push(DemodEvent::FrontdoorDetected {
            confidence: detection.confidence,
        });

        self.pending.drain(..detection.position + self.frontdoor_samples);
        self.phase = Phase::Capturing {
            symbols: Vec::new(),
            expected: None,
        };
        Ok(true)
    }

    fn capture(&mut self, events: &mut Vec<DemodEvent>) -> bool {
        if self.pending.len() < self.symbol_samples {
            return false;
        }

        let symbol = self.detect_symbol(&self.pending[..self.symbol_samples]);
        self.pending.drain(..self.symbol_samples);

        let Phase::Capturing { symbols, expected } = &mut self.phase else {
            return false;
        };
        symbols.push(symbol);

        if expected.is_none() && symbols.len() == SYMBOLS_PER_BLOCK {
            match self.codec.frame_symbol_count(symbols) {
                Some(count) => *expected = Some(count),
                None => {
                    log::warn!("Chirp header unreadable, abandoning capture");
                    events.push(DemodEvent::FrameDecoded(DecodeOutcome::failed()));
                    self.phase = Phase::Searching;
                    return true;
                }
            }
        }

        if *expected == Some(symbols.len()) {
            let outcome = self.codec.decode(symbols);
            if outcome.success {
                log::debug!("Decoded payload {}", outcome.payload);
            }
            events.push(DemodEvent::FrameDecoded(outcome));
            self.phase = Phase::Searching;
        }

        true
    }

    /// Strongest of the protocol tones in one symbol period
    fn detect_symbol(&self, samples: &[f32]) -> u8 {
        let conditioned = condition_symbol(samples);
        let mut best_symbol = 0u8;
        let mut best_power = f32::MIN;

        for (symbol, &freq) in self.tone_frequencies.iter().enumerate() {
            let power = goertzel(&conditioned, freq, self.sample_rate);
            if power > best_power {
                best_power = power;
                best_symbol = symbol as u8;
            }
        }

        best_symbol
    }
}
