use crate::error::{ChirpError, Result};
use crate::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use serde::{Deserialize, Serialize};

/// Number of distinct tones in every built-in protocol (one nibble per symbol)
pub const ALPHABET_SIZE: usize = 16;

/// Describes the tone plan and framing limits of a protocol
///
/// Tone spacing is a whole multiple of `1000 / symbol_duration_ms` Hz so that
/// every tone falls on an exact analysis bin of a symbol-length window,
/// whatever the sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    pub name: String,
    pub version: u32,
    pub alphabet_size: usize,
    pub max_payload_length: usize,
    /// Frequency of symbol 0 in Hz
    pub base_frequency: f32,
    /// Distance between adjacent symbol tones in Hz
    pub frequency_spacing: f32,
    pub symbol_duration_ms: u32,
    pub frontdoor_duration_ms: u32,
    pub frontdoor_start_frequency: f32,
    pub frontdoor_end_frequency: f32,
    /// Peak amplitude of synthesised audio in [0, 1]
    pub amplitude: f32,
}

impl ProtocolDescriptor {
    /// 32-byte payloads, 50 ms symbols on 1000-2500 Hz
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            version: 1,
            alphabet_size: ALPHABET_SIZE,
            max_payload_length: 32,
            base_frequency: 1000.0,
            frequency_spacing: 100.0,
            symbol_duration_ms: 50,
            frontdoor_duration_ms: 100,
            frontdoor_start_frequency: 800.0,
            frontdoor_end_frequency: 3000.0,
            amplitude: 0.5,
        }
    }

    /// 8-byte payloads, 40 ms symbols on 1200-3075 Hz
    pub fn compact() -> Self {
        Self {
            name: "compact".to_string(),
            version: 1,
            alphabet_size: ALPHABET_SIZE,
            max_payload_length: 8,
            base_frequency: 1200.0,
            frequency_spacing: 125.0,
            symbol_duration_ms: 40,
            frontdoor_duration_ms: 80,
            frontdoor_start_frequency: 1000.0,
            frontdoor_end_frequency: 3500.0,
            amplitude: 0.5,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "compact" => Some(Self::compact()),
            _ => None,
        }
    }

    pub fn tone_frequency(&self, symbol: u8) -> f32 {
        self.base_frequency + symbol as f32 * self.frequency_spacing
    }

    pub fn highest_frequency(&self) -> f32 {
        let top_tone = self.tone_frequency((self.alphabet_size - 1) as u8);
        top_tone
            .max(self.frontdoor_start_frequency)
            .max(self.frontdoor_end_frequency)
    }

    pub fn symbol_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as usize * self.symbol_duration_ms as usize) / 1000
    }

    pub fn frontdoor_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as usize * self.frontdoor_duration_ms as usize) / 1000
    }

    /// Check that audio at `sample_rate` can carry every tone of this protocol
    pub fn validate_sample_rate(&self, sample_rate: u32) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ChirpError::InvalidConfiguration(format!(
                "sample rate {} Hz outside {}..={} Hz",
                sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }

        let nyquist = sample_rate as f32 / 2.0;
        if self.highest_frequency() >= nyquist {
            return Err(ChirpError::InvalidConfiguration(format!(
                "sample rate {} Hz too low for protocol '{}' (highest tone {} Hz)",
                sample_rate,
                self.name,
                self.highest_frequency()
            )));
        }
        Ok(())
    }
}

impl Default for ProtocolDescriptor {
    fn default() -> Self {
        Self::standard()
    }
}
