use crate::error::{ChirpError, Result};
use crate::protocol::ProtocolDescriptor;
use crate::sync::generate_frontdoor;
use crate::tones::symbol_envelope;
use std::f32::consts::PI;
use std::sync::Arc;

/// Per-session synthesis tables shared by every stream
///
/// Holds one frontdoor, one symbol envelope and one angular frequency per
/// tone. Sizes depend only on the protocol timing, never on payload length.
struct ToneBank {
    frontdoor: Vec<f32>,
    envelope: Vec<f32>,
    angular_freqs: Vec<f32>,
    amplitude: f32,
}

impl ToneBank {
    fn symbol_samples(&self) -> usize {
        self.envelope.len()
    }
}

/// Multi-tone FSK modulator
///
/// Each symbol (a nibble, 0-15) selects one tone from the protocol's tone
/// plan and lasts one symbol period. Every chirp starts with the frontdoor.
pub struct Modulator {
    bank: Arc<ToneBank>,
    alphabet_size: usize,
}

impl Modulator {
    pub fn new(protocol: &ProtocolDescriptor, sample_rate: u32) -> Self {
        let sample_rate_f = sample_rate as f32;
        let angular_freqs = (0..protocol.alphabet_size)
            .map(|symbol| 2.0 * PI * protocol.tone_frequency(symbol as u8) / sample_rate_f)
            .collect();

        Self {
            bank: Arc::new(ToneBank {
                frontdoor: generate_frontdoor(protocol, sample_rate, protocol.amplitude),
                envelope: symbol_envelope(protocol.symbol_samples(sample_rate)),
                angular_freqs,
                amplitude: protocol.amplitude,
            }),
            alphabet_size: protocol.alphabet_size,
        }
    }

    pub fn symbol_samples(&self) -> usize {
        self.bank.symbol_samples()
    }

    pub fn frontdoor_samples(&self) -> usize {
        self.bank.frontdoor.len()
    }

    /// Total samples of a chirp carrying `symbol_count` symbols
    pub fn chirp_samples(&self, symbol_count: usize) -> usize {
        self.frontdoor_samples() + symbol_count * self.symbol_samples()
    }

    /// Lazy audio for one chirp; samples are synthesised as they are pulled
    pub fn stream(&self, symbols: Vec<u8>) -> Result<ChirpStream> {
        if symbols.iter().any(|&s| s as usize >= self.alphabet_size) {
            return Err(ChirpError::InvalidInputSize);
        }

        let total = self.chirp_samples(symbols.len());
        Ok(ChirpStream {
            bank: Arc::clone(&self.bank),
            symbols,
            position: 0,
            total,
        })
    }

    /// Render a whole chirp at once, for file output and tests
    pub fn modulate(&self, symbols: &[u8]) -> Result<Vec<f32>> {
        Ok(self.stream(symbols.to_vec())?.collect())
    }
}

/// Pull cursor over the audio of one chirp
///
/// Sample `n` is computed from `n` alone, so the stream never holds more than
/// its symbol list and the shared tables.
pub struct ChirpStream {
    bank: Arc<ToneBank>,
    symbols: Vec<u8>,
    position: usize,
    total: usize,
}

impl ChirpStream {
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.total - self.position
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total
    }

    /// Write the next samples into `out`, returning how many were written
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.remaining());
        for (offset, slot) in out[..count].iter_mut().enumerate() {
            *slot = self.sample_at(self.position + offset);
        }
        self.position += count;
        count
    }

    fn sample_at(&self, n: usize) -> f32 {
        let frontdoor_len = self.bank.frontdoor.len();
        if n < frontdoor_len {
            return self.bank.frontdoor[n];
        }

        let symbol_samples = self.bank.symbol_samples();
        let offset = n - frontdoor_len;
        let symbol = self.symbols[offset / symbol_samples] as usize;
        let i = offset % symbol_samples;

        let omega = self.bank.angular_freqs[symbol];
        self.bank.amplitude * (omega * i as f32).sin() * self.bank.envelope[i]
    }
}

impl Iterator for ChirpStream {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.is_finished() {
            return None;
        }
        let sample = self.sample_at(self.position);
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChirpStream {}
