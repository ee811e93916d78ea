//! Payload <-> symbol sequence
//!
//! Encode: frame the payload (length byte + CRC-16), split it into nibbles and
//! protect every 4 nibbles with 2 RS parity nibbles. Decode reverses the chain.
//! The length byte sits inside the first RS block, so a receiver learns how many
//! symbols to expect after the first 6.

use crate::error::{ChirpError, Result};
use crate::framing::{decode_frame, encode_frame, frame_len};
use crate::payload::Payload;
use crate::protocol::ProtocolDescriptor;
use crate::redundancy::{decode_block, decode_blocks, encode_blocks, encoded_len, from_nibbles, to_nibbles, SYMBOLS_PER_BLOCK};

/// Result of decoding one captured symbol sequence
///
/// A failed decode carries an empty payload; callers report it through the
/// same path as a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub payload: Payload,
    pub success: bool,
}

impl DecodeOutcome {
    pub fn decoded(payload: Payload) -> Self {
        Self { payload, success: true }
    }

    pub fn failed() -> Self {
        Self {
            payload: Payload::empty(),
            success: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayloadCodec {
    max_payload_length: usize,
}

impl PayloadCodec {
    pub fn new(protocol: &ProtocolDescriptor) -> Self {
        Self {
            max_payload_length: protocol.max_payload_length,
        }
    }

    pub fn max_payload_length(&self) -> usize {
        self.max_payload_length
    }

    /// Symbols on the wire for a payload of `payload_len` bytes
    pub fn symbol_count(&self, payload_len: usize) -> usize {
        encoded_len(2 * frame_len(payload_len))
    }

    /// Symbols a chirp carries, from its first RS block alone
    ///
    /// `None` when the block is unreadable or declares an impossible length.
    pub fn frame_symbol_count(&self, first_block: &[u8]) -> Option<usize> {
        let block: &[u8; SYMBOLS_PER_BLOCK] = first_block.get(..SYMBOLS_PER_BLOCK)?.try_into().ok()?;
        let nibbles = decode_block(block).ok()?;
        let declared = ((nibbles[0] << 4) | nibbles[1]) as usize;
        if declared == 0 || declared > self.max_payload_length {
            return None;
        }
        Some(self.symbol_count(declared))
    }

    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        if payload.is_empty() {
            return Err(ChirpError::InvalidPayload("payload is empty".to_string()));
        }
        if payload.len() > self.max_payload_length {
            return Err(ChirpError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload_length,
            });
        }

        let frame = encode_frame(payload.as_bytes())?;
        Ok(encode_blocks(&to_nibbles(&frame)))
    }

    /// Decode symbols back to a payload; never fails, failures are reported
    /// in the outcome.
    pub fn decode(&self, symbols: &[u8]) -> DecodeOutcome {
        match self.try_decode(symbols) {
            Ok(bytes) => DecodeOutcome::decoded(Payload::new(bytes)),
            Err(e) => {
                log::warn!("Failed to decode chirp of {} symbols: {}", symbols.len(), e);
                DecodeOutcome::failed()
            }
        }
    }

    fn try_decode(&self, symbols: &[u8]) -> Result<Vec<u8>> {
        let nibbles = decode_blocks(symbols)?;
        decode_frame(&from_nibbles(&nibbles), self.max_payload_length)
    }

    /// Random payload no longer than the protocol maximum
    pub fn random_payload(&self) -> Payload {
        Payload::random(self.max_payload_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PayloadCodec {
        PayloadCodec::new(&ProtocolDescriptor::standard())
    }

    #[test]
    fn test_encode_decode() {
        let codec = codec();
        let payload = Payload::new(vec![0x01, 0x02, 0x03, 0x04, 0x05]);

        let symbols = codec.encode(&payload).unwrap();
        assert_eq!(symbols.len(), codec.symbol_count(5));
        assert!(symbols.iter().all(|&s| s < 16));

        let outcome = codec.decode(&symbols);
        assert!(outcome.success);
        assert_eq!(outcome.payload, payload);
    }

    #[test]
    fn test_symbol_count() {
        // 5 bytes + 3 overhead = 16 nibbles = 4 blocks of 6
        assert_eq!(codec().symbol_count(5), 24);
        // 1 byte + 3 overhead = 8 nibbles = 2 blocks
        assert_eq!(codec().symbol_count(1), 12);
        // 32 bytes + 3 = 70 nibbles -> 18 blocks
        assert_eq!(codec().symbol_count(32), 108);
    }

    #[test]
    fn test_frame_symbol_count_from_first_block() {
        let codec = codec();
        let symbols = codec.encode(&Payload::new(vec![0xAB; 7])).unwrap();
        assert_eq!(codec.frame_symbol_count(&symbols[..6]), Some(symbols.len()));
        assert_eq!(codec.frame_symbol_count(&symbols[..4]), None);
    }

    #[test]
    fn test_frame_symbol_count_rejects_oversized_length() {
        let compact = PayloadCodec::new(&ProtocolDescriptor::compact());
        let symbols = codec().encode(&Payload::new(vec![0x11; 20])).unwrap();
        assert_eq!(compact.frame_symbol_count(&symbols[..6]), None);
    }

    #[test]
    fn test_corrects_one_error_per_block() {
        let codec = codec();
        let payload = Payload::from_ascii("hello chirp").unwrap();
        let mut symbols = codec.encode(&payload).unwrap();

        for block in symbols.chunks_mut(SYMBOLS_PER_BLOCK) {
            block[2] ^= 0x0B;
        }

        let outcome = codec.decode(&symbols);
        assert!(outcome.success);
        assert_eq!(outcome.payload, payload);
    }

    #[test]
    fn test_heavy_corruption_fails_with_empty_payload() {
        let codec = codec();
        let mut symbols = codec.encode(&Payload::new(vec![9, 8, 7, 6])).unwrap();
        for block in symbols.chunks_mut(SYMBOLS_PER_BLOCK) {
            block[0] ^= 0x05;
            block[1] ^= 0x0A;
            block[3] ^= 0x03;
        }

        let outcome = codec.decode(&symbols);
        assert!(!outcome.success);
        assert!(outcome.payload.is_empty());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let codec = codec();
        assert!(matches!(
            codec.encode(&Payload::empty()),
            Err(ChirpError::InvalidPayload(_))
        ));
        assert!(matches!(
            codec.encode(&Payload::new(vec![0; 33])),
            Err(ChirpError::PayloadTooLarge { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_random_payload_fits() {
        let codec = PayloadCodec::new(&ProtocolDescriptor::compact());
        for _ in 0..50 {
            let payload = codec.random_payload();
            assert!(!payload.is_empty() && payload.len() <= 8);
            assert!(codec.encode(&payload).is_ok());
        }
    }
}
