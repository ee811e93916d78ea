use crate::error::{ChirpError, Result};
use rand::{Rng, RngCore};
use std::fmt;

/// An immutable chirp payload
///
/// The canonical string form is lowercase hex, which also names the default
/// `.wav` file a payload is rendered to. A zero-length payload is what a failed
/// decode delivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a payload from printable ASCII text
    pub fn from_ascii(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(ChirpError::InvalidPayload(format!(
                "'{}' is not ASCII",
                text
            )));
        }
        Ok(Self::new(text.as_bytes()))
    }

    /// Build a payload from a hex string such as `"0102030405"`
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| ChirpError::InvalidPayload(format!("bad hex '{}': {}", text, e)))?;
        Ok(Self::new(bytes))
    }

    /// Random payload of uniformly random length `1..=max_len`
    ///
    /// Bytes come from the thread-local CSPRNG.
    pub fn random(max_len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let len = rng.gen_range(1..=max_len.max(1));
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// File name used when a payload is written to disk without an explicit path
    pub fn default_filename(&self) -> String {
        format!("{}.wav", self.to_hex())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_representation() {
        let payload = Payload::new(vec![0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(payload.to_string(), "0102030405");
        assert_eq!(payload.default_filename(), "0102030405.wav");
    }

    #[test]
    fn test_from_hex() {
        let payload = Payload::from_hex("deadBEEF").unwrap();
        assert_eq!(payload.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);

        assert!(Payload::from_hex("abc").is_err());
        assert!(Payload::from_hex("zz").is_err());
    }

    #[test]
    fn test_from_ascii() {
        let payload = Payload::from_ascii("hello").unwrap();
        assert_eq!(payload.as_bytes(), b"hello");
        assert!(Payload::from_ascii("héllo").is_err());
    }

    #[test]
    fn test_random_payload_bounds() {
        for _ in 0..200 {
            let payload = Payload::random(8);
            assert!(!payload.is_empty());
            assert!(payload.len() <= 8);
        }
    }

    #[test]
    fn test_random_payloads_differ() {
        let draws: std::collections::HashSet<Payload> = (0..8).map(|_| Payload::random(32)).collect();
        assert!(draws.len() > 1);
    }
}
