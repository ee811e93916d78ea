//! Data-over-sound payload codec and streaming engine
//!
//! Payloads are framed with a CRC-16, protected with RS(6,4) over GF(16) and
//! sent as 16-tone FSK behind a chirp frontdoor. A [`Session`] owns one
//! [`StreamEngine`] that the caller drives by pumping 16-bit PCM buffers.

pub mod callbacks;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod demodulator;
pub mod engine;
pub mod error;
pub mod framing;
pub mod licence;
pub mod modulator;
pub mod payload;
pub mod protocol;
pub mod redundancy;
pub mod session;
pub mod sync;
pub mod tones;

pub use callbacks::{Callbacks, NoopCallbacks, SessionState};
pub use codec::{DecodeOutcome, PayloadCodec};
pub use config::{ReceiveMode, SessionConfig};
pub use demodulator::{DemodEvent, Demodulator};
pub use engine::StreamEngine;
pub use error::{ChirpError, Result};
pub use licence::Licence;
pub use modulator::{ChirpStream, Modulator};
pub use payload::Payload;
pub use protocol::ProtocolDescriptor;
pub use session::{Credentials, Session};
pub use sync::DetectionThreshold;

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// Audio configuration
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 96000;
pub const BUFFER_SIZE: usize = 1024; // samples per pump call in the CLI loops

// Frame configuration
pub const FRAME_OVERHEAD_BYTES: usize = 3; // length (1) + CRC-16 (2)
