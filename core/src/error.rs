use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChirpError {
    #[error("Payload of {len} bytes exceeds the protocol maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Send direction has not been started")]
    NotStarted,

    #[error("Engine is already running, stop it first")]
    AlreadyRunning,

    #[error("Session has been closed")]
    Closed,

    #[error("Invalid licence: {0}")]
    LicenceInvalid(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("CRC mismatch in frame")]
    CrcMismatch,

    #[error("Too many symbol errors in block")]
    UncorrectableBlock,

    #[error("Invalid frame size")]
    InvalidFrameSize,

    #[error("FFT error: {0}")]
    FftError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, ChirpError>;
