use chirplink_core::ChirpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Chirp(#[from] ChirpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedWav(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Loopback failed: {0}")]
    Loopback(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
