use crate::error::{ChirpError, Result};
use crate::sync::DetectionThreshold;
use crate::DEFAULT_SAMPLE_RATE;
use serde::{Deserialize, Serialize};

/// How long the receive direction stays active after `start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// Keep listening after every received chirp
    #[default]
    Continuous,
    /// Go idle after the first chirp has been delivered
    Single,
}

/// Session settings that do not come from the licence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sample_rate: u32,
    pub receive_mode: ReceiveMode,
    pub detection_threshold: DetectionThreshold,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            receive_mode: ReceiveMode::Continuous,
            detection_threshold: DetectionThreshold::Adaptive,
        }
    }
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(text)
            .map_err(|e| ChirpError::InvalidConfiguration(format!("bad session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_receive_mode(mut self, receive_mode: ReceiveMode) -> Self {
        self.receive_mode = receive_mode;
        self
    }

    pub fn with_detection_threshold(mut self, threshold: DetectionThreshold) -> Self {
        self.detection_threshold = threshold;
        self
    }

    /// Checks that do not depend on the protocol; Nyquist is checked against
    /// the protocol once the licence is known.
    pub fn validate(&self) -> Result<()> {
        if let DetectionThreshold::Fixed(value) = self.detection_threshold {
            if !value.is_finite() {
                return Err(ChirpError::InvalidConfiguration(
                    "detection threshold must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}
