//! Licence tokens
//!
//! A token is the standard base64 encoding of a JSON document naming the
//! application key it was issued to, the protocol it unlocks and an optional
//! expiry (unix seconds).

use crate::error::{ChirpError, Result};
use crate::protocol::ProtocolDescriptor;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Licence {
    pub app_key: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Licence {
    /// A non-expiring licence, for offline use
    pub fn issue(app_key: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            protocol: protocol.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn to_token(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| ChirpError::LicenceInvalid(format!("cannot serialise licence: {}", e)))?;
        Ok(STANDARD.encode(json))
    }

    pub fn parse(token: &str) -> Result<Self> {
        let json = STANDARD
            .decode(token.trim())
            .map_err(|e| ChirpError::LicenceInvalid(format!("licence is not base64: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| ChirpError::LicenceInvalid(format!("licence is malformed: {}", e)))
    }

    /// Check the licence for `app_key` at unix time `now` and resolve its protocol
    pub fn validate(&self, app_key: &str, now: u64) -> Result<ProtocolDescriptor> {
        if self.app_key != app_key {
            return Err(ChirpError::AuthenticationFailed(
                "licence was issued for a different application key".to_string(),
            ));
        }
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return Err(ChirpError::LicenceInvalid(format!(
                    "licence expired at {}",
                    expires_at
                )));
            }
        }
        ProtocolDescriptor::by_name(&self.protocol)
            .ok_or_else(|| ChirpError::LicenceInvalid(format!("unknown protocol '{}'", self.protocol)))
    }
}
