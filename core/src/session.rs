use crate::callbacks::{Callbacks, SessionState};
use crate::config::SessionConfig;
use crate::engine::StreamEngine;
use crate::error::{ChirpError, Result};
use crate::licence::Licence;
use crate::payload::Payload;
use crate::protocol::ProtocolDescriptor;
use crate::SDK_VERSION;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Application credentials issued alongside a licence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
}

impl Credentials {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() {
            return Err(ChirpError::AuthenticationFailed("application key is empty".to_string()));
        }
        if self.app_secret.trim().is_empty() {
            return Err(ChirpError::AuthenticationFailed("application secret is empty".to_string()));
        }
        Ok(())
    }
}

/// Public entry point: one licensed session owning one stream engine
///
/// `Session` is `Send` but not `Sync`. Do not drive one session from several
/// threads without external synchronisation; the pump calls are expected to
/// come from a single audio loop.
pub struct Session {
    credentials: Credentials,
    protocol: ProtocolDescriptor,
    sample_rate: u32,
    engine: Option<StreamEngine>,
}

impl Session {
    /// Validate credentials, licence and configuration and build the engine
    pub fn new(credentials: Credentials, licence_token: &str, config: SessionConfig) -> Result<Self> {
        credentials.validate()?;
        config.validate()?;

        let licence = Licence::parse(licence_token)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let protocol = licence.validate(&credentials.app_key, now)?;

        let engine = StreamEngine::new(protocol.clone(), &config)?;
        log::info!(
            "Session created: protocol {} v{}, {} Hz",
            protocol.name,
            protocol.version,
            config.sample_rate
        );

        Ok(Self {
            credentials,
            protocol,
            sample_rate: config.sample_rate,
            engine: Some(engine),
        })
    }

    fn engine(&self) -> Result<&StreamEngine> {
        self.engine.as_ref().ok_or(ChirpError::Closed)
    }

    fn engine_mut(&mut self) -> Result<&mut StreamEngine> {
        self.engine.as_mut().ok_or(ChirpError::Closed)
    }

    pub fn app_key(&self) -> &str {
        &self.credentials.app_key
    }

    pub fn version(&self) -> &'static str {
        SDK_VERSION
    }

    pub fn protocol(&self) -> &ProtocolDescriptor {
        &self.protocol
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_payload_length(&self) -> usize {
        self.protocol.max_payload_length
    }

    /// Current engine state; a closed session reports `Stopped`
    pub fn state(&self) -> SessionState {
        self.engine
            .as_ref()
            .map_or(SessionState::Stopped, StreamEngine::state)
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    pub fn new_payload(&self, bytes: impl Into<Vec<u8>>) -> Result<Payload> {
        self.check_length(Payload::new(bytes))
    }

    pub fn payload_from_ascii(&self, text: &str) -> Result<Payload> {
        self.check_length(Payload::from_ascii(text)?)
    }

    pub fn payload_from_hex(&self, text: &str) -> Result<Payload> {
        self.check_length(Payload::from_hex(text)?)
    }

    pub fn random_payload(&self) -> Result<Payload> {
        Ok(self.engine()?.codec().random_payload())
    }

    fn check_length(&self, payload: Payload) -> Result<Payload> {
        self.engine()?;
        if payload.len() > self.max_payload_length() {
            return Err(ChirpError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload_length(),
            });
        }
        Ok(payload)
    }

    pub fn set_callbacks(&mut self, callbacks: Box<dyn Callbacks + Send>) -> Result<()> {
        self.engine_mut()?.set_callbacks(callbacks);
        Ok(())
    }

    pub fn start(&mut self, send: bool, receive: bool) -> Result<()> {
        self.engine_mut()?.start(send, receive)
    }

    pub fn send(&mut self, payload: Payload) -> Result<()> {
        self.engine_mut()?.send(payload)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.engine_mut()?.stop();
        Ok(())
    }

    /// See [`StreamEngine::process_shorts_output`]
    pub fn process_shorts_output(&mut self, buffer: &mut [i16]) -> Result<usize> {
        Ok(self.engine_mut()?.process_shorts_output(buffer))
    }

    pub fn process_shorts_input(&mut self, buffer: &[i16]) -> Result<()> {
        self.engine_mut()?.process_shorts_input(buffer)
    }

    /// Stop the engine and release it; calling `close` again is a no-op
    pub fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
            log::info!("Session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chirplink {} | protocol {} v{} | {} Hz | {}",
            SDK_VERSION,
            self.protocol.name,
            self.protocol.version,
            self.sample_rate,
            self.state()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(app_key: &str, protocol: &str) -> String {
        Licence::issue(app_key, protocol).to_token().unwrap()
    }

    fn session() -> Session {
        Session::new(
            Credentials::new("key", "secret"),
            &token("key", "standard"),
            SessionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_construction() {
        let session = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.max_payload_length(), 32);
        assert_eq!(session.sample_rate(), 44100);
        assert!(session.to_string().contains("protocol standard"));
    }

    #[test]
    fn test_empty_credentials() {
        let result = Session::new(
            Credentials::new("", "secret"),
            &token("", "standard"),
            SessionConfig::default(),
        );
        assert!(matches!(result, Err(ChirpError::AuthenticationFailed(_))));

        let result = Session::new(
            Credentials::new("key", " "),
            &token("key", "standard"),
            SessionConfig::default(),
        );
        assert!(matches!(result, Err(ChirpError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_licence_for_other_key() {
        let result = Session::new(
            Credentials::new("key", "secret"),
            &token("someone-else", "standard"),
            SessionConfig::default(),
        );
        assert!(matches!(result, Err(ChirpError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_bad_licence() {
        let result = Session::new(Credentials::new("key", "secret"), "garbage", SessionConfig::default());
        assert!(matches!(result, Err(ChirpError::LicenceInvalid(_))));

        let expired = Licence::issue("key", "standard").with_expiry(1).to_token().unwrap();
        let result = Session::new(Credentials::new("key", "secret"), &expired, SessionConfig::default());
        assert!(matches!(result, Err(ChirpError::LicenceInvalid(_))));
    }

    #[test]
    fn test_sample_rate_checks() {
        let low = SessionConfig::default().with_sample_rate(4000);
        let result = Session::new(Credentials::new("key", "secret"), &token("key", "standard"), low);
        assert!(matches!(result, Err(ChirpError::InvalidConfiguration(_))));

        let high = SessionConfig::default().with_sample_rate(192_000);
        let result = Session::new(Credentials::new("key", "secret"), &token("key", "standard"), high);
        assert!(matches!(result, Err(ChirpError::InvalidConfiguration(_))));

        let narrowband = SessionConfig::default().with_sample_rate(8000);
        assert!(Session::new(Credentials::new("key", "secret"), &token("key", "compact"), narrowband).is_ok());
    }

    #[test]
    fn test_payload_helpers() {
        let session = session();
        assert_eq!(session.payload_from_hex("0102").unwrap().as_bytes(), &[1, 2]);
        assert!(matches!(
            session.new_payload(vec![0; 33]),
            Err(ChirpError::PayloadTooLarge { .. })
        ));
        let random = session.random_payload().unwrap();
        assert!(!random.is_empty() && random.len() <= 32);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = session();
        session.start(false, true).unwrap();
        session.close();
        session.close();

        assert!(session.is_closed());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(session.start(true, false), Err(ChirpError::Closed)));
        assert!(matches!(session.process_shorts_input(&[0; 16]), Err(ChirpError::Closed)));
        assert!(matches!(session.random_payload(), Err(ChirpError::Closed)));
    }

    #[test]
    fn test_session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }
}
