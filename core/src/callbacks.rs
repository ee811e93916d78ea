use crate::payload::Payload;
use std::fmt;

/// Externally visible engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Sending,
    Receiving,
    SendingReceiving,
    Stopped,
}

impl SessionState {
    pub fn is_sending(self) -> bool {
        matches!(self, SessionState::Sending | SessionState::SendingReceiving)
    }

    pub fn is_receiving(self) -> bool {
        matches!(self, SessionState::Receiving | SessionState::SendingReceiving)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Sending => "sending",
            SessionState::Receiving => "receiving",
            SessionState::SendingReceiving => "sending+receiving",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Event hooks invoked synchronously from the pump calls
///
/// Every method defaults to a no-op, so implementors only override the events
/// they care about.
pub trait Callbacks {
    fn on_state_changed(&mut self, _previous: SessionState, _current: SessionState) {}

    /// The first sample of `payload` has been written to an output buffer
    fn on_sending(&mut self, _payload: &Payload) {}

    /// The last sample of `payload` has been written to an output buffer
    fn on_sent(&mut self, _payload: &Payload) {}

    /// A frontdoor was detected on the input
    fn on_receiving(&mut self) {}

    /// A chirp finished; an empty payload means it could not be decoded
    fn on_received(&mut self, _payload: &Payload) {}
}

/// Callbacks that ignore every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}
