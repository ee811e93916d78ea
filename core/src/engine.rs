//! Caller-driven send/receive engine
//!
//! The engine never owns a thread. Audio only moves when the caller pumps
//! `process_shorts_output` / `process_shorts_input`, and every callback runs
//! synchronously inside one of those calls (or inside `start`/`send`/`stop`
//! for state changes).

use crate::callbacks::{Callbacks, NoopCallbacks, SessionState};
use crate::codec::PayloadCodec;
use crate::config::{ReceiveMode, SessionConfig};
use crate::demodulator::{DemodEvent, Demodulator};
use crate::error::{ChirpError, Result};
use crate::modulator::{ChirpStream, Modulator};
use crate::payload::Payload;
use crate::protocol::ProtocolDescriptor;
use std::collections::VecDeque;

/// A queued payload and the lazy audio that carries it
struct Transmission {
    payload: Payload,
    stream: ChirpStream,
    started: bool,
}

pub struct StreamEngine {
    protocol: ProtocolDescriptor,
    codec: PayloadCodec,
    modulator: Modulator,
    demodulator: Demodulator,
    receive_mode: ReceiveMode,
    callbacks: Box<dyn Callbacks + Send>,
    queue: VecDeque<Transmission>,
    state: SessionState,
    send_armed: bool,
    receive_armed: bool,
    send_pending: bool,
    receive_done: bool,
    float_buffer: Vec<f32>,
}

impl StreamEngine {
    pub fn new(protocol: ProtocolDescriptor, config: &SessionConfig) -> Result<Self> {
        protocol.validate_sample_rate(config.sample_rate)?;

        Ok(Self {
            codec: PayloadCodec::new(&protocol),
            modulator: Modulator::new(&protocol, config.sample_rate),
            demodulator: Demodulator::new(&protocol, config.sample_rate, config.detection_threshold)?,
            receive_mode: config.receive_mode,
            callbacks: Box::new(NoopCallbacks),
            queue: VecDeque::new(),
            state: SessionState::Idle,
            send_armed: false,
            receive_armed: false,
            send_pending: false,
            receive_done: false,
            float_buffer: Vec::new(),
            protocol,
        })
    }

    pub fn protocol(&self) -> &ProtocolDescriptor {
        &self.protocol
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_callbacks(&mut self, callbacks: Box<dyn Callbacks + Send>) {
        self.callbacks = callbacks;
    }

    /// Arm the send and/or receive direction
    pub fn start(&mut self, send: bool, receive: bool) -> Result<()> {
        if !send && !receive {
            return Err(ChirpError::InvalidConfiguration(
                "start requires the send or receive direction".to_string(),
            ));
        }
        if self.send_armed || self.receive_armed {
            return Err(ChirpError::AlreadyRunning);
        }

        self.send_armed = send;
        self.receive_armed = receive;
        self.send_pending = send;
        self.receive_done = false;
        self.demodulator.reset();

        log::debug!("Engine started (send: {}, receive: {})", send, receive);
        self.refresh_state();
        Ok(())
    }

    /// Encode and queue a payload; audio is produced by the output pump
    pub fn send(&mut self, payload: Payload) -> Result<()> {
        if !self.send_armed {
            return Err(ChirpError::NotStarted);
        }

        let symbols = self.codec.encode(&payload)?;
        let stream = self.modulator.stream(symbols)?;
        log::debug!(
            "Queued payload {} ({} bytes, {} samples)",
            payload,
            payload.len(),
            stream.len()
        );

        self.queue.push_back(Transmission {
            payload,
            stream,
            started: false,
        });

        if !self.send_pending {
            self.send_pending = true;
            self.refresh_state();
        }
        Ok(())
    }

    /// Fill `buffer` with the next audio, silence once the queue is empty
    ///
    /// Returns the number of samples that carried chirp audio.
    pub fn process_shorts_output(&mut self, buffer: &mut [i16]) -> usize {
        buffer.fill(0);
        if self.state == SessionState::Stopped || !self.send_armed {
            return 0;
        }

        if self.float_buffer.len() < buffer.len() {
            self.float_buffer.resize(buffer.len(), 0.0);
        }

        let mut written = 0;
        while written < buffer.len() {
            let Some(current) = self.queue.front_mut() else {
                break;
            };

            if !current.started {
                current.started = true;
                self.callbacks.on_sending(&current.payload);
            }

            let chunk = &mut self.float_buffer[written..buffer.len()];
            let count = current.stream.fill(chunk);
            for (out, &sample) in buffer[written..written + count].iter_mut().zip(chunk.iter()) {
                *out = to_i16(sample);
            }
            written += count;

            if current.stream.is_finished() {
                if let Some(done) = self.queue.pop_front() {
                    log::info!("Sent payload {}", done.payload);
                    self.callbacks.on_sent(&done.payload);
                }
            }
        }

        if self.queue.is_empty() && self.send_pending {
            self.send_pending = false;
            self.refresh_state();
        }

        written
    }

    /// Feed captured audio to the receiver
    pub fn process_shorts_input(&mut self, buffer: &[i16]) -> Result<()> {
        if self.state == SessionState::Stopped || !self.receive_active() {
            return Ok(());
        }

        self.float_buffer.clear();
        self.float_buffer.extend(buffer.iter().map(|&s| s as f32 / 32768.0));

        let events = self.demodulator.push(&self.float_buffer)?;
        for event in events {
            match event {
                DemodEvent::FrontdoorDetected { .. } => {
                    self.callbacks.on_receiving();
                }
                DemodEvent::FrameDecoded(outcome) => {
                    if outcome.success {
                        log::info!("Received payload {}", outcome.payload);
                    }
                    self.callbacks.on_received(&outcome.payload);

                    if self.receive_mode == ReceiveMode::Single {
                        self.receive_done = true;
                        self.demodulator.reset();
                        self.refresh_state();
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Drop all queued and partial work and move to `Stopped`
    pub fn stop(&mut self) {
        self.queue.clear();
        self.demodulator.reset();
        self.send_armed = false;
        self.receive_armed = false;
        self.send_pending = false;
        self.receive_done = false;
        self.transition(SessionState::Stopped);
    }

    fn receive_active(&self) -> bool {
        self.receive_armed && !self.receive_done
    }

    fn refresh_state(&mut self) {
        let sending = self.send_armed && self.send_pending;
        let receiving = self.receive_active();

        let next = match (sending, receiving) {
            (true, true) => SessionState::SendingReceiving,
            (true, false) => SessionState::Sending,
            (false, true) => SessionState::Receiving,
            (false, false) => SessionState::Idle,
        };
        self.transition(next);
    }

    fn transition(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }
        let previous = self.state;
        self.state = next;
        log::info!("State changed: {} -> {}", previous, next);
        self.callbacks.on_state_changed(previous, next);
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
