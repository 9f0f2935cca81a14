//! Radio session: handshake state machine over a `RadioChannel`
//!
//! ```text
//! Idle --send token--> Sent --token echoed--> Acknowledged
//!                        \--deadline passes--> TimedOut
//! ```
//!
//! Only `Acknowledged` allows `receive_frame`; `reset` returns to `Idle`.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::RadioError;
use crate::radio::traits::{decode_latin1, RadioChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Sent,
    Acknowledged,
    TimedOut,
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Sent => "sent",
            HandshakeState::Acknowledged => "acknowledged",
            HandshakeState::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct RadioSession<R: RadioChannel> {
    channel: R,
    token: String,
    handshake_timeout: Duration,
    state: HandshakeState,
    last_error: Option<RadioError>,
}

impl<R: RadioChannel> RadioSession<R> {
    pub fn new(channel: R, token: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            channel,
            token: token.into(),
            handshake_timeout,
            state: HandshakeState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Channel error that ended the last handshake, if any
    pub fn last_error(&self) -> Option<&RadioError> {
        self.last_error.as_ref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn channel(&self) -> &R {
        &self.channel
    }

    /// Back to `Idle` for the next cycle
    pub fn reset(&mut self) {
        self.state = HandshakeState::Idle;
        self.last_error = None;
    }

    /// Send the token and wait for the node to echo it back
    ///
    /// Frames that are not the echo are dropped while waiting. Returns the
    /// resulting state, either `Acknowledged` or `TimedOut`.
    pub async fn handshake(&mut self) -> HandshakeState {
        if self.state != HandshakeState::Idle {
            self.reset();
        }

        if let Err(e) = self.channel.send(self.token.as_bytes()).await {
            warn!("Handshake send failed: {}", e);
            self.last_error = Some(e);
            self.state = HandshakeState::TimedOut;
            return self.state;
        }
        self.state = HandshakeState::Sent;
        info!("Handshake sent: {}", self.token);

        let deadline = Instant::now() + self.handshake_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match self.channel.receive(remaining).await {
                Ok(payload) => {
                    let frame = decode_latin1(&payload);
                    if frame.trim() == self.token {
                        self.state = HandshakeState::Acknowledged;
                        info!("Handshake acknowledged");
                        return self.state;
                    }
                    debug!("Ignoring frame while awaiting handshake: {:?}", frame);
                },
                Err(RadioError::Timeout(_)) => break,
                Err(e) => {
                    warn!("Radio error during handshake: {}", e);
                    self.last_error = Some(e);
                    break;
                },
            }
        }

        info!("No handshake reply within {:?}", self.handshake_timeout);
        self.state = HandshakeState::TimedOut;
        self.state
    }

    /// Next raw frame after an acknowledged handshake
    pub async fn receive_frame(&mut self, timeout: Duration) -> Result<String, RadioError> {
        if self.state != HandshakeState::Acknowledged {
            return Err(RadioError::Channel(format!(
                "cannot receive in {} state",
                self.state
            )));
        }

        let payload = self.channel.receive(timeout).await?;
        let frame = decode_latin1(&payload);
        debug!("Received raw frame: {}", frame.trim_end());
        Ok(frame)
    }

    pub async fn diagnostics(&self) -> HashMap<String, String> {
        let mut diag = self.channel.diagnostics().await;
        diag.insert("handshake_state".to_string(), self.state.to_string());
        diag
    }
}
