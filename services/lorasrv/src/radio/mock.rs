//! In-memory radio
//!
//! Scripted mode replays queued frames and errors for tests. Simulated mode
//! answers every handshake like a real sensor node would, which lets the
//! whole gateway run on a machine without a modem.

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::error::RadioError;
use crate::radio::traits::RadioChannel;

#[derive(Debug)]
enum Scripted {
    Frame(Bytes),
    Error(RadioError),
}

/// Fake sensor node that replies to its handshake token
#[derive(Debug, Clone)]
pub struct SimulatedNode {
    pub device_id: String,
    pub token: String,
    /// Data frames sent after each acknowledged handshake
    pub frames_per_handshake: usize,
}

impl SimulatedNode {
    pub fn new(device_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.into(),
            frames_per_handshake: 1,
        }
    }

    /// One plausible telemetry frame
    pub fn sample_frame(&self) -> String {
        let mut rng = rand::thread_rng();
        let max_a: f64 = rng.gen_range(0.5..4.0);
        format!(
            "ID:{}, Max_A:{:.2}, RMS_A:{:.2}, Temp:{:.1}, Pressure:{:.2}, Humidity:{:.1}",
            self.device_id,
            max_a,
            max_a * rng.gen_range(0.4..0.8),
            rng.gen_range(10.0..30.0),
            rng.gen_range(990.0..1030.0),
            rng.gen_range(30.0..80.0),
        )
    }
}

#[derive(Debug, Default)]
struct MockRadioState {
    queue: VecDeque<Scripted>,
    sent: Vec<Bytes>,
    fail_send: bool,
    node: Option<SimulatedNode>,
}

/// Cloneable handle; clones share the same queue and send log
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    state: Arc<Mutex<MockRadioState>>,
}

impl MockRadio {
    /// Empty scripted radio
    pub fn new() -> Self {
        Self::default()
    }

    /// Radio backed by a simulated node
    pub fn simulated(node: SimulatedNode) -> Self {
        let radio = Self::new();
        radio.lock().node = Some(node);
        radio
    }

    fn lock(&self) -> MutexGuard<'_, MockRadioState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a frame for a later `receive`
    pub fn push_frame(&self, frame: impl Into<Bytes>) {
        self.lock().queue.push_back(Scripted::Frame(frame.into()));
    }

    /// Queue an error for a later `receive`
    pub fn push_error(&self, error: RadioError) {
        self.lock().queue.push_back(Scripted::Error(error));
    }

    /// Make every `send` fail
    pub fn set_send_failure(&self, fail: bool) {
        self.lock().fail_send = fail;
    }

    /// Payloads sent so far
    pub fn sent(&self) -> Vec<Bytes> {
        self.lock().sent.clone()
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }
}

#[async_trait]
impl RadioChannel for MockRadio {
    fn kind(&self) -> &str {
        "mock"
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        let mut state = self.lock();
        if state.fail_send {
            return Err(RadioError::Channel("mock send failure".to_string()));
        }
        state.sent.push(Bytes::copy_from_slice(data));

        if let Some(node) = state.node.clone() {
            if data == node.token.as_bytes() {
                debug!("Simulated node {} acknowledging handshake", node.device_id);
                state
                    .queue
                    .push_back(Scripted::Frame(Bytes::from(node.token.clone())));
                for _ in 0..node.frames_per_handshake {
                    state
                        .queue
                        .push_back(Scripted::Frame(Bytes::from(node.sample_frame())));
                }
            }
        }
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, RadioError> {
        let next = self.lock().queue.pop_front();
        match next {
            Some(Scripted::Frame(frame)) => Ok(frame),
            Some(Scripted::Error(e)) => Err(e),
            None => {
                tokio::time::sleep(timeout).await;
                Err(RadioError::Timeout(timeout))
            },
        }
    }

    async fn diagnostics(&self) -> HashMap<String, String> {
        let state = self.lock();
        let mut diag = HashMap::new();
        diag.insert("kind".to_string(), self.kind().to_string());
        diag.insert("queued".to_string(), state.queue.len().to_string());
        diag.insert("sent".to_string(), state.sent.len().to_string());
        if let Some(node) = &state.node {
            diag.insert("simulated_device".to_string(), node.device_id.clone());
        }
        diag
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::processing::parse;

    #[tokio::test]
    async fn test_scripted_queue_order() {
        let mut radio = MockRadio::new();
        radio.push_frame("first");
        radio.push_error(RadioError::Channel("gone".to_string()));

        let timeout = Duration::from_millis(5);
        assert_eq!(radio.receive(timeout).await.unwrap(), Bytes::from("first"));
        assert!(matches!(
            radio.receive(timeout).await,
            Err(RadioError::Channel(_))
        ));
        assert_eq!(
            radio.receive(timeout).await.unwrap_err(),
            RadioError::Timeout(timeout)
        );
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let handle = MockRadio::new();
        let mut radio = handle.clone();
        radio.send(b"Device5").await.unwrap();
        handle.push_frame("x");

        assert_eq!(handle.sent(), vec![Bytes::from("Device5")]);
        assert_eq!(radio.pending(), 1);
    }

    #[tokio::test]
    async fn test_send_failure() {
        let mut radio = MockRadio::new();
        radio.set_send_failure(true);
        assert!(radio.send(b"Device5").await.is_err());
        assert!(radio.sent().is_empty());
    }

    #[tokio::test]
    async fn test_simulated_node_answers_handshake() {
        let mut radio = MockRadio::simulated(SimulatedNode::new("Device5", "Device5"));

        radio.send(b"someone-else").await.unwrap();
        assert_eq!(radio.pending(), 0);

        radio.send(b"Device5").await.unwrap();
        let timeout = Duration::from_millis(5);
        assert_eq!(radio.receive(timeout).await.unwrap(), Bytes::from("Device5"));

        let frame = radio.receive(timeout).await.unwrap();
        let parsed = parse(std::str::from_utf8(&frame).unwrap()).unwrap();
        assert_eq!(parsed.device_id(), "Device5");
        assert_eq!(parsed.len(), 6);
    }
}
