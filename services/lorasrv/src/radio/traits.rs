//! Radio channel capability
//!
//! A channel moves opaque payloads to and from the remote node. Modulation,
//! addressing and framing on the air are the adapter's business.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::RadioError;

#[async_trait]
pub trait RadioChannel: Send + Sync + fmt::Debug {
    /// Adapter type identifier
    fn kind(&self) -> &str;

    /// Transmit one payload
    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Wait up to `timeout` for one payload
    ///
    /// `RadioError::Timeout` when nothing arrives, `RadioError::Channel` when
    /// the transport itself failed.
    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, RadioError>;

    /// Adapter-specific status (signal quality, settings)
    async fn diagnostics(&self) -> HashMap<String, String> {
        let mut diag = HashMap::new();
        diag.insert("kind".to_string(), self.kind().to_string());
        diag
    }
}

#[async_trait]
impl<T: RadioChannel + ?Sized> RadioChannel for Box<T> {
    fn kind(&self) -> &str {
        (**self).kind()
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        (**self).send(data).await
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, RadioError> {
        (**self).receive(timeout).await
    }

    async fn diagnostics(&self) -> HashMap<String, String> {
        (**self).diagnostics().await
    }
}

/// Decode a payload as Latin-1; every byte maps to exactly one char
pub fn decode_latin1(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}
