//! Radio link: channel trait, adapters and the handshake session

pub mod mock;
pub mod serial;
pub mod session;
pub mod traits;

pub use mock::{MockRadio, SimulatedNode};
pub use serial::SerialRadio;
pub use session::{HandshakeState, RadioSession};
pub use traits::{decode_latin1, RadioChannel};

use crate::config::{Config, RadioKind};
use crate::error::{LoraSrvError, Result};

/// Open the adapter selected by `config.radio.kind`
pub async fn open_channel(config: &Config) -> Result<Box<dyn RadioChannel>> {
    match config.radio.kind {
        RadioKind::Serial => {
            let radio = SerialRadio::open(&config.radio)
                .await
                .map_err(|e| LoraSrvError::RadioSetup(e.to_string()))?;
            Ok(Box::new(radio))
        },
        RadioKind::Simulated => {
            let node = SimulatedNode::new(&config.device.id, config.device.handshake_token());
            Ok(Box::new(MockRadio::simulated(node)))
        },
    }
}
