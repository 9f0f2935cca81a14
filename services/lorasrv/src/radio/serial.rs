//! LoRa UART modem adapter
//!
//! Drives an AT-command LoRa module (RYLR89x/99x family) over a serial port.
//! Outgoing payloads become `AT+SEND=<addr>,<len>,<data>`; incoming ones
//! arrive as `+RCV=<addr>,<len>,<data>,<rssi>,<snr>`. The length prefix is
//! authoritative, so payloads may contain commas.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::config::RadioConfig;
use crate::error::RadioError;
use crate::radio::traits::RadioChannel;

/// Largest payload the modem accepts in one `AT+SEND`
pub const MAX_PAYLOAD: usize = 240;

/// One decoded `+RCV` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcvFrame {
    pub address: u16,
    pub data: Bytes,
    pub rssi: i32,
    pub snr: i32,
}

/// Decode `+RCV=<addr>,<len>,<data>,<rssi>,<snr>`; `None` for anything else
pub fn parse_rcv(line: &[u8]) -> Option<RcvFrame> {
    fn number<T: std::str::FromStr>(raw: &[u8]) -> Option<T> {
        std::str::from_utf8(raw).ok()?.trim().parse().ok()
    }

    let rest = line.strip_prefix(b"+RCV=")?;

    let comma = rest.iter().position(|&b| b == b',')?;
    let address = number::<u16>(&rest[..comma])?;
    let rest = &rest[comma + 1..];

    let comma = rest.iter().position(|&b| b == b',')?;
    let len = number::<usize>(&rest[..comma])?;
    let rest = &rest[comma + 1..];

    if rest.len() < len {
        return None;
    }
    let data = Bytes::copy_from_slice(&rest[..len]);

    let tail = rest[len..].strip_prefix(b",")?;
    let comma = tail.iter().position(|&b| b == b',')?;
    let rssi = number::<i32>(&tail[..comma])?;
    let snr = number::<i32>(&tail[comma + 1..])?;

    Some(RcvFrame {
        address,
        data,
        rssi,
        snr,
    })
}

/// AT commands that apply `config` to the module, in order
pub fn setup_commands(config: &RadioConfig) -> Vec<String> {
    let band_hz = (config.frequency_mhz * 1_000_000.0).round() as u64;
    vec![
        format!("AT+ADDRESS={}", config.address),
        format!("AT+NETWORKID={}", config.network_id),
        format!("AT+BAND={}", band_hz),
        format!(
            "AT+PARAMETER={},{},{},{}",
            config.spreading_factor, config.bandwidth, config.coding_rate, config.preamble
        ),
        format!("AT+CRFOP={}", config.tx_power),
    ]
}

#[derive(Debug)]
pub struct SerialRadio {
    port: SerialStream,
    port_name: String,
    baud_rate: u32,
    remote_address: u16,
    command_timeout: Duration,
    read_buf: BytesMut,
    /// Frames that arrived while waiting for a command reply
    pending: VecDeque<RcvFrame>,
    last_rssi: Option<i32>,
    last_snr: Option<i32>,
}

impl SerialRadio {
    /// Open the port and push the radio settings to the module
    pub async fn open(config: &RadioConfig) -> Result<Self, RadioError> {
        debug!("Opening serial port: {}", config.port);

        #[allow(unused_mut)]
        let mut port = tokio_serial::new(&config.port, config.baud_rate)
            .open_native_async()
            .map_err(|e| {
                RadioError::Channel(format!("Failed to open serial port {}: {e}", config.port))
            })?;

        #[cfg(unix)]
        port.set_exclusive(false).map_err(|e| {
            RadioError::Channel(format!("Failed to set exclusive mode: {e}"))
        })?;

        let mut radio = Self {
            port,
            port_name: config.port.clone(),
            baud_rate: config.baud_rate,
            remote_address: config.remote_address,
            command_timeout: config.command_timeout,
            read_buf: BytesMut::with_capacity(512),
            pending: VecDeque::new(),
            last_rssi: None,
            last_snr: None,
        };

        for cmd in setup_commands(config) {
            radio.command(cmd.as_bytes()).await?;
        }

        info!(
            "LoRa modem ready on {} ({} MHz, SF{}, address {})",
            config.port, config.frequency_mhz, config.spreading_factor, config.address
        );
        Ok(radio)
    }

    /// Write one AT command and wait for `+OK`
    async fn command(&mut self, cmd: &[u8]) -> Result<(), RadioError> {
        let mut line = Vec::with_capacity(cmd.len() + 2);
        line.extend_from_slice(cmd);
        line.extend_from_slice(b"\r\n");

        let write = async {
            self.port.write_all(&line).await?;
            self.port.flush().await
        };
        match timeout(self.command_timeout, write).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => return Err(RadioError::Channel(format!("Serial write failed: {e}"))),
            Err(_) => {
                return Err(RadioError::Channel(format!(
                    "Serial write timed out after {:?}",
                    self.command_timeout
                )))
            },
        }

        let deadline = Instant::now() + self.command_timeout;
        while let Some(reply) = self.read_line(deadline).await? {
            if reply.starts_with(b"+OK") {
                return Ok(());
            }
            if reply.starts_with(b"+ERR") {
                return Err(RadioError::Channel(format!(
                    "Modem rejected {}: {}",
                    String::from_utf8_lossy(cmd),
                    String::from_utf8_lossy(&reply)
                )));
            }
            if let Some(frame) = parse_rcv(&reply) {
                self.pending.push_back(frame);
            }
        }

        Err(RadioError::Channel(format!(
            "No reply to {} within {:?}",
            String::from_utf8_lossy(cmd),
            self.command_timeout
        )))
    }

    /// Next CR/LF-terminated line, or `None` once `deadline` passes
    async fn read_line(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>, RadioError> {
        loop {
            if let Some(pos) = self.read_buf.iter().position(|&b| b == b'\n') {
                let raw = self.read_buf.split_to(pos + 1);
                let line = raw
                    .strip_suffix(b"\n")
                    .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
                    .unwrap_or(&raw[..]);
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line.to_vec()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match timeout(remaining, self.port.read_buf(&mut self.read_buf)).await {
                Ok(Ok(0)) => return Err(RadioError::Channel("Serial port closed".to_string())),
                Ok(Ok(_)) => {},
                Ok(Err(e)) => {
                    return Err(RadioError::Channel(format!("Serial read failed: {e}")))
                },
                Err(_) => return Ok(None),
            }
        }
    }

    fn accept(&mut self, frame: RcvFrame) -> Bytes {
        debug!(
            "+RCV from {} ({} bytes, rssi {}, snr {})",
            frame.address,
            frame.data.len(),
            frame.rssi,
            frame.snr
        );
        self.last_rssi = Some(frame.rssi);
        self.last_snr = Some(frame.snr);
        frame.data
    }
}

#[async_trait]
impl RadioChannel for SerialRadio {
    fn kind(&self) -> &str {
        "serial"
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        if data.len() > MAX_PAYLOAD {
            return Err(RadioError::Channel(format!(
                "Payload of {} bytes exceeds {} byte limit",
                data.len(),
                MAX_PAYLOAD
            )));
        }

        let mut cmd = format!("AT+SEND={},{},", self.remote_address, data.len()).into_bytes();
        cmd.extend_from_slice(data);
        self.command(&cmd).await
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, RadioError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(self.accept(frame));
        }

        let deadline = Instant::now() + timeout;
        while let Some(line) = self.read_line(deadline).await? {
            match parse_rcv(&line) {
                Some(frame) => return Ok(self.accept(frame)),
                None if line.starts_with(b"+ERR") => {
                    warn!("Modem error: {}", String::from_utf8_lossy(&line));
                },
                None => debug!("Ignoring modem output: {}", String::from_utf8_lossy(&line)),
            }
        }

        Err(RadioError::Timeout(timeout))
    }

    async fn diagnostics(&self) -> HashMap<String, String> {
        let mut diag = HashMap::new();
        diag.insert("kind".to_string(), self.kind().to_string());
        diag.insert("port".to_string(), self.port_name.clone());
        diag.insert("baud_rate".to_string(), self.baud_rate.to_string());
        diag.insert(
            "remote_address".to_string(),
            self.remote_address.to_string(),
        );
        if let Some(rssi) = self.last_rssi {
            diag.insert("rssi".to_string(), rssi.to_string());
        }
        if let Some(snr) = self.last_snr {
            diag.insert("snr".to_string(), snr.to_string());
        }
        diag
    }
}
