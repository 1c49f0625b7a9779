//! serialport-based transport implementation.

use std::io::{Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use tracing::{debug, info, instrument};

use super::traits::{ElmTransport, TransportError};
use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_DATA_BITS};

/// Blocking read timeout for the drain snapshot. Only bytes already
/// reported by `bytes_to_read` are requested, so this never elapses in
/// practice.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::None,
            data_bits: DEFAULT_DATA_BITS,
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" }
}

fn data_bits(bits: u8) -> Result<DataBits, TransportError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(TransportError::Unsupported(format!(
            "{other} data bits"
        ))),
    }
}

/// Serial link to an ELM327-compatible interpreter.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialTransport {
    /// Open the port described by `config`. No retry on failure.
    #[instrument(level = "info", fields(port = %config.port, baud = config.baud_rate))]
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .parity(config.parity.into())
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: config.port.clone(),
                message: e.to_string(),
            })?;

        info!(port = %config.port, "Serial port opened");
        Ok(Self {
            port: Some(port),
            name: config.port.clone(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Disconnected)
    }
}

impl ElmTransport for SerialTransport {
    fn discard_buffers(&mut self) -> Result<(), TransportError> {
        self.port()?
            .clear(ClearBuffer::All)
            .map_err(|e| TransportError::DiscardFailed(e.to_string()))
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        port.flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        debug!(bytes_written = data.len(), "Write complete");
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<u8>, TransportError> {
        let port = self.port()?;
        let available = port
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed(e.to_string()))? as usize;
        let mut buf = vec![0u8; available];
        if available > 0 {
            port.read_exact(&mut buf)
                .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
            debug!(bytes_read = available, "Read complete");
        }
        Ok(buf)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(port = %self.name, "Serial port closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_settings() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.data_bits, 8);
    }

    #[test]
    fn test_data_bits_mapping() {
        assert_eq!(data_bits(8).unwrap(), DataBits::Eight);
        assert!(matches!(data_bits(9), Err(TransportError::Unsupported(_))));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let cfg = SerialConfig {
            port: "/dev/obdscan-does-not-exist".into(),
            ..Default::default()
        };
        let err = SerialTransport::open(&cfg).err().unwrap();
        assert!(matches!(err, TransportError::OpenFailed { .. }));
    }
}
