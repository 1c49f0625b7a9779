//! Serial transport abstraction.
//!
//! Defines the `ElmTransport` trait for the half-duplex link to the
//! protocol interpreter, allowing different implementations (serialport,
//! mock, etc.).

use thiserror::Error;

use crate::protocol::{COMMAND_TERMINATOR, PROMPT};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Unsupported serial setting: {0}")]
    Unsupported(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Failed to discard buffers: {0}")]
    DiscardFailed(String),

    #[error("Port closed")]
    Disconnected,
}

/// Abstract link to the protocol interpreter.
///
/// Implementors supply the three raw primitives; the framing rules (discard
/// on write, carriage-return terminator, prompt stripping) live in the
/// provided methods so every backend frames identically.
pub trait ElmTransport: Send {
    /// Drop everything buffered in both directions.
    fn discard_buffers(&mut self) -> Result<(), TransportError>;

    /// Write raw bytes to the device.
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Return whatever is buffered right now. Never waits for more.
    fn drain(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Release the underlying port.
    fn close(&mut self) {}

    /// Discard pending I/O, then send `command` followed by `\r`.
    ///
    /// Discarding first means a late answer to an earlier command can never
    /// be read as the answer to this one.
    fn write_command(&mut self, command: &str) -> Result<(), TransportError> {
        self.discard_buffers()?;
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(COMMAND_TERMINATOR);
        self.send(&line)
    }

    /// Drain and decode as text with `>` and `\r` removed.
    fn read_string(&mut self) -> Result<String, TransportError> {
        let raw = self.drain()?;
        Ok(clean_text(&String::from_utf8_lossy(&raw)))
    }

    /// Drain with `0x0D` and `0x3E` bytes removed.
    fn read_bytes(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut raw = self.drain()?;
        raw.retain(|&b| b != COMMAND_TERMINATOR && b != PROMPT);
        Ok(raw)
    }
}

impl<T: ElmTransport + ?Sized> ElmTransport for Box<T> {
    fn discard_buffers(&mut self) -> Result<(), TransportError> {
        (**self).discard_buffers()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn drain(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).drain()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Strip the prompt and carriage returns from a response.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|&c| c != PROMPT as char && c != COMMAND_TERMINATOR as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("ATSP0\rOK\r\r>"), "ATSP0OK");
        assert_eq!(clean_text(">"), "");
        assert_eq!(clean_text("41 01 83\r"), "41 01 83");
    }
}
