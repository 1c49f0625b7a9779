//! Event system for UI decoupling.
//!
//! Allows CLI/GUI front ends to follow a scan without tight coupling to the
//! session logic.

use std::fmt;

use crate::state::SessionState;

/// Events emitted by a scan session.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Serial port opened.
    Connected { port: String },
    /// Session state changed.
    StateChanged { from: SessionState, to: SessionState },
    /// Command written to the interpreter.
    CommandSent { command: String },
    /// Cleaned response read back for a command.
    ResponseReceived { command: String, response: String },
    /// Raw traffic on the serial line.
    Bytes {
        direction: Direction,
        length: usize,
        data: Vec<u8>,
    },
    /// Result of the PID 01 exchange.
    FaultStatus { stored: u8, mil_on: bool },
    /// One code decoded from the dump.
    CodeDecoded { code: String },
    /// Error that ended the scan.
    Error { message: String },
    /// Scan finished.
    Complete,
}

/// Serial traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx, // Host -> Interpreter
    Rx, // Interpreter -> Host
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => write!(f, "TX"),
            Direction::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving scan events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_event(&self, _event: &ScanEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn on_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::Connected { port } => {
                tracing::info!(port = %port, "Connected");
            }
            ScanEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "State changed");
            }
            ScanEvent::CommandSent { command } => {
                tracing::debug!(command = %command, "Command sent");
            }
            ScanEvent::ResponseReceived { command, response } => {
                tracing::debug!(command = %command, response = ?response, "Response received");
            }
            ScanEvent::Bytes {
                direction, length, ..
            } => {
                tracing::trace!(dir = %direction, len = length, "Serial traffic");
            }
            ScanEvent::FaultStatus { stored, mil_on } => {
                tracing::info!(stored = stored, mil_on = mil_on, "Fault status");
            }
            ScanEvent::CodeDecoded { code } => {
                tracing::debug!(code = %code, "Code decoded");
            }
            ScanEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
            ScanEvent::Complete => {
                tracing::info!("Scan complete");
            }
        }
    }
}

/// Observer that keeps every event, for tests and replay.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ScanEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl ScanObserver for RecordingObserver {
    fn on_event(&self, event: &ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
