//! State machine for the scan session.

use std::fmt;

use crate::protocol::{DTC_COUNT_MASK, MIL_FLAG};

/// Where the session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No open port.
    #[default]
    Disconnected,
    /// Port open, nothing negotiated.
    Connected,
    /// Interpreter acknowledged automatic protocol search.
    ProtocolSet,
    /// Stored fault count read.
    FaultCountKnown,
    /// Fault memory read and decoded.
    FaultsDumped,
    /// A step failed; the session is finished.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "DISCONNECTED"),
            SessionState::Connected => write!(f, "CONNECTED"),
            SessionState::ProtocolSet => write!(f, "PROTOCOL_SET"),
            SessionState::FaultCountKnown => write!(f, "FAULT_COUNT_KNOWN"),
            SessionState::FaultsDumped => write!(f, "FAULTS_DUMPED"),
            SessionState::Failed => write!(f, "FAILED"),
        }
    }
}

impl SessionState {
    /// `FaultsDumped` and `Failed` end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::FaultsDumped | SessionState::Failed)
    }
}

/// Byte A of a service 01 PID 01 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStatus {
    /// Confirmed DTCs stored (bits 0-6).
    pub stored: u8,
    /// Malfunction indicator lamp on (bit 7).
    pub mil_on: bool,
}

impl FaultStatus {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            stored: byte & DTC_COUNT_MASK,
            mil_on: byte & MIL_FLAG != 0,
        }
    }
}

/// State machine context holding all runtime state.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub state: SessionState,
    /// Set once the PID 01 exchange succeeds.
    pub fault_status: Option<FaultStatus>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to a new state. Returns the previous one.
    pub fn goto_state(&mut self, new_state: SessionState) -> SessionState {
        tracing::info!(from = %self.state, to = %new_state, "State transition");
        std::mem::replace(&mut self.state, new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_status_lamp_off() {
        assert_eq!(
            FaultStatus::from_byte(0x03),
            FaultStatus {
                stored: 3,
                mil_on: false
            }
        );
    }

    #[test]
    fn test_fault_status_lamp_on() {
        assert_eq!(
            FaultStatus::from_byte(0x83),
            FaultStatus {
                stored: 3,
                mil_on: true
            }
        );
        assert_eq!(
            FaultStatus::from_byte(0x80),
            FaultStatus {
                stored: 0,
                mil_on: true
            }
        );
    }

    #[test]
    fn test_goto_state() {
        let mut ctx = SessionContext::new();
        assert_eq!(ctx.state, SessionState::Disconnected);
        let prev = ctx.goto_state(SessionState::Connected);
        assert_eq!(prev, SessionState::Disconnected);
        assert!(!ctx.state.is_terminal());
        ctx.goto_state(SessionState::Failed);
        assert!(ctx.state.is_terminal());
    }
}
