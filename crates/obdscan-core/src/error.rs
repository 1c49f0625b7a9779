//! Scan error taxonomy.

use thiserror::Error;

use crate::dtc::DecodeError;
use crate::protocol::FrameError;
use crate::state::SessionState;
use crate::transport::{PollError, TransportError};

#[derive(Error, Debug)]
pub enum ScanError {
    /// The serial port could not be opened.
    #[error("failed to establish connection on {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: TransportError,
    },

    /// `ATSP0` was not acknowledged.
    #[error("protocol negotiation failed, device answered {response:?}")]
    ProtocolNegotiation { response: String },

    /// A count or dump response failed framing validation.
    #[error("unexpected response to {command}: {source}")]
    UnexpectedResponse {
        command: &'static str,
        response: String,
        #[source]
        source: FrameError,
    },

    #[error("timed out after {units} poll units")]
    Timeout { units: u32 },

    #[error("poll cancelled after {units} poll units")]
    Cancelled { units: u32 },

    /// The poll worker stalled before its unit budget ran out.
    #[error("poll deadline exceeded after {polled} completed poll units")]
    DeadlineExceeded { polled: u32 },

    #[error("fault memory decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl From<PollError> for ScanError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::Timeout { units } => ScanError::Timeout { units },
            PollError::Cancelled { units } => ScanError::Cancelled { units },
            PollError::DeadlineExceeded { polled } => ScanError::DeadlineExceeded { polled },
            PollError::Transport(t) => ScanError::Transport(t),
        }
    }
}

/// Convenience alias for scan results.
pub type ScanResult<T> = Result<T, ScanError>;
