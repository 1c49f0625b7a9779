//! Protocol module - ELM327 command set and response framing.

pub mod constants;
pub mod frame;
pub mod response;

pub use constants::*;
pub use frame::{FrameCursor, FrameError};
pub use response::{parse_monitor_status, parse_stored_dtcs};
