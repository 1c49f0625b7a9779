//! State machine module.

pub mod machine;

pub use machine::{FaultStatus, SessionContext, SessionState};
