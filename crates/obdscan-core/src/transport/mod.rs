//! Transport layer module.

pub mod mock;
pub mod poll;
pub mod serial;
pub mod traits;

pub use mock::MockTransport;
pub use poll::{CancelToken, PollError, bounded_read_until, poll_until};
pub use serial::{Parity, SerialConfig, SerialTransport};
pub use traits::{ElmTransport, TransportError, clean_text};
