//! OBDScan-Core: reading stored trouble codes through an ELM327 interpreter.
//!
//! This crate drives an ELM327-compatible OBD-II interface over a serial
//! line: it negotiates the bus protocol, reads the stored fault count and
//! lamp status, dumps fault memory and decodes it into SAE codes.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Command strings, acknowledgements, response framing
//! - **Transport**: Serial communication abstraction (serialport, mock)
//! - **Clock**: Injectable time source for settle waits and polling
//! - **State**: Session states and fault status
//! - **DTC**: Fault code decoding
//! - **Lookup**: Code descriptions (static table, TOML database)
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use obdscan_core::lookup::{StaticDtcTable, resolve_all};
//! use obdscan_core::session::{ScanOutcome, ScanSession, SessionConfig};
//!
//! let mut config = SessionConfig::default();
//! config.serial.port = "/dev/ttyUSB0".to_string();
//!
//! let mut session = ScanSession::connect(config).expect("open failed");
//! if let ScanOutcome::Faults { codes, .. } = session.run().expect("scan failed") {
//!     for report in resolve_all(&StaticDtcTable, &codes) {
//!         println!("{report}");
//!     }
//! }
//! ```

pub mod clock;
pub mod dtc;
pub mod error;
pub mod events;
pub mod lookup;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use dtc::{DecodeError, DiagnosticTroubleCode, FaultCategory, FaultSystem, decode_all};
pub use error::{ScanError, ScanResult};
pub use events::{ScanEvent, ScanObserver, TracingObserver};
pub use lookup::{
    DescriptionLookup, DtcReport, LayeredLookup, StaticDtcTable, TomlDtcDatabase, resolve_all,
};
pub use session::{ScanOutcome, ScanSession, SessionConfig};
pub use state::{FaultStatus, SessionState};
pub use transport::{ElmTransport, MockTransport, SerialConfig, SerialTransport, TransportError};
