//! Scan Session - High-level orchestrator for the diagnostic handshake.
//!
//! A session owns one transport and walks it through
//! `Connected -> ProtocolSet -> FaultCountKnown -> FaultsDumped`. Each step
//! is a single command/response exchange: discard and write, wait the
//! settle interval, drain, validate the frame.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::dtc::{DiagnosticTroubleCode, decode_all};
use crate::error::{ScanError, ScanResult};
use crate::events::{Direction, ScanEvent, ScanObserver, TracingObserver};
use crate::protocol::*;
use crate::state::{FaultStatus, SessionContext, SessionState};
use crate::transport::{
    ElmTransport, SerialConfig, SerialTransport, TransportError, bounded_read_until,
};

/// Configuration for a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub serial: SerialConfig,
    /// Wait after `ATSP0` before reading, in milliseconds.
    pub protocol_settle_ms: u64,
    /// Wait after `0101` and `03` before reading, in milliseconds.
    pub response_settle_ms: u64,
    /// Echo characters ahead of `41 01`.
    pub monitor_status_echo_len: usize,
    /// Echo characters ahead of `43`.
    pub stored_dtcs_echo_len: usize,
    /// Length of one bounded-poll unit, in milliseconds.
    pub poll_unit_ms: u64,
    /// Poll units to wait for the `04` acknowledgement.
    pub erase_confirm_units: u32,
    /// Drop `0000` filler units from the decoded dump.
    pub drop_padding: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            protocol_settle_ms: PROTOCOL_SETTLE.as_millis() as u64,
            response_settle_ms: RESPONSE_SETTLE.as_millis() as u64,
            monitor_status_echo_len: MONITOR_STATUS_ECHO_LEN,
            stored_dtcs_echo_len: STORED_DTCS_ECHO_LEN,
            poll_unit_ms: POLL_UNIT.as_millis() as u64,
            erase_confirm_units: ERASE_CONFIRM_UNITS,
            drop_padding: true,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn protocol_settle(&self) -> Duration {
        Duration::from_millis(self.protocol_settle_ms)
    }

    fn response_settle(&self) -> Duration {
        Duration::from_millis(self.response_settle_ms)
    }

    fn poll_unit(&self) -> Duration {
        Duration::from_millis(self.poll_unit_ms)
    }
}

/// How a completed scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The vehicle reports no stored codes; fault memory was not read.
    NoFaults { status: FaultStatus },
    /// Codes read from fault memory, in the order the vehicle reported them.
    Faults {
        status: FaultStatus,
        codes: Vec<DiagnosticTroubleCode>,
    },
}

/// Scan Session - owns the link to one protocol interpreter.
pub struct ScanSession<T: ElmTransport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    config: SessionConfig,
    observer: Arc<dyn ScanObserver>,
    ctx: SessionContext,
}

impl ScanSession<SerialTransport, SystemClock> {
    /// Open the configured serial port with the default tracing observer.
    pub fn connect(config: SessionConfig) -> ScanResult<Self> {
        Self::connect_with_observer(config, Arc::new(TracingObserver))
    }

    /// Open the configured serial port. Fails with `Connection`, no retry.
    pub fn connect_with_observer(
        config: SessionConfig,
        observer: Arc<dyn ScanObserver>,
    ) -> ScanResult<Self> {
        let transport =
            SerialTransport::open(&config.serial).map_err(|source| ScanError::Connection {
                port: config.serial.port.clone(),
                source,
            })?;
        Ok(Self::with_transport(transport, SystemClock, config, observer))
    }
}

impl<T: ElmTransport, C: Clock> ScanSession<T, C> {
    /// Build a session over an already open transport.
    pub fn with_transport(
        transport: T,
        clock: C,
        config: SessionConfig,
        observer: Arc<dyn ScanObserver>,
    ) -> Self {
        let mut session = Self {
            transport,
            clock,
            config,
            observer,
            ctx: SessionContext::new(),
        };
        session.emit(ScanEvent::Connected {
            port: session.config.serial.port.clone(),
        });
        session.transition(SessionState::Connected);
        session
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state
    }

    pub fn fault_status(&self) -> Option<FaultStatus> {
        self.ctx.fault_status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn emit(&self, event: ScanEvent) {
        self.observer.on_event(&event);
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.ctx.goto_state(to);
        if from != to {
            self.emit(ScanEvent::StateChanged { from, to });
        }
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> ScanResult<()> {
        if allowed.contains(&self.ctx.state) {
            Ok(())
        } else {
            Err(ScanError::InvalidState {
                operation,
                state: self.ctx.state,
            })
        }
    }

    /// Write `command`, wait `settle`, read back the cleaned response.
    fn exchange(&mut self, command: &'static str, settle: Duration) -> ScanResult<String> {
        let mut link = ObservableTransport {
            inner: &mut self.transport,
            observer: &self.observer,
        };
        link.write_command(command)?;
        self.emit(ScanEvent::CommandSent {
            command: command.to_string(),
        });

        self.clock.sleep(settle);

        let mut link = ObservableTransport {
            inner: &mut self.transport,
            observer: &self.observer,
        };
        let response = link.read_string()?;
        self.emit(ScanEvent::ResponseReceived {
            command: command.to_string(),
            response: response.clone(),
        });
        Ok(response)
    }

    /// Request automatic protocol detection (`ATSP0`).
    ///
    /// Advances to `ProtocolSet` only on the exact echo-plus-`OK` reply. Any
    /// other reply is a `ProtocolNegotiation` error and the state is kept.
    #[instrument(skip(self))]
    pub fn set_protocol(&mut self) -> ScanResult<()> {
        self.require("set_protocol", &[SessionState::Connected])?;
        info!("Scanning for protocol...");

        let response = self.exchange(CMD_AUTO_PROTOCOL, self.config.protocol_settle())?;
        if response != protocol_ack() {
            warn!(response = ?response, "Protocol not acknowledged");
            return Err(ScanError::ProtocolNegotiation { response });
        }

        self.transition(SessionState::ProtocolSet);
        Ok(())
    }

    /// Read the stored fault count and lamp status (`0101`).
    #[instrument(skip(self))]
    pub fn count_stored_faults(&mut self) -> ScanResult<FaultStatus> {
        self.require("count_stored_faults", &[SessionState::ProtocolSet])?;
        info!("Reading fault memory status...");

        let response = self.exchange(CMD_MONITOR_STATUS, self.config.response_settle())?;
        let byte = parse_monitor_status(&response, self.config.monitor_status_echo_len)
            .map_err(|source| ScanError::UnexpectedResponse {
                command: CMD_MONITOR_STATUS,
                response: response.clone(),
                source,
            })?;

        let status = FaultStatus::from_byte(byte);
        debug!(raw = %format!("0x{byte:02X}"), "Monitor status byte");
        self.emit(ScanEvent::FaultStatus {
            stored: status.stored,
            mil_on: status.mil_on,
        });

        self.ctx.fault_status = Some(status);
        self.transition(SessionState::FaultCountKnown);
        Ok(status)
    }

    /// Read and decode stored codes (`03`).
    ///
    /// Only talks to the device when the known count is non-zero. Any
    /// framing or decode failure aborts the read; nothing partial is
    /// returned.
    #[instrument(skip(self))]
    pub fn read_fault_memory(&mut self) -> ScanResult<Vec<DiagnosticTroubleCode>> {
        self.require("read_fault_memory", &[SessionState::FaultCountKnown])?;
        let expected = self.ctx.fault_status.map(|s| s.stored).unwrap_or(0);
        if expected == 0 {
            self.transition(SessionState::FaultsDumped);
            return Ok(Vec::new());
        }
        info!(expected, "Reading stored codes...");

        let response = self.exchange(CMD_READ_STORED_DTCS, self.config.response_settle())?;
        let dump = parse_stored_dtcs(&response, self.config.stored_dtcs_echo_len).map_err(
            |source| ScanError::UnexpectedResponse {
                command: CMD_READ_STORED_DTCS,
                response: response.clone(),
                source,
            },
        )?;
        debug!(dump = %dump, "Fault code dump");

        let mut codes = decode_all(&dump)?;
        if self.config.drop_padding {
            let before = codes.len();
            codes.retain(|c| !c.is_padding());
            if codes.len() != before {
                debug!(dropped = before - codes.len(), "Dropped padding units");
            }
        }
        if codes.len() != expected as usize {
            warn!(
                expected,
                decoded = codes.len(),
                "Decoded count differs from reported count"
            );
        }
        for code in &codes {
            self.emit(ScanEvent::CodeDecoded {
                code: code.code(),
            });
        }

        self.transition(SessionState::FaultsDumped);
        Ok(codes)
    }

    /// Clear stored codes and the lamp (`04`).
    ///
    /// Never part of `run`. Waits for the `44` acknowledgement with a
    /// bounded poll.
    #[instrument(skip(self))]
    pub fn erase_codes(&mut self) -> ScanResult<()> {
        self.require(
            "erase_codes",
            &[SessionState::ProtocolSet, SessionState::FaultCountKnown],
        )?;
        info!("Erasing stored codes...");

        let mut link = ObservableTransport {
            inner: &mut self.transport,
            observer: &self.observer,
        };
        link.write_command(CMD_CLEAR_DTCS)?;
        self.emit(ScanEvent::CommandSent {
            command: CMD_CLEAR_DTCS.to_string(),
        });

        self.read_until(&clear_ack(), self.config.erase_confirm_units)?;
        self.ctx.fault_status = None;
        self.transition(SessionState::ProtocolSet);
        Ok(())
    }

    /// Poll until the device's response equals `expected`.
    ///
    /// Reads once per configured poll unit on a worker thread and fails with
    /// `Timeout` after `timeout_units` units, or with `DeadlineExceeded` if
    /// the worker stalls first.
    pub fn read_until(&mut self, expected: &str, timeout_units: u32) -> ScanResult<u32> {
        let unit = self.config.poll_unit();
        let mut link = ObservableTransport {
            inner: &mut self.transport,
            observer: &self.observer,
        };
        Ok(bounded_read_until(
            &mut link,
            &self.clock,
            expected,
            timeout_units,
            unit,
        )?)
    }

    /// Run the complete scan.
    ///
    /// Every failure moves the session to `Failed`. The port is released
    /// on every outcome.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> ScanResult<ScanOutcome> {
        let result = self.run_steps();
        match &result {
            Ok(_) => self.emit(ScanEvent::Complete),
            Err(e) => {
                self.emit(ScanEvent::Error {
                    message: e.to_string(),
                });
                self.transition(SessionState::Failed);
            }
        }
        self.close();
        result
    }

    fn run_steps(&mut self) -> ScanResult<ScanOutcome> {
        self.set_protocol()?;
        let status = self.count_stored_faults()?;
        if status.stored == 0 {
            info!(mil_on = status.mil_on, "No faults found");
            return Ok(ScanOutcome::NoFaults { status });
        }
        let codes = self.read_fault_memory()?;
        Ok(ScanOutcome::Faults { status, codes })
    }

    /// Release the port. Terminal states are kept so callers can still
    /// inspect how the session ended.
    pub fn close(&mut self) {
        self.transport.close();
        if !self.ctx.state.is_terminal() {
            self.transition(SessionState::Disconnected);
        }
    }
}

/// Transport wrapper that emits traffic events.
struct ObservableTransport<'a, T: ElmTransport> {
    inner: &'a mut T,
    observer: &'a Arc<dyn ScanObserver>,
}

impl<T: ElmTransport> ElmTransport for ObservableTransport<'_, T> {
    fn discard_buffers(&mut self) -> Result<(), TransportError> {
        self.inner.discard_buffers()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let res = self.inner.send(data);
        if res.is_ok() {
            self.observer.on_event(&ScanEvent::Bytes {
                direction: Direction::Tx,
                length: data.len(),
                data: data.to_vec(),
            });
        }
        res
    }

    fn drain(&mut self) -> Result<Vec<u8>, TransportError> {
        let res = self.inner.drain();
        if let Ok(data) = &res {
            if !data.is_empty() {
                self.observer.on_event(&ScanEvent::Bytes {
                    direction: Direction::Rx,
                    length: data.len(),
                    data: data.clone(),
                });
            }
        }
        res
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
