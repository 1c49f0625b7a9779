//! Commands, markers and device conventions of the protocol interpreter.

use std::time::Duration;

// Line discipline
pub const COMMAND_TERMINATOR: u8 = b'\r'; // 0x0D
pub const PROMPT: u8 = b'>'; // 0x3E

// Commands
pub const CMD_AUTO_PROTOCOL: &str = "ATSP0";
pub const CMD_MONITOR_STATUS: &str = "0101"; // service 01, PID 01
pub const CMD_READ_STORED_DTCS: &str = "03";
pub const CMD_CLEAR_DTCS: &str = "04";

// Positive responses
pub const ACK_OK: &str = "OK";
pub const RESP_MONITOR_STATUS: &str = "41 01";
pub const RESP_STORED_DTCS: &str = "43";
pub const RESP_CLEAR_DTCS: &str = "44";

/// Bit 7 of PID 01 byte A: malfunction indicator lamp.
pub const MIL_FLAG: u8 = 0x80;
/// Bits 0-6 of PID 01 byte A: number of stored DTCs.
pub const DTC_COUNT_MASK: u8 = 0x7F;

/// Characters per encoded DTC in a service 03 dump.
pub const DTC_UNIT_LEN: usize = 4;

// Echo offsets observed with echo on (ATE1) and automatic protocol search.
// "0101" + "SEARCHING..." precedes the PID 01 payload.
pub const MONITOR_STATUS_ECHO_LEN: usize = 16;
pub const STORED_DTCS_ECHO_LEN: usize = 2;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_DATA_BITS: u8 = 8;

pub const PROTOCOL_SETTLE: Duration = Duration::from_millis(500);
pub const RESPONSE_SETTLE: Duration = Duration::from_millis(5000);
pub const POLL_UNIT: Duration = Duration::from_millis(1);
pub const ERASE_CONFIRM_UNITS: u32 = 5000;

/// Response expected to `ATSP0` with echo enabled.
pub fn protocol_ack() -> String {
    format!("{CMD_AUTO_PROTOCOL}{ACK_OK}")
}

/// Response expected to `04` with echo enabled.
pub fn clear_ack() -> String {
    format!("{CMD_CLEAR_DTCS}{RESP_CLEAR_DTCS}")
}
