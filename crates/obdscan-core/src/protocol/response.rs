//! Parsers for the three responses the scan depends on.

use super::constants::{RESP_MONITOR_STATUS, RESP_STORED_DTCS};
use super::frame::{FrameCursor, FrameError};

/// Byte A of a PID 01 response, after `echo_len` characters of echo.
///
/// Byte A sits exactly one space after the `41 01` marker.
///
/// `"0101SEARCHING...41 01 83 07 65 04"` with `echo_len = 16` gives `0x83`.
pub fn parse_monitor_status(response: &str, echo_len: usize) -> Result<u8, FrameError> {
    let mut cur = FrameCursor::new(response);
    cur.skip(echo_len)?;
    cur.expect(RESP_MONITOR_STATUS)?;
    cur.expect(" ")?;
    let offset = cur.offset();
    let hex = cur.take(2)?;
    u8::from_str_radix(hex, 16).map_err(|_| FrameError::Mismatch {
        offset,
        expected: "hex byte".into(),
        found: hex.to_string(),
    })
}

/// Whitespace-free DTC dump of a service 03 response.
///
/// `"0343 01 05 02 03"` with `echo_len = 2` gives `"01050203"`.
pub fn parse_stored_dtcs(response: &str, echo_len: usize) -> Result<String, FrameError> {
    let mut cur = FrameCursor::new(response);
    cur.skip(echo_len)?;
    cur.expect(RESP_STORED_DTCS)?;
    Ok(cur.rest().chars().filter(|c| !c.is_whitespace()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_status() {
        assert_eq!(
            parse_monitor_status("0101SEARCHING...41 01 83 07 65 04 ", 16).unwrap(),
            0x83
        );
        assert_eq!(
            parse_monitor_status("0101SEARCHING...41 01 03 07 65 04", 16).unwrap(),
            0x03
        );
    }

    #[test]
    fn test_monitor_status_without_search_banner() {
        assert_eq!(parse_monitor_status("010141 01 80 07 65 04", 4).unwrap(), 0x80);
    }

    #[test]
    fn test_monitor_status_wrong_marker() {
        let err = parse_monitor_status("0101SEARCHING...UNABLE TO CONNECT", 16).unwrap_err();
        assert!(matches!(err, FrameError::Mismatch { offset: 16, .. }));
    }

    #[test]
    fn test_monitor_status_bad_hex() {
        let err = parse_monitor_status("0101SEARCHING...41 01 ZZ", 16).unwrap_err();
        assert!(matches!(err, FrameError::Mismatch { offset: 22, .. }));
    }

    #[test]
    fn test_monitor_status_needs_single_separator() {
        let err = parse_monitor_status("010141 0183 07", 4).unwrap_err();
        assert_eq!(
            err,
            FrameError::Mismatch {
                offset: 9,
                expected: " ".into(),
                found: "8".into(),
            }
        );

        let err = parse_monitor_status("010141 01  83 07", 4).unwrap_err();
        assert!(matches!(err, FrameError::Mismatch { offset: 10, .. }));
    }

    #[test]
    fn test_monitor_status_truncated() {
        assert!(matches!(
            parse_monitor_status("0101SEARCHING...41 01 8", 16),
            Err(FrameError::Truncated { offset: 22, needed: 1 })
        ));
        assert!(matches!(
            parse_monitor_status("", 16),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn test_stored_dtcs() {
        assert_eq!(parse_stored_dtcs("0343 01 05 02 03 ", 2).unwrap(), "01050203");
        assert_eq!(parse_stored_dtcs("0343", 2).unwrap(), "");
    }

    #[test]
    fn test_stored_dtcs_negative_response() {
        let err = parse_stored_dtcs("037F 03 11", 2).unwrap_err();
        assert!(matches!(err, FrameError::Mismatch { offset: 2, .. }));
    }
}
