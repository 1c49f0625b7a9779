//! Diagnostic Trouble Code decoding.
//!
//! A service 03 dump is a run of hex characters with no delimiter. Every
//! four characters form one code: the first character selects one of
//! sixteen categories (`P0`..`U3`), the remaining three are the code's
//! suffix and are copied verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::DTC_UNIT_LEN;

/// Leading hex symbol to category prefix. Order is the SAE J2012 bit layout:
/// bits 7-6 of the first byte pick the system, bits 5-4 the group.
pub const FAULT_CATEGORY_TABLE: [(char, &str); 16] = [
    ('0', "P0"),
    ('1', "P1"),
    ('2', "P2"),
    ('3', "P3"),
    ('4', "C0"),
    ('5', "C1"),
    ('6', "C2"),
    ('7', "C3"),
    ('8', "B0"),
    ('9', "B1"),
    ('A', "B2"),
    ('B', "B3"),
    ('C', "U0"),
    ('D', "U1"),
    ('E', "U2"),
    ('F', "U3"),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid category symbol {symbol:?} at offset {offset}")]
    InvalidCode { symbol: char, offset: usize },

    #[error("dump ends with incomplete code {fragment:?} after {} decoded", .decoded.len())]
    TrailingFragment {
        decoded: Vec<DiagnosticTroubleCode>,
        fragment: String,
    },
}

/// Vehicle system a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSystem {
    Powertrain,
    Chassis,
    Body,
    Network,
}

impl FaultSystem {
    pub fn letter(self) -> char {
        match self {
            FaultSystem::Powertrain => 'P',
            FaultSystem::Chassis => 'C',
            FaultSystem::Body => 'B',
            FaultSystem::Network => 'U',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'P' => Some(FaultSystem::Powertrain),
            'C' => Some(FaultSystem::Chassis),
            'B' => Some(FaultSystem::Body),
            'U' => Some(FaultSystem::Network),
            _ => None,
        }
    }
}

impl fmt::Display for FaultSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultSystem::Powertrain => write!(f, "Powertrain"),
            FaultSystem::Chassis => write!(f, "Chassis"),
            FaultSystem::Body => write!(f, "Body"),
            FaultSystem::Network => write!(f, "Network"),
        }
    }
}

/// One of the sixteen category prefixes; an index into
/// `FAULT_CATEGORY_TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultCategory(u8);

impl FaultCategory {
    pub fn prefix(self) -> &'static str {
        FAULT_CATEGORY_TABLE[self.0 as usize].1
    }

    pub fn system(self) -> FaultSystem {
        match self.0 / 4 {
            0 => FaultSystem::Powertrain,
            1 => FaultSystem::Chassis,
            2 => FaultSystem::Body,
            _ => FaultSystem::Network,
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Category for the leading symbol of a code unit.
///
/// Lower-case hex is accepted. Anything outside `0-9A-F` is an error.
pub fn category_of(symbol: char) -> Result<FaultCategory, DecodeError> {
    let upper = symbol.to_ascii_uppercase();
    FAULT_CATEGORY_TABLE
        .iter()
        .position(|&(s, _)| s == upper)
        .map(|idx| FaultCategory(idx as u8))
        .ok_or(DecodeError::InvalidCode { symbol, offset: 0 })
}

/// A decoded code such as `P0105`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticTroubleCode {
    category: FaultCategory,
    suffix: String,
}

impl DiagnosticTroubleCode {
    pub fn category(&self) -> FaultCategory {
        self.category
    }

    pub fn system(&self) -> FaultSystem {
        self.category.system()
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Five-character form used for lookup and display.
    pub fn code(&self) -> String {
        self.to_string()
    }

    /// `0000` filler the interpreter appends to short frames.
    pub fn is_padding(&self) -> bool {
        self.category.0 == 0 && self.suffix == "000"
    }
}

impl fmt::Display for DiagnosticTroubleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.prefix(), self.suffix)
    }
}

/// Decode a whitespace-free dump into codes, in dump order.
///
/// Every complete unit must decode; the first bad category symbol aborts
/// the whole dump. Characters left over after the last complete unit are
/// reported as `TrailingFragment` together with what was decoded.
pub fn decode_all(dump: &str) -> Result<Vec<DiagnosticTroubleCode>, DecodeError> {
    let chars: Vec<char> = dump.chars().collect();
    let mut codes = Vec::with_capacity(chars.len() / DTC_UNIT_LEN);

    for (i, unit) in chars.chunks(DTC_UNIT_LEN).enumerate() {
        let offset = i * DTC_UNIT_LEN;
        if unit.len() < DTC_UNIT_LEN {
            return Err(DecodeError::TrailingFragment {
                decoded: codes,
                fragment: unit.iter().collect(),
            });
        }
        let category = category_of(unit[0]).map_err(|_| DecodeError::InvalidCode {
            symbol: unit[0],
            offset,
        })?;
        codes.push(DiagnosticTroubleCode {
            category,
            suffix: unit[1..].iter().collect(),
        });
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn codes(dump: &str) -> Vec<String> {
        decode_all(dump).unwrap().iter().map(|c| c.code()).collect()
    }

    #[test]
    fn test_category_table_is_total_and_injective() {
        let symbols: HashSet<char> = FAULT_CATEGORY_TABLE.iter().map(|&(s, _)| s).collect();
        let prefixes: HashSet<&str> = FAULT_CATEGORY_TABLE.iter().map(|&(_, p)| p).collect();
        assert_eq!(symbols.len(), 16);
        assert_eq!(prefixes.len(), 16);

        for symbol in "0123456789ABCDEF".chars() {
            let cat = category_of(symbol).unwrap();
            assert_eq!(cat.prefix().len(), 2);
        }
    }

    #[test]
    fn test_category_systems() {
        assert_eq!(category_of('3').unwrap().system(), FaultSystem::Powertrain);
        assert_eq!(category_of('4').unwrap().prefix(), "C0");
        assert_eq!(category_of('A').unwrap().system(), FaultSystem::Body);
        assert_eq!(category_of('F').unwrap().prefix(), "U3");
        assert_eq!(category_of('c').unwrap().prefix(), "U0");
    }

    #[test]
    fn test_category_rejects_non_hex() {
        assert!(matches!(
            category_of('G'),
            Err(DecodeError::InvalidCode { symbol: 'G', .. })
        ));
        assert!(category_of(' ').is_err());
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_all("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_two_codes_in_order() {
        assert_eq!(codes("01050203"), vec!["P0105", "P0203"]);
    }

    #[test]
    fn test_decode_every_system() {
        assert_eq!(
            codes("4035C1009234E7AB"),
            vec!["C0035", "U0100", "B1234", "U27AB"]
        );
    }

    #[test]
    fn test_trailing_fragment_is_rejected_with_decoded_prefix() {
        let err = decode_all("0105020").unwrap_err();
        match err {
            DecodeError::TrailingFragment { decoded, fragment } => {
                assert_eq!(fragment, "020");
                assert_eq!(decoded.len(), 1);
                assert_eq!(decoded[0].code(), "P0105");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_symbol_aborts_whole_dump() {
        let err = decode_all("0105X203").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCode {
                symbol: 'X',
                offset: 4
            }
        );
    }

    #[test]
    fn test_suffix_is_verbatim() {
        let code = &decode_all("1a2b").unwrap()[0];
        assert_eq!(code.code(), "P1a2b");
        assert_eq!(code.suffix(), "a2b");
    }

    #[test]
    fn test_padding_detection() {
        let decoded = decode_all("01050000").unwrap();
        assert!(!decoded[0].is_padding());
        assert!(decoded[1].is_padding());
    }
}
