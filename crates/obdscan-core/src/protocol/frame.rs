//! Response frame parsing.
//!
//! The device echoes the request ahead of the payload, so every response is
//! consumed left to right: skip the echo, check the positive response
//! marker, then take the data. A `FrameCursor` never panics on short or
//! non-ASCII input; it reports the position at which framing broke.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("response truncated at offset {offset}: needed {needed} more chars")]
    Truncated { offset: usize, needed: usize },

    #[error("expected {expected:?} at offset {offset}, found {found:?}")]
    Mismatch {
        offset: usize,
        expected: String,
        found: String,
    },
}

/// Forward-only reader over a cleaned response string.
#[derive(Clone)]
pub struct FrameCursor<'a> {
    rest: &'a str,
    offset: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(response: &'a str) -> Self {
        Self {
            rest: response,
            offset: 0,
        }
    }

    /// Drop `n` characters of echo or framing.
    pub fn skip(&mut self, n: usize) -> Result<(), FrameError> {
        self.take(n).map(|_| ())
    }

    /// Consume `literal` or fail without advancing.
    pub fn expect(&mut self, literal: &str) -> Result<(), FrameError> {
        match self.rest.strip_prefix(literal) {
            Some(rest) => {
                self.rest = rest;
                self.offset += literal.len();
                Ok(())
            }
            None => Err(FrameError::Mismatch {
                offset: self.offset,
                expected: literal.to_string(),
                found: self.rest.chars().take(literal.chars().count()).collect(),
            }),
        }
    }

    /// Take the next `n` characters.
    ///
    /// Fails with `Truncated` if fewer than `n` bytes remain and with
    /// `Mismatch` if the cut would split a multi-byte character.
    pub fn take(&mut self, n: usize) -> Result<&'a str, FrameError> {
        if self.rest.len() < n {
            return Err(FrameError::Truncated {
                offset: self.offset,
                needed: n - self.rest.len(),
            });
        }
        if !self.rest.is_char_boundary(n) {
            return Err(FrameError::Mismatch {
                offset: self.offset,
                expected: format!("{n} ASCII chars"),
                found: self.rest.chars().take(n).collect(),
            });
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        self.offset += n;
        Ok(head)
    }

    /// Position of the cursor in the original response.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a str {
        self.rest
    }
}

impl fmt::Debug for FrameCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameCursor(@{} {:?})", self.offset, self.rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_expect_take() {
        let mut cur = FrameCursor::new("0101SEARCHING...41 01 83 07 65 04");
        cur.skip(16).unwrap();
        cur.expect("41 01").unwrap();
        cur.expect(" ").unwrap();
        assert_eq!(cur.take(2).unwrap(), "83");
        assert_eq!(cur.offset(), 24);
        assert_eq!(cur.rest(), " 07 65 04");
    }

    #[test]
    fn test_expect_mismatch_does_not_advance() {
        let mut cur = FrameCursor::new("037F 03 12");
        cur.skip(2).unwrap();
        let err = cur.expect("43").unwrap_err();
        assert_eq!(
            err,
            FrameError::Mismatch {
                offset: 2,
                expected: "43".into(),
                found: "7F".into(),
            }
        );
        assert_eq!(cur.rest(), "7F 03 12");
    }

    #[test]
    fn test_truncated() {
        let mut cur = FrameCursor::new("NO DATA");
        let err = cur.skip(16).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { offset: 0, needed: 9 }));
    }

    #[test]
    fn test_split_character_is_a_mismatch() {
        // U+FFFD is three bytes; index 1 lands inside it.
        let mut cur = FrameCursor::new("\u{FFFD}43");
        let err = cur.take(1).unwrap_err();
        assert_eq!(
            err,
            FrameError::Mismatch {
                offset: 0,
                expected: "1 ASCII chars".into(),
                found: "\u{FFFD}".into(),
            }
        );
        assert_eq!(cur.rest(), "\u{FFFD}43");
    }

    #[test]
    fn test_short_multibyte_input_is_truncated() {
        let mut cur = FrameCursor::new("\u{FFFD}");
        assert!(matches!(
            cur.take(4),
            Err(FrameError::Truncated { offset: 0, needed: 1 })
        ));
    }
}
