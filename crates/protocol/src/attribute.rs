//! Attribute text codec
//!
//! Each LED is exposed as a text attribute. Reads produce a single decimal
//! digit followed by a newline; writes accept a literal `0` or `1`, with one
//! optional trailing newline so that `echo 1 > led1` works.

use crate::error::{ProtocolError, Result};

/// Parse attribute input into an on/off value
///
/// Only `"0"` and `"1"` are accepted. Leading zeros, signs, whitespace other
/// than a single trailing `'\n'`, and any other integer are rejected.
pub fn parse_switch(input: &str) -> Result<bool> {
    let value = input.strip_suffix('\n').unwrap_or(input);

    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ProtocolError::InvalidSwitch {
            input: input.to_string(),
        }),
    }
}

/// Format an LED state the way an attribute read returns it
pub fn format_state(on: bool) -> String {
    format!("{}\n", u8::from(on))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        assert!(!parse_switch("0").unwrap());
        assert!(parse_switch("1").unwrap());
        assert!(parse_switch("1\n").unwrap());
    }

    #[test]
    fn test_parse_rejects_everything_else() {
        for input in ["2", "-1", "abc", "", "01", "+1", " 1", "1\n\n", "1 ", "256", "\n"] {
            assert!(parse_switch(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_format_state() {
        assert_eq!(format_state(false), "0\n");
        assert_eq!(format_state(true), "1\n");
    }
}
