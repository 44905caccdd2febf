//! Attribute text to wire byte tests
//!
//! Run with: `cargo test -p protocol --test protocol_tests`

use protocol::{Led, LedMask, ProtocolError, format_state, parse_switch};

/// Apply attribute writes the way the driver does and collect the wire bytes
fn apply(writes: &[(&str, &str)]) -> Result<Vec<u8>, ProtocolError> {
    let mut mask = LedMask::EMPTY;
    let mut wire = Vec::new();

    for (name, input) in writes {
        let led: Led = name.parse()?;
        mask = mask.with(led, parse_switch(input)?);
        wire.extend_from_slice(&mask.to_wire());
    }

    Ok(wire)
}

#[test]
fn test_write_sequence_bytes() {
    let wire = apply(&[("led2", "1"), ("led1", "1\n"), ("led2", "0")]).unwrap();
    assert_eq!(wire, vec![0x02, 0x03, 0x01]);
}

#[test]
fn test_all_on_then_all_off() {
    let wire = apply(&[
        ("led1", "1"),
        ("led2", "1"),
        ("led3", "1"),
        ("led3", "0"),
        ("led2", "0"),
        ("led1", "0"),
    ])
    .unwrap();
    assert_eq!(wire, vec![0x01, 0x03, 0x07, 0x03, 0x01, 0x00]);
}

#[test]
fn test_bad_input_stops_sequence() {
    assert!(matches!(
        apply(&[("led1", "1"), ("led2", "2")]),
        Err(ProtocolError::InvalidSwitch { .. })
    ));
    assert!(matches!(
        apply(&[("led4", "1")]),
        Err(ProtocolError::UnknownLed(_))
    ));
}

#[test]
fn test_read_back_matches_written_bit() {
    for led in Led::ALL {
        let mask = LedMask::EMPTY.with(led, true);
        for other in Led::ALL {
            assert_eq!(format_state(mask.is_on(other)), if other == led { "1\n" } else { "0\n" });
        }
    }
}

#[test]
fn test_wire_byte_rejects_high_bits() {
    assert!(LedMask::try_from(0x07).is_ok());
    assert!(matches!(
        LedMask::try_from(0x08),
        Err(ProtocolError::InvalidWireByte { byte: 0x08 })
    ));
}
