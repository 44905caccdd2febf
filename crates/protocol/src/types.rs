//! LED type definitions
//!
//! The peripheral takes one byte per bulk OUT transfer. Each of the low three
//! bits drives one LED; the remaining bits must always be zero.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// LED 1: 0001
pub const LED_1: u8 = 0x01;
/// LED 2: 0010
pub const LED_2: u8 = 0x02;
/// LED 3: 0100
pub const LED_3: u8 = 0x04;
/// All bits that may ever be set on the wire
pub const LED_BITS: u8 = LED_1 | LED_2 | LED_3;

/// One of the three LEDs on the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Led {
    Led1,
    Led2,
    Led3,
}

impl Led {
    /// All LEDs in attribute order
    pub const ALL: [Led; 3] = [Led::Led1, Led::Led2, Led::Led3];

    /// Bit this LED occupies in the wire byte
    pub const fn bit(self) -> u8 {
        match self {
            Led::Led1 => LED_1,
            Led::Led2 => LED_2,
            Led::Led3 => LED_3,
        }
    }

    /// Attribute name (`led1`, `led2`, `led3`)
    pub const fn name(self) -> &'static str {
        match self {
            Led::Led1 => "led1",
            Led::Led2 => "led2",
            Led::Led3 => "led3",
        }
    }

    /// Look up an LED by attribute name
    pub fn from_name(name: &str) -> Option<Led> {
        Self::ALL.into_iter().find(|led| led.name() == name)
    }
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Led {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Led::from_name(s).ok_or_else(|| ProtocolError::UnknownLed(s.to_string()))
    }
}

/// Cached LED state, one bit per LED
///
/// A `LedMask` can only hold bits within [`LED_BITS`]; every constructor
/// enforces it, so the wire byte produced by [`LedMask::to_wire`] never has
/// bits 3-7 set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LedMask(u8);

impl LedMask {
    /// All LEDs off
    pub const EMPTY: LedMask = LedMask(0);

    /// Build a mask from raw bits, discarding anything outside [`LED_BITS`]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        LedMask(bits & LED_BITS)
    }

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the given LED is on
    pub const fn is_on(self, led: Led) -> bool {
        self.0 & led.bit() != 0
    }

    /// Copy of this mask with one LED switched, all other bits preserved
    pub const fn with(self, led: Led, on: bool) -> Self {
        if on {
            LedMask(self.0 | led.bit())
        } else {
            LedMask(self.0 & !led.bit())
        }
    }

    /// Bulk OUT payload for this mask
    pub const fn to_wire(self) -> [u8; 1] {
        [self.0]
    }
}

impl TryFrom<u8> for LedMask {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        if byte & !LED_BITS != 0 {
            return Err(ProtocolError::InvalidWireByte { byte });
        }
        Ok(LedMask(byte))
    }
}

impl From<LedMask> for u8 {
    fn from(mask: LedMask) -> u8 {
        mask.0
    }
}

impl fmt::Display for LedMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_bits_are_distinct() {
        assert_eq!(Led::Led1.bit(), 0x01);
        assert_eq!(Led::Led2.bit(), 0x02);
        assert_eq!(Led::Led3.bit(), 0x04);
        assert_eq!(LED_BITS, 0x07);
    }

    #[test]
    fn test_led_from_name() {
        assert_eq!(Led::from_name("led1"), Some(Led::Led1));
        assert_eq!(Led::from_name("led3"), Some(Led::Led3));
        assert_eq!(Led::from_name("led4"), None);
        assert_eq!(Led::from_name("LED1"), None);
        assert!("led0".parse::<Led>().is_err());
    }

    #[test]
    fn test_with_preserves_other_bits() {
        let mask = LedMask::from_bits_truncate(LED_1 | LED_3);
        assert_eq!(mask.with(Led::Led2, true).bits(), 0x07);
        assert_eq!(mask.with(Led::Led1, false).bits(), LED_3);
        assert_eq!(mask.with(Led::Led3, true), mask);
    }

    #[test]
    fn test_truncate_drops_high_bits() {
        assert_eq!(LedMask::from_bits_truncate(0xff).bits(), LED_BITS);
        assert_eq!(LedMask::from_bits_truncate(0xf8), LedMask::EMPTY);
    }

    #[test]
    fn test_try_from_rejects_high_bits() {
        assert!(LedMask::try_from(0x08).is_err());
        assert_eq!(LedMask::try_from(0x05).unwrap().bits(), 0x05);
    }

    #[test]
    fn test_display() {
        assert_eq!(LedMask::from_bits_truncate(0x03).to_string(), "0x03");
    }
}
