//! LED wire protocol for usb-led
//!
//! This crate defines what travels between the host and the LED peripheral,
//! and the text format of the per-LED control attributes:
//!
//! - [`LedMask`]: the single byte sent over the bulk OUT endpoint
//!   (bit 0 = LED1, bit 1 = LED2, bit 2 = LED3, bits 3-7 always zero)
//! - [`Led`]: the three LEDs and their attribute names
//! - [`parse_switch`] / [`format_state`]: the `"0"`/`"1"` attribute text codec
//!
//! # Example
//!
//! ```
//! use protocol::{Led, LedMask, parse_switch};
//!
//! let mask = LedMask::EMPTY.with(Led::Led2, true).with(Led::Led1, true);
//! assert_eq!(mask.to_wire(), [0x03]);
//!
//! assert_eq!(parse_switch("1\n").unwrap(), true);
//! assert!(parse_switch("01").is_err());
//! ```

pub mod attribute;
pub mod error;
pub mod types;

pub use attribute::{format_state, parse_switch};
pub use error::{ProtocolError, Result};
pub use types::{LED_1, LED_2, LED_3, LED_BITS, Led, LedMask};
