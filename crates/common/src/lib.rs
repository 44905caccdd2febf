//! Common utilities for usb-led
//!
//! This crate provides functionality shared by the driver library and its
//! binary: host-side USB identity types, error handling, logging setup, and
//! the async channel bridge between the Tokio runtime and the USB thread.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod usb_types;

pub use channel::{UsbBridge, UsbCommand, UsbEvent, UsbWorker, create_usb_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use usb_types::{AttachedDevice, InterfaceKey};
