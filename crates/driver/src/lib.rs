//! usb-led driver
//!
//! Userspace driver for a three-LED USB peripheral (a microcontroller behind a
//! CP210x USB-to-serial bridge). Each LED state change is one byte written to
//! the device's bulk OUT endpoint; the LEDs are exposed per attached device as
//! `led1`, `led2` and `led3` text attributes.
//!
//! - [`usb`]: device matching, endpoint discovery, attach/detach lifecycle,
//!   the libusb backend and the hot-plug worker thread
//! - [`led`]: per-device context, LED state controller and attribute binding
//! - [`config`]: TOML configuration
//! - [`console`]: command parsing for the interactive daemon

pub mod config;
pub mod console;
pub mod error;
pub mod led;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod usb;

pub use error::{LedError, Result, TransportError};
pub use led::{
    AttributeDirectory, AttributeHost, CachePolicy, Caller, DeviceContext, LED_ATTRIBUTES,
    LedAttribute, LedController,
};
pub use usb::{LifecycleManager, UsbInterface};
