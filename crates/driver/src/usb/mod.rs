//! USB subsystem
//!
//! Everything between the host USB stack and the LED control path:
//! - Device matching against the fixed vendor/product table
//! - Bulk endpoint discovery on the claimed interface
//! - Attach/detach lifecycle and the registry of device contexts
//! - The libusb backend and the hot-plug worker thread
//!
//! The host side is reached through the [`UsbInterface`] and
//! [`BulkTransport`] traits so the lifecycle can run against real hardware
//! (via [`device::RusbInterface`]) or test doubles.

pub mod device;
pub mod endpoints;
pub mod lifecycle;
pub mod matcher;
pub mod transport;
pub mod worker;

pub use device::{RusbInterface, find_led_interfaces};
pub use endpoints::{Endpoint, EndpointInfo, ResolvedEndpoints, resolve_endpoints};
pub use lifecycle::LifecycleManager;
pub use matcher::{DEVICE_TABLE, DeviceMatch, LED_PRODUCT_ID, LED_VENDOR_ID};
pub use transport::{BULK_TIMEOUT, BulkTransport, UsbInterface};
pub use worker::{UsbWorkerThread, spawn_usb_worker};
