//! Host USB collaborator traits and bulk OUT execution
//!
//! The lifecycle and LED controller only talk to the host USB stack through
//! these traits. The libusb implementation lives in [`super::device`].

use crate::error::TransportError;
use crate::usb::endpoints::EndpointInfo;
use common::InterfaceKey;
use protocol::LedMask;
use std::time::Duration;
use tracing::debug;

/// Timeout for LED bulk OUT transfers (100 seconds)
///
/// Long enough that a write effectively blocks until the device accepts it.
pub const BULK_TIMEOUT: Duration = Duration::from_secs(100);

/// Owning handle to an opened device that can execute bulk OUT transfers
///
/// Dropping the handle releases the claimed interface.
pub trait BulkTransport: Send + Sync {
    /// Write `data` to `endpoint`, returning the number of bytes transferred
    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration)
    -> Result<usize, rusb::Error>;
}

/// A device interface offered to the driver by the host
pub trait UsbInterface {
    /// Registry identity of this interface
    fn key(&self) -> InterfaceKey;

    /// USB Vendor ID of the owning device
    fn vendor_id(&self) -> u16;

    /// USB Product ID of the owning device
    fn product_id(&self) -> u16;

    /// Endpoint descriptors of the active alternate setting, in descriptor order
    fn endpoints(&self) -> Result<Vec<EndpointInfo>, rusb::Error>;

    /// Open the device and claim this interface
    fn acquire(&self) -> Result<Box<dyn BulkTransport>, rusb::Error>;
}

/// Send one LED state byte to the bulk OUT endpoint
///
/// Anything other than exactly one byte transferred is an error.
pub fn write_led_byte(
    transport: &dyn BulkTransport,
    endpoint: u8,
    mask: LedMask,
    timeout: Duration,
) -> Result<(), TransportError> {
    let data = mask.to_wire();

    let written = transport
        .write_bulk(endpoint, &data, timeout)
        .map_err(|source| TransportError::Failed { endpoint, source })?;

    debug!(
        "Bulk OUT to endpoint {:#04x}: {} of {} bytes",
        endpoint,
        written,
        data.len()
    );

    if written != data.len() {
        return Err(TransportError::ShortWrite {
            endpoint,
            written,
            expected: data.len(),
        });
    }

    Ok(())
}
