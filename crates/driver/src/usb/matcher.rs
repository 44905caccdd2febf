//! Device identity table
//!
//! The peripheral is reached through a CP210x USB-to-TTL adapter, so the
//! driver binds to the adapter's vendor/product pair.

/// Vendor ID of the USB-to-TTL adapter
pub const LED_VENDOR_ID: u16 = 0x10c4;
/// Product ID of the USB-to-TTL adapter
pub const LED_PRODUCT_ID: u16 = 0xea60;

/// Driver name used in logs
pub const DRIVER_NAME: &str = "usb_led";

/// One vendor/product pair this driver binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMatch {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceMatch {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub const fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// Devices that work with this driver; the end of the slice terminates it
pub static DEVICE_TABLE: &[DeviceMatch] = &[DeviceMatch::new(LED_VENDOR_ID, LED_PRODUCT_ID)];

/// Find the table entry for a vendor/product pair
pub fn find_match(vendor_id: u16, product_id: u16) -> Option<&'static DeviceMatch> {
    DEVICE_TABLE
        .iter()
        .find(|entry| entry.matches(vendor_id, product_id))
}

/// Check whether a vendor/product pair is handled by this driver
pub fn matches(vendor_id: u16, product_id: u16) -> bool {
    find_match(vendor_id, product_id).is_some()
}
