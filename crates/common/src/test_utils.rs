//! Test utilities for usb-led
//!
//! Provides mock values and helper functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_mock_attached_device;
//!
//! let device = create_mock_attached_device(1);
//! assert_eq!(device.vendor_id, 0x10c4);
//! ```

use crate::usb_types::{AttachedDevice, InterfaceKey};
use protocol::LedMask;
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a mock InterfaceKey on bus 1, interface 0
pub fn create_mock_key(address: u8) -> InterfaceKey {
    InterfaceKey::new(1, address, 0)
}

/// Create a mock AttachedDevice with all LEDs off
pub fn create_mock_attached_device(address: u8) -> AttachedDevice {
    AttachedDevice {
        key: create_mock_key(address),
        vendor_id: 0x10c4,
        product_id: 0xea60,
        state: LedMask::EMPTY,
    }
}

/// Create a list of mock attached devices with consecutive addresses
pub fn create_mock_attached_list(count: u8) -> Vec<AttachedDevice> {
    (1..=count).map(create_mock_attached_device).collect()
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_list_addresses() {
        let devices = create_mock_attached_list(3);
        let addresses: Vec<u8> = devices.iter().map(|d| d.key.address).collect();
        assert_eq!(addresses, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(1)),
        )
        .await;
        assert!(result.is_err());
    }
}
