//! Host-side USB identity types

use protocol::LedMask;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one claimed interface on one attached device
///
/// Displayed and parsed as `BBB-AAA:I` (bus, device address, interface
/// number), e.g. `001-004:0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceKey {
    /// Bus number
    pub bus: u8,
    /// Device address on the bus
    pub address: u8,
    /// Interface number within the active configuration
    pub interface: u8,
}

impl InterfaceKey {
    pub const fn new(bus: u8, address: u8, interface: u8) -> Self {
        Self {
            bus,
            address,
            interface,
        }
    }
}

impl fmt::Display for InterfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}-{:03}:{}", self.bus, self.address, self.interface)
    }
}

impl FromStr for InterfaceKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidKey(s.to_string());

        let (device, interface) = s.split_once(':').ok_or_else(invalid)?;
        let (bus, address) = device.split_once('-').ok_or_else(invalid)?;

        Ok(Self {
            bus: bus.parse().map_err(|_| invalid())?,
            address: address.parse().map_err(|_| invalid())?,
            interface: interface.parse().map_err(|_| invalid())?,
        })
    }
}

/// Snapshot of an attached LED device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDevice {
    /// Interface the driver is bound to
    pub key: InterfaceKey,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Cached LED state
    pub state: LedMask,
}
