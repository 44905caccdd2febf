//! libusb backend
//!
//! Implements [`UsbInterface`] and [`BulkTransport`] on top of `rusb`, so the
//! lifecycle can drive real hardware.

use crate::usb::endpoints::EndpointInfo;
use crate::usb::matcher;
use crate::usb::transport::{BulkTransport, UsbInterface};
use common::InterfaceKey;
use rusb::{Device, DeviceDescriptor, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// One interface of a matching USB device
pub struct RusbInterface<T: UsbContext> {
    device: Device<T>,
    descriptor: DeviceDescriptor,
    interface_number: u8,
}

impl<T: UsbContext> RusbInterface<T> {
    /// Wrap an interface of a device, caching the device descriptor
    pub fn new(device: Device<T>, interface_number: u8) -> Result<Self, rusb::Error> {
        let descriptor = device.device_descriptor()?;

        Ok(Self {
            device,
            descriptor,
            interface_number,
        })
    }

    /// All interfaces of the device's active configuration
    pub fn interfaces_of(device: Device<T>) -> Result<Vec<Self>, rusb::Error> {
        let config = device.active_config_descriptor()?;

        config
            .interfaces()
            .map(|interface| Self::new(device.clone(), interface.number()))
            .collect()
    }

    pub fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    pub fn device_address(&self) -> u8 {
        self.device.address()
    }
}

impl<T: UsbContext + 'static> UsbInterface for RusbInterface<T> {
    fn key(&self) -> InterfaceKey {
        InterfaceKey::new(
            self.device.bus_number(),
            self.device.address(),
            self.interface_number,
        )
    }

    fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    fn endpoints(&self) -> Result<Vec<EndpointInfo>, rusb::Error> {
        let config = self.device.active_config_descriptor()?;

        let interface = config
            .interfaces()
            .find(|interface| interface.number() == self.interface_number)
            .ok_or(rusb::Error::NotFound)?;

        // A freshly claimed interface runs alternate setting 0
        let setting = interface
            .descriptors()
            .find(|descriptor| descriptor.setting_number() == 0)
            .ok_or(rusb::Error::NotFound)?;

        Ok(setting
            .endpoint_descriptors()
            .map(|endpoint| EndpointInfo::from_descriptor(&endpoint))
            .collect())
    }

    fn acquire(&self) -> Result<Box<dyn BulkTransport>, rusb::Error> {
        let handle = self.device.open()?;
        let interface = self.interface_number;

        // The stock serial driver normally owns this adapter
        let reattach = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!(
                    "Detaching kernel driver from interface {} on {}",
                    interface,
                    self.key()
                );
                handle.detach_kernel_driver(interface)?;
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
                false
            }
        };

        if let Err(e) = handle.claim_interface(interface) {
            warn!("Failed to claim interface {}: {}", interface, e);
            if reattach {
                let _ = handle.attach_kernel_driver(interface);
            }
            return Err(e);
        }

        debug!("Claimed interface {} on {}", interface, self.key());

        Ok(Box::new(RusbBulkHandle {
            handle,
            interface,
            reattach_kernel_driver: reattach,
        }))
    }
}

/// Opened device with one claimed interface
///
/// Dropping it releases the interface and hands it back to the kernel
/// driver that owned it before.
pub struct RusbBulkHandle<T: UsbContext> {
    handle: DeviceHandle<T>,
    interface: u8,
    reattach_kernel_driver: bool,
}

impl<T: UsbContext> BulkTransport for RusbBulkHandle<T> {
    fn write_bulk(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.handle.write_bulk(endpoint, data, timeout)
    }
}

impl<T: UsbContext> Drop for RusbBulkHandle<T> {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!("Failed to release interface {}: {}", self.interface, e);
        }

        if self.reattach_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.interface, e
                );
            } else {
                debug!("Reattached kernel driver to interface {}", self.interface);
            }
        }
    }
}

/// Whether a device is one this driver binds to
pub fn is_led_device<T: UsbContext>(device: &Device<T>) -> bool {
    device
        .device_descriptor()
        .map(|desc| matcher::matches(desc.vendor_id(), desc.product_id()))
        .unwrap_or(false)
}

/// Interfaces of every connected matching device, in bus/address order
pub fn find_led_interfaces<T: UsbContext + 'static>(
    context: &T,
) -> Result<Vec<RusbInterface<T>>, rusb::Error> {
    let mut interfaces = Vec::new();

    for device in context.devices()?.iter() {
        if !is_led_device(&device) {
            continue;
        }

        match RusbInterface::interfaces_of(device) {
            Ok(found) => interfaces.extend(found),
            Err(e) => warn!("Failed to read configuration of LED device: {}", e),
        }
    }

    interfaces.sort_by_key(|interface| interface.key());
    Ok(interfaces)
}
