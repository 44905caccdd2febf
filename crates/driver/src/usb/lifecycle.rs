//! Attach/detach lifecycle
//!
//! Owns the registry of device contexts, keyed by interface. Attach builds a
//! context and exposes the LED attributes; detach withdraws them and drops
//! the registry's reference. Attribute operations look contexts up here and
//! hold their own reference for as long as they run.

use crate::error::LedError;
use crate::led::attributes::{Caller, LED_ATTRIBUTES, find_attribute};
use crate::led::context::DeviceContext;
use crate::led::controller::LedController;
use crate::led::host::AttributeHost;
use crate::usb::endpoints::resolve_endpoints;
use crate::usb::matcher::{self, DRIVER_NAME};
use crate::usb::transport::UsbInterface;
use common::{AttachedDevice, InterfaceKey};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

type Registry = HashMap<InterfaceKey, Arc<DeviceContext>>;

/// Attach/detach orchestration and the device context registry
pub struct LifecycleManager {
    registry: RwLock<Registry>,
    host: Arc<dyn AttributeHost>,
    controller: LedController,
}

impl LifecycleManager {
    pub fn new(host: Arc<dyn AttributeHost>, controller: LedController) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            host,
            controller,
        }
    }

    /// Bind to an interface offered by the host
    ///
    /// On any failure everything acquired so far is released and nothing is
    /// left in the registry or exposed.
    pub fn attach(&self, interface: &dyn UsbInterface) -> Result<InterfaceKey, LedError> {
        let key = interface.key();
        let (vendor_id, product_id) = (interface.vendor_id(), interface.product_id());

        debug!(
            "{} attach called for {}: {:04x}:{:04x}",
            DRIVER_NAME, key, vendor_id, product_id
        );

        if !matcher::matches(vendor_id, product_id) {
            return Err(LedError::UnsupportedDevice {
                vendor_id,
                product_id,
            });
        }

        if self.read_registry().contains_key(&key) {
            return Err(LedError::AlreadyAttached(key));
        }

        let handle = interface.acquire().map_err(|e| {
            warn!("Failed to acquire {}: {}", key, e);
            LedError::Usb(e)
        })?;

        // Dropping `handle` on any early return below releases the interface
        let endpoints = resolve_endpoints(&interface.endpoints()?).inspect_err(|e| {
            warn!("Failed to find bulk endpoints on {}: {}", key, e);
        })?;

        let ctx = DeviceContext::new(key, vendor_id, product_id, handle, endpoints)?;

        match self.write_registry().entry(key) {
            Entry::Occupied(_) => return Err(LedError::AlreadyAttached(key)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(ctx));
            }
        }

        if let Err(e) = self.host.expose(key, &LED_ATTRIBUTES) {
            warn!("Failed to expose attributes for {}: {}", key, e);
            self.write_registry().remove(&key);
            return Err(e);
        }

        info!(
            "Attached {} (bulk in {:#04x}, bulk out {:#04x})",
            key, endpoints.bulk_in.address, endpoints.bulk_out.address
        );
        Ok(key)
    }

    /// Unbind from an interface
    ///
    /// The context stays alive until in-flight attribute operations holding
    /// it finish; the last one to drop it releases the device.
    pub fn detach(&self, key: InterfaceKey) -> Result<(), LedError> {
        let ctx = self
            .write_registry()
            .remove(&key)
            .ok_or(LedError::NotAttached(key))?;

        self.host.withdraw(key, &LED_ATTRIBUTES);

        let in_flight = Arc::strong_count(&ctx) - 1;
        drop(ctx);

        if in_flight > 0 {
            info!(
                "Detached {} ({} operation(s) still holding the device)",
                key, in_flight
            );
        } else {
            info!("Detached {}", key);
        }
        Ok(())
    }

    /// Detach every interface on the given bus/address
    pub fn detach_device(&self, bus: u8, address: u8) -> Vec<InterfaceKey> {
        let keys: Vec<_> = self
            .read_registry()
            .keys()
            .filter(|key| key.bus == bus && key.address == address)
            .copied()
            .collect();

        keys.into_iter()
            .filter(|key| self.detach(*key).is_ok())
            .collect()
    }

    /// Detach everything, returning the keys that were detached
    pub fn detach_all(&self) -> Vec<InterfaceKey> {
        let keys: Vec<_> = self.read_registry().keys().copied().collect();

        keys.into_iter()
            .filter(|key| self.detach(*key).is_ok())
            .collect()
    }

    /// Take a reference to an attached context
    pub fn context(&self, key: InterfaceKey) -> Option<Arc<DeviceContext>> {
        self.read_registry().get(&key).cloned()
    }

    /// Snapshot of attached devices, in key order
    pub fn attached(&self) -> Vec<AttachedDevice> {
        let mut devices: Vec<_> = self
            .read_registry()
            .values()
            .map(|ctx| AttachedDevice {
                key: ctx.key(),
                vendor_id: ctx.vendor_id(),
                product_id: ctx.product_id(),
                state: ctx.color(),
            })
            .collect();
        devices.sort_by_key(|device| device.key);
        devices
    }

    /// Read an attribute of an attached interface
    pub fn show(
        &self,
        key: InterfaceKey,
        attribute: &str,
        caller: Caller,
    ) -> Result<String, LedError> {
        let attr = find_attribute(attribute)?;
        let ctx = self.context(key).ok_or(LedError::NotAttached(key))?;
        attr.show(&ctx, caller)
    }

    /// Write an attribute of an attached interface
    pub fn store(
        &self,
        key: InterfaceKey,
        attribute: &str,
        caller: Caller,
        input: &str,
    ) -> Result<usize, LedError> {
        let attr = find_attribute(attribute)?;
        let ctx = self.context(key).ok_or(LedError::NotAttached(key))?;
        attr.store(&ctx, &self.controller, caller, input)
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::host::AttributeDirectory;
    use crate::test_utils::{MockInterface, bulk_in, interrupt_in};
    use std::sync::atomic::Ordering;

    fn manager() -> (LifecycleManager, Arc<AttributeDirectory>) {
        let directory = Arc::new(AttributeDirectory::new());
        let manager = LifecycleManager::new(directory.clone(), LedController::default());
        (manager, directory)
    }

    #[test]
    fn test_attach_exposes_attributes() {
        let (manager, directory) = manager();
        let interface = MockInterface::led_device(4);

        let key = manager.attach(&interface).unwrap();

        assert_eq!(key, interface.key());
        assert_eq!(directory.exposed(key), vec!["led1", "led2", "led3"]);
        let ctx = manager.context(key).unwrap();
        assert_eq!(ctx.color().bits(), 0);
        assert_eq!(interface.acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attach_rejects_unsupported_device() {
        let (manager, _) = manager();
        let mut interface = MockInterface::led_device(4);
        interface.product_id = 0x1234;

        assert!(matches!(
            manager.attach(&interface),
            Err(LedError::UnsupportedDevice { .. })
        ));
        assert_eq!(interface.acquired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_attach_twice_rejected() {
        let (manager, _) = manager();
        let interface = MockInterface::led_device(4);

        manager.attach(&interface).unwrap();
        assert!(matches!(
            manager.attach(&interface),
            Err(LedError::AlreadyAttached(_))
        ));
        assert_eq!(interface.acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attach_without_bulk_out_releases_handle() {
        let (manager, directory) = manager();
        let interface =
            MockInterface::with_endpoints(4, vec![interrupt_in(0x83), bulk_in(0x81, 64)]);

        assert!(matches!(
            manager.attach(&interface),
            Err(LedError::EndpointDiscovery {
                missing_in: false,
                missing_out: true
            })
        ));
        assert!(manager.context(interface.key()).is_none());
        assert!(directory.keys().is_empty());
        assert_eq!(interface.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(interface.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attach_acquire_failure() {
        let (manager, directory) = manager();
        let mut interface = MockInterface::led_device(4);
        interface.fail_acquire = Some(rusb::Error::Access);

        assert!(matches!(
            manager.attach(&interface),
            Err(LedError::Usb(rusb::Error::Access))
        ));
        assert!(manager.attached().is_empty());
        assert!(directory.keys().is_empty());
    }

    #[test]
    fn test_detach_withdraws_and_releases() {
        let (manager, directory) = manager();
        let interface = MockInterface::led_device(4);
        let key = manager.attach(&interface).unwrap();

        manager.detach(key).unwrap();

        assert!(manager.context(key).is_none());
        assert!(directory.exposed(key).is_empty());
        assert_eq!(interface.released.load(Ordering::SeqCst), 1);
        assert!(matches!(manager.detach(key), Err(LedError::NotAttached(_))));
    }

    #[test]
    fn test_detach_waits_for_in_flight_holder() {
        let (manager, _) = manager();
        let interface = MockInterface::led_device(4);
        let key = manager.attach(&interface).unwrap();

        let held = manager.context(key).unwrap();
        manager.detach(key).unwrap();
        assert_eq!(interface.released.load(Ordering::SeqCst), 0);

        // The holder can still finish its operation
        LedController::default()
            .change_color(&held, "led1", true)
            .unwrap();
        drop(held);
        assert_eq!(interface.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_operations_after_detach_fail() {
        let (manager, _) = manager();
        let interface = MockInterface::led_device(4);
        let key = manager.attach(&interface).unwrap();
        manager.detach(key).unwrap();

        assert!(matches!(
            manager.store(key, "led1", Caller::Owner, "1"),
            Err(LedError::NotAttached(_))
        ));
        assert!(interface.log.transfers().is_empty());
    }

    #[test]
    fn test_show_and_store_through_manager() {
        let (manager, _) = manager();
        let interface = MockInterface::led_device(4);
        let key = manager.attach(&interface).unwrap();

        assert_eq!(manager.store(key, "led2", Caller::Owner, "1\n").unwrap(), 2);
        assert_eq!(manager.show(key, "led2", Caller::Other).unwrap(), "1\n");
        assert_eq!(manager.show(key, "led1", Caller::Other).unwrap(), "0\n");
        assert!(matches!(
            manager.show(key, "led9", Caller::Other),
            Err(LedError::UnknownAttribute(_))
        ));
        assert_eq!(interface.log.bytes(), vec![0x02]);
    }

    #[test]
    fn test_detach_device_and_all() {
        let (manager, _) = manager();
        let first = MockInterface::led_device(4);
        let second = MockInterface::led_device(5);
        manager.attach(&first).unwrap();
        manager.attach(&second).unwrap();

        assert_eq!(manager.detach_device(1, 5), vec![second.key()]);
        assert_eq!(manager.attached().len(), 1);

        assert_eq!(manager.detach_all(), vec![first.key()]);
        assert!(manager.attached().is_empty());
        assert_eq!(first.released.load(Ordering::SeqCst), 1);
        assert_eq!(second.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attached_snapshot_sorted() {
        let (manager, _) = manager();
        let later = MockInterface::led_device(9);
        let earlier = MockInterface::led_device(2);
        manager.attach(&later).unwrap();
        manager.attach(&earlier).unwrap();
        manager
            .store(later.key(), "led3", Caller::Owner, "1")
            .unwrap();

        let attached = manager.attached();
        assert_eq!(attached[0].key, earlier.key());
        assert_eq!(attached[1].state.bits(), 0x04);
    }

    #[test]
    fn test_expose_failure_unregisters() {
        let (manager, directory) = manager();
        let interface = MockInterface::led_device(4);
        directory.expose(interface.key(), &LED_ATTRIBUTES).unwrap();

        assert!(matches!(
            manager.attach(&interface),
            Err(LedError::AttributeHost(_))
        ));
        assert!(manager.context(interface.key()).is_none());
        assert_eq!(interface.released.load(Ordering::SeqCst), 1);
    }
}
