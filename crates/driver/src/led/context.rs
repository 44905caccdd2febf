//! Per-device state

use crate::error::LedError;
use crate::usb::endpoints::ResolvedEndpoints;
use crate::usb::transport::BulkTransport;
use common::InterfaceKey;
use protocol::LedMask;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// State of one attached LED device
///
/// Shared as `Arc<DeviceContext>`: the lifecycle registry holds one
/// reference from attach until detach, and every attribute operation holds
/// its own while it runs. Dropping the last reference frees the bulk-in
/// buffer and releases the device handle.
pub struct DeviceContext {
    key: InterfaceKey,
    vendor_id: u16,
    product_id: u16,
    /// Owning device handle, interface claimed
    handle: Box<dyn BulkTransport>,
    endpoints: ResolvedEndpoints,
    /// Receive buffer sized to the bulk IN max packet size
    bulk_in_buffer: Vec<u8>,
    /// Cached LED state; also serializes transfers to this device
    color: Mutex<LedMask>,
}

impl DeviceContext {
    /// Build a context around an acquired handle
    ///
    /// Allocates the bulk-in buffer; on failure the handle is dropped, which
    /// releases it.
    pub(crate) fn new(
        key: InterfaceKey,
        vendor_id: u16,
        product_id: u16,
        handle: Box<dyn BulkTransport>,
        endpoints: ResolvedEndpoints,
    ) -> Result<Self, LedError> {
        let bulk_in_buffer =
            alloc_bulk_in_buffer(usize::from(endpoints.bulk_in.max_packet_size))?;

        Ok(Self {
            key,
            vendor_id,
            product_id,
            handle,
            endpoints,
            bulk_in_buffer,
            color: Mutex::new(LedMask::EMPTY),
        })
    }

    pub fn key(&self) -> InterfaceKey {
        self.key
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn bulk_in_address(&self) -> u8 {
        self.endpoints.bulk_in.address
    }

    pub fn bulk_out_address(&self) -> u8 {
        self.endpoints.bulk_out.address
    }

    /// Size of the bulk-in buffer in bytes
    pub fn bulk_in_size(&self) -> usize {
        self.bulk_in_buffer.len()
    }

    /// Snapshot of the cached LED state
    pub fn color(&self) -> LedMask {
        *self.lock_color()
    }

    pub(crate) fn lock_color(&self) -> MutexGuard<'_, LedMask> {
        // The guarded value is a plain bitmask, always valid even if a holder panicked
        self.color.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn transport(&self) -> &dyn BulkTransport {
        self.handle.as_ref()
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        debug!(
            "Releasing device context {}: freeing {}-byte bulk-in buffer",
            self.key,
            self.bulk_in_buffer.len()
        );
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("key", &self.key)
            .field("endpoints", &self.endpoints)
            .field("bulk_in_size", &self.bulk_in_buffer.len())
            .field("color", &self.color())
            .finish()
    }
}

/// Zeroed receive buffer of `size` bytes
///
/// Packet sizes are at most 64 KiB, so this only fails under real memory
/// exhaustion.
fn alloc_bulk_in_buffer(size: usize) -> Result<Vec<u8>, LedError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| LedError::Allocation { size })?;
    buffer.resize(size, 0);
    Ok(buffer)
}
