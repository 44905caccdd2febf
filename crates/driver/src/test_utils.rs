//! Test doubles for the host USB collaborators
//!
//! [`MockTransport`] records every bulk write and counts releases;
//! [`MockInterface`] hands out mock transports and describes a configurable
//! endpoint list. Both are public so integration tests can use them.
//!
//! # Example
//!
//! ```
//! use driver::test_utils::MockInterface;
//! use driver::{AttributeDirectory, LedController, LifecycleManager, Caller};
//! use std::sync::Arc;
//!
//! let manager = LifecycleManager::new(Arc::new(AttributeDirectory::new()), LedController::default());
//! let interface = MockInterface::led_device(4);
//! let key = manager.attach(&interface).unwrap();
//!
//! manager.store(key, "led2", Caller::Owner, "1").unwrap();
//! assert_eq!(interface.log.bytes(), vec![0x02]);
//! ```

use crate::usb::endpoints::{Endpoint, EndpointInfo, ResolvedEndpoints};
use crate::usb::transport::{BulkTransport, UsbInterface};
use common::InterfaceKey;
use rusb::{Direction, TransferType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One recorded bulk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub endpoint: u8,
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// Shared log of bulk writes
#[derive(Debug, Clone, Default)]
pub struct TransferLog {
    inner: Arc<Mutex<Vec<Transfer>>>,
}

impl TransferLog {
    pub fn transfers(&self) -> Vec<Transfer> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First byte of every write, in order
    pub fn bytes(&self) -> Vec<u8> {
        self.transfers()
            .iter()
            .filter_map(|t| t.data.first().copied())
            .collect()
    }

    fn push(&self, transfer: Transfer) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transfer);
    }
}

/// How a mock transfer completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// All bytes written
    Complete,
    /// Only this many bytes written
    Short(usize),
    /// Transfer fails
    Fail(rusb::Error),
}

/// Changes the behavior of a transport after it has been handed out
#[derive(Debug, Clone)]
pub struct MockControl {
    behavior: Arc<Mutex<MockBehavior>>,
}

impl MockControl {
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behavior;
    }
}

/// Recording bulk transport
pub struct MockTransport {
    log: TransferLog,
    behavior: Arc<Mutex<MockBehavior>>,
    released: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            log: TransferLog::default(),
            behavior: Arc::new(Mutex::new(MockBehavior::Complete)),
            released: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn log(&self) -> TransferLog {
        self.log.clone()
    }

    pub fn control(&self) -> MockControl {
        MockControl {
            behavior: Arc::clone(&self.behavior),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.control().set_behavior(behavior);
    }

    /// Counter incremented when the transport is dropped
    pub fn released_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.released)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkTransport for MockTransport {
    fn write_bulk(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.log.push(Transfer {
            endpoint,
            data: data.to_vec(),
            timeout,
        });

        match *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) {
            MockBehavior::Complete => Ok(data.len()),
            MockBehavior::Short(written) => Ok(written),
            MockBehavior::Fail(e) => Err(e),
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock interface handing out [`MockTransport`]s
///
/// All transports share this interface's log, behavior and counters.
pub struct MockInterface {
    pub bus: u8,
    pub address: u8,
    pub interface: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub endpoints: Vec<EndpointInfo>,
    /// Error returned by `acquire` instead of a transport
    pub fail_acquire: Option<rusb::Error>,
    /// Sleep inside every bulk write
    pub transfer_delay: Duration,
    pub log: TransferLog,
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    behavior: Arc<Mutex<MockBehavior>>,
}

impl MockInterface {
    /// LED adapter on bus 1 with a bulk pair and an interrupt endpoint
    pub fn led_device(address: u8) -> Self {
        Self::with_endpoints(
            address,
            vec![interrupt_in(0x83), bulk_in(0x81, 64), bulk_out(0x01, 64)],
        )
    }

    /// LED adapter on bus 1 with the given endpoints
    pub fn with_endpoints(address: u8, endpoints: Vec<EndpointInfo>) -> Self {
        Self {
            bus: 1,
            address,
            interface: 0,
            vendor_id: 0x10c4,
            product_id: 0xea60,
            endpoints,
            fail_acquire: None,
            transfer_delay: Duration::ZERO,
            log: TransferLog::default(),
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            behavior: Arc::new(Mutex::new(MockBehavior::Complete)),
        }
    }

    pub fn control(&self) -> MockControl {
        MockControl {
            behavior: Arc::clone(&self.behavior),
        }
    }
}

impl UsbInterface for MockInterface {
    fn key(&self) -> InterfaceKey {
        InterfaceKey::new(self.bus, self.address, self.interface)
    }

    fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.product_id
    }

    fn endpoints(&self) -> Result<Vec<EndpointInfo>, rusb::Error> {
        Ok(self.endpoints.clone())
    }

    fn acquire(&self) -> Result<Box<dyn BulkTransport>, rusb::Error> {
        if let Some(e) = self.fail_acquire {
            return Err(e);
        }

        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport {
            log: self.log.clone(),
            behavior: Arc::clone(&self.behavior),
            released: Arc::clone(&self.released),
            delay: self.transfer_delay,
        }))
    }
}

/// Bulk IN endpoint descriptor
pub fn bulk_in(address: u8, max_packet_size: u16) -> EndpointInfo {
    EndpointInfo::new(
        address | 0x80,
        Direction::In,
        TransferType::Bulk,
        max_packet_size,
    )
}

/// Bulk OUT endpoint descriptor
pub fn bulk_out(address: u8, max_packet_size: u16) -> EndpointInfo {
    EndpointInfo::new(
        address & 0x7f,
        Direction::Out,
        TransferType::Bulk,
        max_packet_size,
    )
}

/// Interrupt IN endpoint descriptor
pub fn interrupt_in(address: u8) -> EndpointInfo {
    EndpointInfo::new(address | 0x80, Direction::In, TransferType::Interrupt, 8)
}

/// Bulk pair 0x81 (IN, 64 bytes) / 0x01 (OUT, 64 bytes)
pub fn led_endpoints() -> ResolvedEndpoints {
    ResolvedEndpoints {
        bulk_in: Endpoint {
            address: 0x81,
            max_packet_size: 64,
        },
        bulk_out: Endpoint {
            address: 0x01,
            max_packet_size: 64,
        },
    }
}
