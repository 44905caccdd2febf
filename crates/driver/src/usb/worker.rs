//! USB worker thread
//!
//! Dedicated thread that owns the libusb context. It runs the libusb event
//! loop, turns hot-plug notifications into attach/detach calls on the shared
//! [`LifecycleManager`], and answers commands from the Tokio runtime.
//!
//! Hot-plug callbacks only queue notifications; the attach work (opening the
//! device, claiming the interface) happens afterwards on this thread, outside
//! libusb's callback.

use crate::usb::device::{RusbInterface, find_led_interfaces};
use crate::usb::lifecycle::LifecycleManager;
use crate::usb::matcher::{LED_PRODUCT_ID, LED_VENDOR_ID};
use crate::usb::transport::UsbInterface;
use common::{InterfaceKey, UsbCommand, UsbEvent, UsbWorker};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// libusb event loop timeout; bounds command latency
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Rescan interval when libusb has no hot-plug support
const POLL_INTERVAL: Duration = Duration::from_secs(1);

enum HotplugEvent {
    Arrived(Device<Context>),
    Left { bus: u8, address: u8 },
}

type PendingEvents = Arc<Mutex<VecDeque<HotplugEvent>>>;

/// Interfaces whose attach failed
///
/// Rescans skip them until the device leaves, so a device that cannot be
/// attached is reported once rather than on every poll.
#[derive(Debug, Default)]
struct FailedAttachments(BTreeSet<InterfaceKey>);

impl FailedAttachments {
    fn contains(&self, key: InterfaceKey) -> bool {
        self.0.contains(&key)
    }

    fn insert(&mut self, key: InterfaceKey) {
        self.0.insert(key);
    }

    fn remove(&mut self, key: InterfaceKey) {
        self.0.remove(&key);
    }

    /// Forget interfaces no longer on the bus
    fn retain_present(&mut self, present: &BTreeSet<InterfaceKey>) {
        self.0.retain(|key| present.contains(key));
    }

    fn forget_device(&mut self, bus: u8, address: u8) {
        self.0.retain(|key| key.bus != bus || key.address != address);
    }
}

/// USB worker thread
pub struct UsbWorkerThread {
    context: Context,
    manager: Arc<LifecycleManager>,
    worker: UsbWorker,
    pending: PendingEvents,
    hotplug_registration: Option<Registration<Context>>,
    failed: FailedAttachments,
}

impl UsbWorkerThread {
    /// Create the worker and register for hot-plug notifications
    ///
    /// Devices already connected are reported as arrivals on the first loop
    /// iteration.
    pub fn new(worker: UsbWorker, manager: Arc<LifecycleManager>) -> Result<Self, rusb::Error> {
        let context = Context::new()?;
        let pending: PendingEvents = Arc::new(Mutex::new(VecDeque::new()));

        let registration = if rusb::has_hotplug() {
            let callback = HotplugCallback {
                pending: Arc::clone(&pending),
            };
            let registration = HotplugBuilder::new()
                .vendor_id(LED_VENDOR_ID)
                .product_id(LED_PRODUCT_ID)
                .enumerate(true)
                .register(&context, Box::new(callback))?;
            debug!("Hot-plug callbacks registered");
            Some(registration)
        } else {
            warn!(
                "libusb has no hot-plug support, polling every {:?}",
                POLL_INTERVAL
            );
            None
        };

        Ok(Self {
            context,
            manager,
            worker,
            pending,
            hotplug_registration: registration,
            failed: FailedAttachments::default(),
        })
    }

    /// Run the event loop until a Shutdown command arrives
    ///
    /// Every device still attached is detached before returning.
    pub fn run(mut self) -> Result<(), rusb::Error> {
        info!("USB worker thread started");

        let mut last_scan: Option<Instant> = None;

        loop {
            match self.worker.try_recv_command() {
                Some(UsbCommand::Shutdown) => {
                    info!("USB worker shutting down");
                    break;
                }
                Some(cmd) => self.handle_command(cmd),
                None => {}
            }

            match self.context.handle_events(Some(EVENT_TIMEOUT)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(e) => {
                    warn!("Error handling USB events: {}", e);
                    std::thread::sleep(EVENT_TIMEOUT);
                }
            }

            if self.hotplug_registration.is_none()
                && last_scan.is_none_or(|at| at.elapsed() >= POLL_INTERVAL)
            {
                self.rescan();
                last_scan = Some(Instant::now());
            }

            self.process_pending();
        }

        for key in self.manager.detach_all() {
            self.send_event(UsbEvent::DeviceDetached { key });
        }

        info!("USB worker thread stopped");
        Ok(())
    }

    fn handle_command(&mut self, cmd: UsbCommand) {
        match cmd {
            UsbCommand::ListAttached { response } => {
                let devices = self.manager.attached();
                debug!("Listing {} attached devices", devices.len());
                let _ = response.send(devices);
            }
            UsbCommand::Shutdown => {
                // Handled in the main loop
            }
        }
    }

    /// Apply queued hot-plug notifications
    fn process_pending(&mut self) {
        let events: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for event in events {
            match event {
                HotplugEvent::Arrived(device) => self.attach_device(device),
                HotplugEvent::Left { bus, address } => self.detach_device(bus, address),
            }
        }
    }

    /// Poll for arrivals and departures without hot-plug support
    fn rescan(&mut self) {
        let interfaces = match find_led_interfaces(&self.context) {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!("Failed to enumerate USB devices: {}", e);
                return;
            }
        };

        let present: BTreeSet<_> = interfaces.iter().map(|i| i.key()).collect();
        self.failed.retain_present(&present);

        for device in self.manager.attached() {
            if !present.contains(&device.key) {
                self.detach_device(device.key.bus, device.key.address);
            }
        }

        for interface in interfaces {
            let key = interface.key();
            if self.manager.context(key).is_none() && !self.failed.contains(key) {
                self.attach_interface(&interface);
            }
        }
    }

    fn attach_device(&mut self, device: Device<Context>) {
        debug!(
            "Device arrived (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );

        match RusbInterface::interfaces_of(device) {
            Ok(interfaces) => {
                for interface in interfaces {
                    self.attach_interface(&interface);
                }
            }
            Err(e) => warn!("Failed to read configuration of arrived device: {}", e),
        }
    }

    fn attach_interface(&mut self, interface: &RusbInterface<Context>) {
        let key = interface.key();

        match self.manager.attach(interface) {
            Ok(key) => {
                self.failed.remove(key);
                self.send_event(UsbEvent::DeviceAttached {
                    key,
                    vendor_id: interface.vendor_id(),
                    product_id: interface.product_id(),
                });
            }
            Err(e) => {
                warn!("Failed to attach {}: {}", key, e);
                self.failed.insert(key);
                self.send_event(UsbEvent::AttachFailed {
                    key,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn detach_device(&mut self, bus: u8, address: u8) {
        debug!("Device left (bus={}, addr={})", bus, address);
        self.failed.forget_device(bus, address);

        for key in self.manager.detach_device(bus, address) {
            self.send_event(UsbEvent::DeviceDetached { key });
        }
    }

    fn send_event(&self, event: UsbEvent) {
        if let Err(e) = self.worker.send_event(event) {
            debug!("Dropping USB event, runtime gone: {}", e);
        }
    }
}

/// Queues hot-plug notifications for the worker loop
struct HotplugCallback {
    pending: PendingEvents,
}

impl HotplugCallback {
    fn push(&self, event: HotplugEvent) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        self.push(HotplugEvent::Arrived(device));
    }

    fn device_left(&mut self, device: Device<Context>) {
        self.push(HotplugEvent::Left {
            bus: device.bus_number(),
            address: device.address(),
        });
    }
}

/// Spawn the USB worker thread
///
/// The thread runs until a Shutdown command is received or libusb fails to
/// initialize.
pub fn spawn_usb_worker(
    worker: UsbWorker,
    manager: Arc<LifecycleManager>,
) -> std::io::Result<std::thread::JoinHandle<Result<(), rusb::Error>>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let worker_thread = UsbWorkerThread::new(worker, manager).inspect_err(|e| {
                error!("Failed to start USB worker: {}", e);
            })?;
            worker_thread.run()
        })
}
