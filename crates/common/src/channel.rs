//! Async channel bridge between Tokio runtime and USB thread

use crate::usb_types::{AttachedDevice, InterfaceKey};
use async_channel::{Receiver, Sender, bounded};

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum UsbCommand {
    /// List all attached LED devices
    ListAttached {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<AttachedDevice>>,
    },

    /// Shutdown the USB thread gracefully, detaching every device
    Shutdown,
}

/// Lifecycle events from the USB thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbEvent {
    /// A matching device was attached and its LED attributes exposed
    DeviceAttached {
        /// Interface the driver bound to
        key: InterfaceKey,
        /// USB Vendor ID
        vendor_id: u16,
        /// USB Product ID
        product_id: u16,
    },

    /// A device was detached and its LED attributes withdrawn
    DeviceDetached {
        /// Interface that went away
        key: InterfaceKey,
    },

    /// A matching device arrived but could not be attached
    AttachFailed {
        /// Interface that failed to attach
        key: InterfaceKey,
        /// Human-readable failure reason
        reason: String,
    },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct UsbBridge {
    cmd_tx: Sender<UsbCommand>,
    event_rx: Receiver<UsbEvent>,
}

impl UsbBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: UsbCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the USB thread
    pub async fn recv_event(&self) -> crate::Result<UsbEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for USB thread (blocking)
pub struct UsbWorker {
    pub(crate) cmd_rx: Receiver<UsbCommand>,
    /// Event sender (public for USB worker thread to access)
    pub event_tx: Sender<UsbEvent>,
}

impl UsbWorker {
    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<UsbCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Send an event to Tokio runtime (blocking)
    pub fn send_event(&self, event: UsbEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (UsbBridge for Tokio, UsbWorker for USB thread)
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (cmd_tx, cmd_rx) = bounded(64);
    let (event_tx, event_rx) = bounded(64);

    (
        UsbBridge { cmd_tx, event_rx },
        UsbWorker { cmd_rx, event_tx },
    )
}
