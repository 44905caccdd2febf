//! Bulk endpoint discovery
//!
//! Scans the endpoint descriptors of the claimed interface's active alternate
//! setting and selects the first bulk IN and the first bulk OUT endpoint, in
//! descriptor order.

use crate::error::LedError;
use rusb::{Direction, EndpointDescriptor, TransferType};
use tracing::debug;

/// Endpoint descriptor fields the driver cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint address, direction bit included
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
    /// wMaxPacketSize
    pub max_packet_size: u16,
}

impl EndpointInfo {
    pub fn new(
        address: u8,
        direction: Direction,
        transfer_type: TransferType,
        max_packet_size: u16,
    ) -> Self {
        Self {
            address,
            direction,
            transfer_type,
            max_packet_size,
        }
    }

    /// Copy the relevant fields out of a libusb endpoint descriptor
    pub fn from_descriptor(descriptor: &EndpointDescriptor<'_>) -> Self {
        Self {
            address: descriptor.address(),
            direction: descriptor.direction(),
            transfer_type: descriptor.transfer_type(),
            max_packet_size: descriptor.max_packet_size(),
        }
    }

    fn is_bulk(&self, direction: Direction) -> bool {
        self.direction == direction && self.transfer_type == TransferType::Bulk
    }
}

/// A selected endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
    pub max_packet_size: u16,
}

impl From<&EndpointInfo> for Endpoint {
    fn from(info: &EndpointInfo) -> Self {
        Self {
            address: info.address,
            max_packet_size: info.max_packet_size,
        }
    }
}

/// Bulk endpoint pair chosen at attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub bulk_in: Endpoint,
    pub bulk_out: Endpoint,
}

/// Select the first bulk IN and first bulk OUT endpoint
///
/// Scanning stops as soon as both are found. Fails with
/// [`LedError::EndpointDiscovery`] if either is missing.
pub fn resolve_endpoints(endpoints: &[EndpointInfo]) -> Result<ResolvedEndpoints, LedError> {
    let mut bulk_in: Option<Endpoint> = None;
    let mut bulk_out: Option<Endpoint> = None;

    for endpoint in endpoints {
        if bulk_in.is_none() && endpoint.is_bulk(Direction::In) {
            debug!(
                "Found bulk IN endpoint {:#04x} (max packet {})",
                endpoint.address, endpoint.max_packet_size
            );
            bulk_in = Some(endpoint.into());
        }

        if bulk_out.is_none() && endpoint.is_bulk(Direction::Out) {
            debug!("Found bulk OUT endpoint {:#04x}", endpoint.address);
            bulk_out = Some(endpoint.into());
        }

        if bulk_in.is_some() && bulk_out.is_some() {
            break;
        }
    }

    match (bulk_in, bulk_out) {
        (Some(bulk_in), Some(bulk_out)) => Ok(ResolvedEndpoints { bulk_in, bulk_out }),
        (bulk_in, bulk_out) => Err(LedError::EndpointDiscovery {
            missing_in: bulk_in.is_none(),
            missing_out: bulk_out.is_none(),
        }),
    }
}
