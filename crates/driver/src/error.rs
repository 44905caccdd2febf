//! Driver error types

use common::InterfaceKey;
use protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by attach/detach and attribute operations
#[derive(Debug, Error)]
pub enum LedError {
    /// Bulk-in buffer could not be allocated during attach
    #[error("Failed to allocate {size}-byte bulk-in buffer")]
    Allocation { size: usize },

    /// Interface lacks a bulk IN or bulk OUT endpoint
    #[error("Endpoint discovery failed: {}", missing_endpoints(.missing_in, .missing_out))]
    EndpointDiscovery { missing_in: bool, missing_out: bool },

    /// Attribute write payload is not a literal 0 or 1
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ProtocolError),

    /// Bulk transfer failed or was short
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Vendor/product pair is not in the device table
    #[error("Unsupported device {vendor_id:04x}:{product_id:04x}")]
    UnsupportedDevice { vendor_id: u16, product_id: u16 },

    /// Interface already has a device context
    #[error("Interface {0} is already attached")]
    AlreadyAttached(InterfaceKey),

    /// Interface has no device context
    #[error("Interface {0} is not attached")]
    NotAttached(InterfaceKey),

    /// Attribute name is not one of led1, led2, led3
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Caller may not write the attribute
    #[error("Permission denied writing attribute {0}")]
    PermissionDenied(String),

    /// Attribute host refused to expose the control points
    #[error("Attribute host error: {0}")]
    AttributeHost(String),

    /// Host USB subsystem error (open, claim, descriptor read)
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

/// Bulk OUT transfer failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Bulk OUT transfer to endpoint {endpoint:#04x} failed: {source}")]
    Failed {
        endpoint: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Short bulk OUT write to endpoint {endpoint:#04x}: {written} of {expected} bytes")]
    ShortWrite {
        endpoint: u8,
        written: usize,
        expected: usize,
    },
}

fn missing_endpoints(missing_in: &bool, missing_out: &bool) -> &'static str {
    match (*missing_in, *missing_out) {
        (true, true) => "no bulk IN or bulk OUT endpoint",
        (true, false) => "no bulk IN endpoint",
        (false, true) => "no bulk OUT endpoint",
        (false, false) => "endpoints incomplete",
    }
}

pub type Result<T> = std::result::Result<T, LedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_discovery_display() {
        let err = LedError::EndpointDiscovery {
            missing_in: false,
            missing_out: true,
        };
        assert_eq!(
            err.to_string(),
            "Endpoint discovery failed: no bulk OUT endpoint"
        );
    }

    #[test]
    fn test_transport_display() {
        let err = TransportError::ShortWrite {
            endpoint: 0x01,
            written: 0,
            expected: 1,
        };
        assert!(err.to_string().contains("0 of 1 bytes"));

        let err: LedError = TransportError::Failed {
            endpoint: 0x02,
            source: rusb::Error::Timeout,
        }
        .into();
        assert!(err.to_string().contains("0x02"));
    }

    #[test]
    fn test_invalid_argument_from_protocol() {
        let err: LedError = protocol::parse_switch("2").unwrap_err().into();
        assert!(matches!(err, LedError::InvalidArgument(_)));
    }
}
