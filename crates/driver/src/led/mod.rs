//! LED control path
//!
//! Per-device state ([`DeviceContext`]), the read-modify-write of the cached
//! LED bitmask ([`LedController`]) and the `led1`/`led2`/`led3` attributes
//! that front it ([`LED_ATTRIBUTES`]).

pub mod attributes;
pub mod context;
pub mod controller;
pub mod host;

pub use attributes::{Caller, LED_ATTRIBUTES, LedAttribute, find_attribute};
pub use context::DeviceContext;
pub use controller::{CachePolicy, LedController};
pub use host::{AttributeDirectory, AttributeHost};
