//! Attribute host
//!
//! The mechanism that makes attributes visible to the outside world is an
//! external collaborator. The lifecycle only tells it which attributes to
//! expose for an interface and when to withdraw them.

use crate::error::LedError;
use crate::led::attributes::LedAttribute;
use common::InterfaceKey;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Creates and removes the control points of an attached interface
pub trait AttributeHost: Send + Sync {
    /// Make `attributes` visible for `key`
    fn expose(&self, key: InterfaceKey, attributes: &'static [LedAttribute])
    -> Result<(), LedError>;

    /// Remove previously exposed attributes for `key`
    fn withdraw(&self, key: InterfaceKey, attributes: &'static [LedAttribute]);
}

/// In-memory attribute host
///
/// Records which attributes are visible per interface. The daemon console
/// uses it to list control points.
#[derive(Debug, Default)]
pub struct AttributeDirectory {
    entries: Mutex<BTreeMap<InterfaceKey, Vec<&'static str>>>,
}

impl AttributeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute names visible for `key`
    pub fn exposed(&self, key: InterfaceKey) -> Vec<&'static str> {
        self.lock().get(&key).cloned().unwrap_or_default()
    }

    /// Interfaces with visible attributes, in key order
    pub fn keys(&self) -> Vec<InterfaceKey> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<InterfaceKey, Vec<&'static str>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttributeHost for AttributeDirectory {
    fn expose(
        &self,
        key: InterfaceKey,
        attributes: &'static [LedAttribute],
    ) -> Result<(), LedError> {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return Err(LedError::AttributeHost(format!(
                "attributes already exposed for {}",
                key
            )));
        }

        let names: Vec<_> = attributes.iter().map(|attr| attr.name).collect();
        debug!("Exposing {:?} for {}", names, key);
        entries.insert(key, names);
        Ok(())
    }

    fn withdraw(&self, key: InterfaceKey, attributes: &'static [LedAttribute]) {
        let mut entries = self.lock();
        if let Some(names) = entries.get_mut(&key) {
            names.retain(|name| !attributes.iter().any(|attr| attr.name == *name));
            if names.is_empty() {
                entries.remove(&key);
            }
            debug!("Withdrew attributes for {}", key);
        }
    }
}
