use crate::filter::CapabilityFilter;
use crate::models::{Device, Reachability};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Immutable, ordered snapshot of the devices that matched a filter.
///
/// Entries keep registry insertion order and never repeat an identifier, so an
/// index taken from a rendered listing addresses the same device at commit time.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FilteredListing {
    devices: Vec<Device>,
}

impl FilteredListing {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[Device] {
        &self.devices
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }
}

impl<'a> IntoIterator for &'a FilteredListing {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

/// Authoritative store of the devices currently known on the network.
///
/// Every operation takes the lock exactly once, so a snapshot never mixes state
/// from before and after a concurrent `upsert` or `remove`.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Device>>,
}

/// Thread-safe handle to the registry shared by discovery, selection and the responder
pub type SharedDeviceRegistry = Arc<DeviceRegistry>;

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device or replace the entry with the same identifier in place.
    ///
    /// Returns `true` when the device was not known before.
    pub fn upsert(&self, device: Device) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);

        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => {
                debug!("Updated device: {} ({})", device.friendly_name, device.id);
                *existing = device;
                false
            }
            None => {
                debug!("Registered device: {} ({})", device.friendly_name, device.id);
                devices.push(device);
                true
            }
        }
    }

    /// Remove a device by identifier. Absent identifiers are ignored.
    pub fn remove(&self, id: &str) -> Option<Device> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let position = devices.iter().position(|d| d.id == id)?;
        let removed = devices.remove(position);
        debug!("Removed device: {} ({})", removed.friendly_name, removed.id);
        Some(removed)
    }

    /// Collect the devices matching `filter`, in insertion order, under one read lock
    pub fn filtered_snapshot(&self, filter: &CapabilityFilter) -> FilteredListing {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let matched: Vec<Device> = devices.iter().filter(|d| filter.matches(d)).cloned().collect();

        debug!(
            "Snapshot for {}: {} of {} device(s)",
            filter.describe(),
            matched.len(),
            devices.len()
        );

        FilteredListing { devices: matched }
    }

    pub fn get(&self, id: &str) -> Option<Device> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        devices.iter().find(|d| d.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `false` if the device is unknown
    pub fn set_reachability(&self, id: &str, reachability: Reachability) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        match devices.iter_mut().find(|d| d.id == id) {
            Some(device) => {
                device.reachability = reachability;
                true
            }
            None => false,
        }
    }

    /// Mark every device not in `seen` as stale and return the identifiers that changed
    pub fn mark_missing_stale(&self, seen: &HashSet<String>) -> Vec<String> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let mut changed = Vec::new();

        for device in devices.iter_mut() {
            if !seen.contains(&device.id) && device.reachability == Reachability::Alive {
                device.reachability = Reachability::Stale;
                changed.push(device.id.clone());
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, services: &[&str]) -> Device {
        Device::new(id, format!("Device {}", id)).with_services(services.iter().copied())
    }

    fn ids(listing: &FilteredListing) -> Vec<&str> {
        listing.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_accept_all_snapshot_keeps_insertion_order() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("c", &[]));
        registry.upsert(device("a", &[]));
        registry.upsert(device("b", &[]));

        let listing = registry.filtered_snapshot(&CapabilityFilter::accept_all());
        assert_eq!(ids(&listing), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let registry = DeviceRegistry::new();
        assert!(registry.upsert(device("a", &["AVTransport"])));
        assert!(registry.upsert(device("b", &[])));
        assert!(!registry.upsert(
            Device::new("a", "Renamed").with_services(["ContentDirectory"])
        ));

        let listing = registry.filtered_snapshot(&CapabilityFilter::accept_all());
        assert_eq!(ids(&listing), vec!["a", "b"]);
        assert_eq!(listing.get(0).unwrap().friendly_name, "Renamed");
        assert!(listing.get(0).unwrap().has_service("ContentDirectory"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("a", &[]));

        assert!(registry.remove("missing").is_none());
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove("a").map(|d| d.id), Some("a".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_readded_device_appends_at_end() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("a", &[]));
        registry.upsert(device("b", &[]));
        registry.remove("a");
        registry.upsert(device("a", &[]));

        let listing = registry.filtered_snapshot(&CapabilityFilter::accept_all());
        assert_eq!(ids(&listing), vec!["b", "a"]);
    }

    #[test]
    fn test_service_filter_snapshot() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("A", &["ContentDirectory"]));
        registry.upsert(device("B", &["RenderingControl"]));

        let listing = registry.filtered_snapshot(&CapabilityFilter::content_directory());
        assert_eq!(ids(&listing), vec!["A"]);
        assert!(listing.contains("A"));
        assert!(!listing.contains("B"));
    }

    #[test]
    fn test_empty_snapshot() {
        let registry = DeviceRegistry::new();
        assert!(registry.filtered_snapshot(&CapabilityFilter::accept_all()).is_empty());

        registry.upsert(device("B", &["RenderingControl"]));
        let listing = registry.filtered_snapshot(&CapabilityFilter::content_directory());
        assert!(listing.is_empty());
        assert_eq!(listing.len(), 0);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("a", &[]));

        let listing = registry.filtered_snapshot(&CapabilityFilter::accept_all());
        registry.upsert(device("b", &[]));
        registry.remove("a");

        assert_eq!(ids(&listing), vec!["a"]);
    }

    #[test]
    fn test_mark_missing_stale() {
        let registry = DeviceRegistry::new();
        registry.upsert(device("a", &[]));
        registry.upsert(device("b", &[]));

        let seen: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(registry.mark_missing_stale(&seen), vec!["b".to_string()]);
        assert_eq!(registry.get("b").unwrap().reachability, Reachability::Stale);
        assert!(registry.get("a").unwrap().is_alive());

        // Already stale devices are not reported twice
        assert!(registry.mark_missing_stale(&seen).is_empty());

        assert!(registry.set_reachability("b", Reachability::Alive));
        assert!(!registry.set_reachability("zzz", Reachability::Alive));
    }
}
