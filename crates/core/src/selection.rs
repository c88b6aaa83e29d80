use crate::filter::CapabilityFilter;
use crate::models::Device;
use crate::registry::{FilteredListing, SharedDeviceRegistry};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Completion notification fired once when a selection is committed
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The index does not address an entry of the presented listing
    #[error("selection index {index} out of range for listing of {len} device(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no selection in progress")]
    NotPresenting,
}

/// Where the protocol is within a selection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Presenting,
}

enum Completion {
    Callback(CompletionCallback),
    Channel(oneshot::Sender<Device>),
}

impl Completion {
    fn fire(self, device: &Device) {
        match self {
            Completion::Callback(callback) => callback(),
            Completion::Channel(tx) => {
                // Receiver may have been dropped by a caller that stopped waiting
                let _ = tx.send(device.clone());
            }
        }
    }
}

enum Cycle {
    Idle,
    Presenting {
        listing: FilteredListing,
        on_complete: Completion,
    },
}

struct SelectionState {
    selected: Option<Device>,
    cycle: Cycle,
}

/// Turns a filtered snapshot plus a user pick into one committed device.
///
/// A cycle starts with [`begin_selection`](Self::begin_selection) and ends with
/// exactly one of [`commit`](Self::commit) or [`cancel`](Self::cancel). The
/// listing is frozen when the cycle starts, so the index the user picked always
/// refers to the device they were shown. Starting a new cycle while one is
/// presenting supersedes it: the earlier notification is dropped unfired.
pub struct SelectionProtocol {
    registry: SharedDeviceRegistry,
    state: Mutex<SelectionState>,
}

impl SelectionProtocol {
    pub fn new(registry: SharedDeviceRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(SelectionState {
                selected: None,
                cycle: Cycle::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot the registry through `filter` and start presenting it
    pub fn begin_selection<F>(&self, filter: &CapabilityFilter, on_complete: F) -> FilteredListing
    where
        F: FnOnce() + Send + 'static,
    {
        self.start_cycle(filter, Completion::Callback(Box::new(on_complete)))
    }

    /// Like [`begin_selection`](Self::begin_selection), but resolves a channel instead of calling back.
    ///
    /// The receiver yields the committed device. It errors once the cycle is
    /// cancelled or superseded, because the sender is dropped with the cycle.
    pub fn begin_selection_awaitable(
        &self,
        filter: &CapabilityFilter,
    ) -> (FilteredListing, oneshot::Receiver<Device>) {
        let (tx, rx) = oneshot::channel();
        let listing = self.start_cycle(filter, Completion::Channel(tx));
        (listing, rx)
    }

    fn start_cycle(
        &self,
        filter: &CapabilityFilter,
        on_complete: Completion,
    ) -> FilteredListing {
        // Registry lock is released before the protocol lock is taken
        let listing = self.registry.filtered_snapshot(filter);

        let mut state = self.lock();
        if matches!(state.cycle, Cycle::Presenting { .. }) {
            debug!("Superseding selection cycle still in progress");
        }
        state.cycle = Cycle::Presenting {
            listing: listing.clone(),
            on_complete,
        };
        drop(state);

        debug!(
            "Presenting {} device(s) for {}",
            listing.len(),
            filter.describe()
        );
        listing
    }

    /// Commit the device at `index` of the presented listing.
    ///
    /// On success the device becomes the active selection, the notification
    /// fires once and the protocol returns to idle. An out-of-range index leaves
    /// the cycle presenting so the caller can retry or cancel.
    pub fn commit(&self, index: usize) -> Result<Device, SelectionError> {
        let mut state = self.lock();

        let device = match &state.cycle {
            Cycle::Idle => return Err(SelectionError::NotPresenting),
            Cycle::Presenting { listing, .. } => listing
                .get(index)
                .cloned()
                .ok_or(SelectionError::IndexOutOfRange {
                    index,
                    len: listing.len(),
                })?,
        };

        let on_complete = match std::mem::replace(&mut state.cycle, Cycle::Idle) {
            Cycle::Presenting { on_complete, .. } => Some(on_complete),
            Cycle::Idle => None,
        };
        state.selected = Some(device.clone());
        drop(state);

        info!("Selected device: {} ({})", device.friendly_name, device.id);

        if let Some(completion) = on_complete {
            completion.fire(&device);
        }

        Ok(device)
    }

    /// Dismiss the presented listing without choosing anything
    pub fn cancel(&self) -> Result<(), SelectionError> {
        let mut state = self.lock();
        if !matches!(state.cycle, Cycle::Presenting { .. }) {
            return Err(SelectionError::NotPresenting);
        }
        state.cycle = Cycle::Idle;
        drop(state);

        debug!("Selection cancelled");
        Ok(())
    }

    pub fn phase(&self) -> SelectionPhase {
        match self.lock().cycle {
            Cycle::Idle => SelectionPhase::Idle,
            Cycle::Presenting { .. } => SelectionPhase::Presenting,
        }
    }

    pub fn is_presenting(&self) -> bool {
        self.phase() == SelectionPhase::Presenting
    }

    /// The listing of the cycle in progress, if any
    pub fn current_listing(&self) -> Option<FilteredListing> {
        match &self.lock().cycle {
            Cycle::Idle => None,
            Cycle::Presenting { listing, .. } => Some(listing.clone()),
        }
    }

    /// The committed device, as it looked when it was picked
    pub fn selected(&self) -> Option<Device> {
        self.lock().selected.clone()
    }

    pub fn clear_selection(&self) -> Option<Device> {
        self.lock().selected.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry_with_a_and_b() -> SharedDeviceRegistry {
        let registry = Arc::new(DeviceRegistry::new());
        registry.upsert(Device::new("A", "Media Server").with_services(["ContentDirectory"]));
        registry.upsert(Device::new("B", "Television").with_services(["RenderingControl"]));
        registry
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_commit_fires_once_and_selects() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        let (fired, callback) = counter();

        let listing = protocol.begin_selection(&CapabilityFilter::content_directory(), callback);
        assert_eq!(listing.len(), 1);
        assert!(protocol.is_presenting());

        let device = protocol.commit(0).unwrap();
        assert_eq!(device.id, "A");
        assert_eq!(protocol.selected().map(|d| d.id), Some("A".to_string()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(protocol.phase(), SelectionPhase::Idle);

        // Protocol is idle again, a second commit is rejected and fires nothing
        assert_eq!(protocol.commit(0), Err(SelectionError::NotPresenting));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_commit_keeps_presenting() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        let (fired, callback) = counter();

        protocol.begin_selection(&CapabilityFilter::accept_all(), callback);
        assert_eq!(
            protocol.commit(2),
            Err(SelectionError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert!(protocol.is_presenting());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(protocol.selected().is_none());

        // A corrected index still works
        assert_eq!(protocol.commit(1).unwrap().id, "B");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_fires_nothing() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        let (fired, callback) = counter();

        protocol.begin_selection(&CapabilityFilter::accept_all(), callback);
        protocol.cancel().unwrap();

        assert_eq!(protocol.phase(), SelectionPhase::Idle);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(protocol.current_listing().is_none());
        assert_eq!(protocol.cancel(), Err(SelectionError::NotPresenting));
    }

    #[test]
    fn test_late_cancel_does_not_undo_commit() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        protocol.begin_selection(&CapabilityFilter::accept_all(), || {});
        protocol.commit(0).unwrap();

        assert_eq!(protocol.cancel(), Err(SelectionError::NotPresenting));
        assert_eq!(protocol.selected().map(|d| d.id), Some("A".to_string()));
    }

    #[test]
    fn test_new_cycle_supersedes_previous() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        let (first, first_callback) = counter();
        let (second, second_callback) = counter();

        protocol.begin_selection(&CapabilityFilter::accept_all(), first_callback);
        protocol.begin_selection(&CapabilityFilter::renderer(), second_callback);

        let device = protocol.commit(0).unwrap();
        assert_eq!(device.id, "B");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listing_is_frozen_against_registry_changes() {
        let registry = registry_with_a_and_b();
        let protocol = SelectionProtocol::new(registry.clone());

        protocol.begin_selection(&CapabilityFilter::accept_all(), || {});
        registry.remove("A");
        registry.upsert(Device::new("C", "Late Arrival"));

        assert_eq!(protocol.current_listing().unwrap().len(), 2);
        assert_eq!(protocol.commit(0).unwrap().id, "A");
    }

    #[test]
    fn test_empty_listing_rejects_every_index() {
        let protocol = SelectionProtocol::new(Arc::new(DeviceRegistry::new()));
        let listing = protocol.begin_selection(&CapabilityFilter::content_directory(), || {});

        assert!(listing.is_empty());
        assert_eq!(
            protocol.commit(0),
            Err(SelectionError::IndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_clear_selection() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        protocol.begin_selection(&CapabilityFilter::accept_all(), || {});
        protocol.commit(1).unwrap();

        assert_eq!(protocol.clear_selection().map(|d| d.id), Some("B".to_string()));
        assert!(protocol.selected().is_none());
    }

    #[tokio::test]
    async fn test_awaitable_selection_resolves_on_commit() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());
        let (listing, rx) = protocol.begin_selection_awaitable(&CapabilityFilter::renderer());
        assert_eq!(listing.len(), 1);

        protocol.commit(0).unwrap();
        assert_eq!(rx.await.unwrap().id, "B");
    }

    #[tokio::test]
    async fn test_awaitable_selection_errors_on_cancel_and_supersede() {
        let protocol = SelectionProtocol::new(registry_with_a_and_b());

        let (_, cancelled) = protocol.begin_selection_awaitable(&CapabilityFilter::accept_all());
        protocol.cancel().unwrap();
        assert!(cancelled.await.is_err());

        let (_, superseded) = protocol.begin_selection_awaitable(&CapabilityFilter::accept_all());
        protocol.begin_selection(&CapabilityFilter::accept_all(), || {});
        assert!(superseded.await.is_err());
    }
}
