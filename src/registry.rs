// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Observed-device bookkeeping.
//!
//! The daemon announces devices repeatedly and in no particular order,
//! so the raw event stream is noisy. The registry turns it into a clean
//! feed: one found notification per newly paired device, one unpaired
//! notification when a paired device flips to unpaired or disappears.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, trace};

use crate::types::{Address, AddressCallback, SharedFilter};

/// Tracks every device the daemon has announced along with its paired
/// state.
pub(crate) struct DeviceRegistry {
    devices: HashMap<Address, bool>,
    filter: SharedFilter,
    on_unpaired: Option<AddressCallback>,
    found_sink: Option<AddressCallback>,
}

impl DeviceRegistry {
    pub(crate) fn new(filter: SharedFilter) -> Self {
        Self {
            devices: HashMap::new(),
            filter,
            on_unpaired: None,
            found_sink: None,
        }
    }

    /// Installs the callback notified when a paired device gets
    /// unpaired or vanishes. Active independently of discovery.
    pub(crate) fn set_unpaired_callback(&mut self, callback: AddressCallback) {
        self.on_unpaired = Some(callback);
    }

    /// Installs the sink notified about newly observed paired devices
    /// for the duration of a discovery session.
    pub(crate) fn set_found_sink(&mut self, sink: AddressCallback) {
        self.found_sink = Some(sink);
    }

    pub(crate) fn clear_found_sink(&mut self) {
        self.found_sink = None;
    }

    fn accepts(&self, address: Address) -> bool {
        match self.filter.lock().as_ref() {
            Some(filter) => filter(address),
            None => true,
        }
    }

    /// Records a device announcement or a paired-state change.
    pub(crate) fn observe(&mut self, address: Address, paired: bool) {
        let previous = self.devices.insert(address, paired);
        if paired {
            if previous == Some(true) {
                trace!("already knew paired device {}", address);
                return;
            }
            if !self.accepts(address) {
                debug!("ignoring paired device {}: filtered out", address);
                return;
            }
            if let Some(sink) = &self.found_sink {
                debug!("found new paired device {}", address);
                dispatch(sink, address);
            }
        } else if previous == Some(true) {
            self.notify_unpaired(address);
        }
    }

    /// Removes a device the daemon no longer exports.
    pub(crate) fn forget(&mut self, address: Address) {
        if self.devices.remove(&address) == Some(true) {
            self.notify_unpaired(address);
        }
    }

    /// Removes a device without any notification. Used by the explicit
    /// unpair path, where the caller already knows the device is gone.
    /// Returns whether the address was known.
    pub(crate) fn remove_silently(&mut self, address: Address) -> bool {
        self.devices.remove(&address).is_some()
    }

    /// Addresses currently recorded as paired, after filtering.
    pub(crate) fn paired_addresses(&self) -> HashSet<Address> {
        self.devices
            .iter()
            .filter(|(address, paired)| **paired && self.accepts(**address))
            .map(|(address, _)| *address)
            .collect()
    }

    fn notify_unpaired(&self, address: Address) {
        if !self.accepts(address) {
            return;
        }
        if let Some(callback) = &self.on_unpaired {
            debug!("device {} is no longer paired", address);
            dispatch(callback, address);
        }
    }
}

/// Invokes a host callback, keeping panics out of the worker loop.
fn dispatch(callback: &AddressCallback, address: Address) {
    if catch_unwind(AssertUnwindSafe(|| callback(address))).is_err() {
        error!("device callback panicked while handling {}", address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(Mutex::new(None)))
    }

    fn collector() -> (AddressCallback, Arc<Mutex<Vec<Address>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: AddressCallback = Arc::new(move |address| sink.lock().push(address));
        (callback, seen)
    }

    fn addr(text: &str) -> Address {
        text.parse().unwrap()
    }

    #[test]
    fn test_paired_device_reported_once() {
        let mut registry = registry();
        let (found, seen) = collector();
        registry.set_found_sink(found);

        let device = addr("AA:BB:CC:11:22:33");
        registry.observe(device, true);
        registry.observe(device, true);

        assert_eq!(*seen.lock(), vec![device]);
    }

    #[test]
    fn test_unpair_transition_reported_once() {
        let mut registry = registry();
        let (found, found_seen) = collector();
        let (unpaired, unpaired_seen) = collector();
        registry.set_found_sink(found);
        registry.set_unpaired_callback(unpaired);

        let device = addr("AA:BB:CC:11:22:33");
        registry.observe(device, true);
        registry.observe(device, false);
        registry.observe(device, false);

        assert_eq!(*found_seen.lock(), vec![device]);
        assert_eq!(*unpaired_seen.lock(), vec![device]);
    }

    #[test]
    fn test_device_found_again_after_unpairing() {
        let mut registry = registry();
        let (found, seen) = collector();
        registry.set_found_sink(found);

        let device = addr("AA:BB:CC:11:22:33");
        registry.observe(device, true);
        registry.observe(device, false);
        registry.observe(device, true);

        assert_eq!(*seen.lock(), vec![device, device]);
    }

    #[test]
    fn test_filter_rejects_devices() {
        let filter: SharedFilter = Arc::new(Mutex::new(Some(crate::types::prefix_filter([
            0xAA, 0xBB, 0xCC,
        ]))));
        let mut registry = DeviceRegistry::new(filter);
        let (found, seen) = collector();
        registry.set_found_sink(found);

        registry.observe(addr("AA:BB:CC:01:02:03"), true);
        registry.observe(addr("11:22:33:04:05:06"), true);

        assert_eq!(*seen.lock(), vec![addr("AA:BB:CC:01:02:03")]);
    }

    #[test]
    fn test_filter_gates_unpaired_notifications() {
        let filter: SharedFilter = Arc::new(Mutex::new(Some(crate::types::prefix_filter([
            0xAA, 0xBB, 0xCC,
        ]))));
        let mut registry = DeviceRegistry::new(filter);
        let (unpaired, seen) = collector();
        registry.set_unpaired_callback(unpaired);

        let other = addr("11:22:33:04:05:06");
        registry.observe(other, true);
        registry.observe(other, false);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_removed_paired_device_reports_unpaired() {
        let mut registry = registry();
        let (unpaired, seen) = collector();
        registry.set_unpaired_callback(unpaired);

        let device = addr("AA:BB:CC:11:22:33");
        registry.observe(device, true);
        registry.forget(device);
        registry.forget(device);

        assert_eq!(*seen.lock(), vec![device]);
    }

    #[test]
    fn test_silent_removal_skips_callbacks() {
        let mut registry = registry();
        let (unpaired, seen) = collector();
        registry.set_unpaired_callback(unpaired);

        let device = addr("AA:BB:CC:11:22:33");
        registry.observe(device, true);
        assert!(registry.remove_silently(device));
        assert!(!registry.remove_silently(device));

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_paired_addresses_follow_observations() {
        let mut registry = registry();
        let first = addr("AA:BB:CC:11:22:33");
        let second = addr("AA:BB:CC:44:55:66");

        registry.observe(first, true);
        registry.observe(second, true);
        registry.observe(second, false);
        registry.observe(addr("AA:BB:CC:77:88:99"), false);

        let expected: HashSet<Address> = [first].into_iter().collect();
        assert_eq!(registry.paired_addresses(), expected);
    }

    #[test]
    fn test_no_found_notification_without_sink() {
        let mut registry = registry();
        let (unpaired, seen) = collector();
        registry.set_unpaired_callback(unpaired);

        registry.observe(addr("AA:BB:CC:11:22:33"), true);
        assert!(seen.lock().is_empty());
        assert_eq!(registry.paired_addresses().len(), 1);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let mut registry = registry();
        registry.set_found_sink(Arc::new(|_| panic!("host callback blew up")));

        registry.observe(addr("AA:BB:CC:11:22:33"), true);
        assert_eq!(registry.paired_addresses().len(), 1);
    }
}
