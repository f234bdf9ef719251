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

//! BlueZ adapter observation and control.
//!
//! A monitor task follows the adapter's device lifecycle events and
//! keeps the [`DeviceRegistry`] current, with one small watcher task per
//! known device following its paired state. The monitor runs for the
//! whole lifetime of the manager, not just during discovery, so that
//! unpairing is detected at any time.

use std::collections::HashMap;
use std::sync::Arc;

use bluer::{Adapter, AdapterEvent, DeviceEvent, DeviceProperty, Session};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;
use crate::types::Address;

/// Wraps the default adapter: device observation, scan control, unpair
/// and name lookup.
pub(crate) struct AdapterClient {
    adapter: Adapter,
    registry: Arc<Mutex<DeviceRegistry>>,
    monitor: JoinHandle<()>,
    scan: Option<JoinHandle<()>>,
}

impl AdapterClient {
    /// Resolves the default adapter, powers it on and starts observing
    /// device lifecycle events.
    pub(crate) async fn setup(
        session: &Session,
        registry: Arc<Mutex<DeviceRegistry>>,
    ) -> Result<Self> {
        let adapter = session.default_adapter().await?;
        debug!("using Bluetooth adapter {}", adapter.name());

        if !adapter.is_powered().await? {
            debug!("powering on Bluetooth adapter");
            adapter.set_powered(true).await?;
        }

        let monitor = tokio::spawn(monitor_events(adapter.clone(), registry.clone()));

        Ok(Self {
            adapter,
            registry,
            monitor,
            scan: None,
        })
    }

    /// Feeds every device the daemon currently exports through the same
    /// path as a freshly announced one. Safe to repeat; the registry
    /// deduplicates.
    pub(crate) async fn sweep_known_devices(&self) {
        let addresses = match self.adapter.device_addresses().await {
            Ok(addresses) => addresses,
            Err(err) => {
                warn!("could not enumerate known devices: {}", err);
                return;
            }
        };
        for address in addresses {
            observe_device(&self.adapter, &self.registry, address).await;
        }
    }

    /// Starts daemon-side scanning. The discovery stream is parked in a
    /// drain task; dropping that stream ends the scan.
    pub(crate) async fn start_scan(&mut self) -> Result<()> {
        if self.scan.is_some() {
            debug!("discovery scan already running");
            return Ok(());
        }
        let mut stream = self.adapter.discover_devices().await?;
        self.scan = Some(tokio::spawn(async move {
            // Device events are handled by the monitor task; this task
            // only keeps the discovery session alive.
            while stream.next().await.is_some() {}
        }));
        debug!("discovery scan started");
        Ok(())
    }

    /// Stops scanning. Nothing to report if the scan already ended on
    /// the daemon side.
    pub(crate) fn stop_scan(&mut self) {
        if let Some(task) = self.scan.take() {
            task.abort();
            debug!("discovery scan stopped");
        }
    }

    /// Unpairs a device by removing it from the daemon. Unknown
    /// addresses are a silent no-op.
    pub(crate) async fn remove_device(&self, address: Address) -> Result<()> {
        let known = self.registry.lock().remove_silently(address);
        if !known {
            debug!("no device with address {} known, nothing to remove", address);
            return Ok(());
        }
        self.adapter.remove_device(address).await?;
        debug!("removed device {} from the adapter", address);
        Ok(())
    }

    /// Friendly name of the adapter.
    pub(crate) async fn friendly_name(&self) -> Result<String> {
        self.adapter.alias().await.map_err(|err| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("adapter has no readable name: {}", err),
            ))
        })
    }

    pub(crate) fn shutdown(&mut self) {
        self.stop_scan();
        self.monitor.abort();
    }
}

impl Drop for AdapterClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reads the paired state of an announced device and records it.
async fn observe_device(
    adapter: &Adapter,
    registry: &Arc<Mutex<DeviceRegistry>>,
    address: Address,
) {
    let device = match adapter.device(address) {
        Ok(device) => device,
        Err(err) => {
            warn!("could not open device {}: {}", address, err);
            return;
        }
    };
    let paired = match device.is_paired().await {
        Ok(paired) => paired,
        Err(err) => {
            warn!("could not read paired state of {}: {}", address, err);
            return;
        }
    };
    trace!("observed device {} (paired: {})", address, paired);
    registry.lock().observe(address, paired);
}

/// Follows the adapter's device lifecycle events for the lifetime of
/// the manager.
async fn monitor_events(adapter: Adapter, registry: Arc<Mutex<DeviceRegistry>>) {
    // Subscribe before the initial sweep so devices appearing in
    // between are not lost.
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(err) => {
            warn!("could not subscribe to adapter events: {}", err);
            return;
        }
    };

    let mut watchers: HashMap<Address, JoinHandle<()>> = HashMap::new();

    if let Ok(addresses) = adapter.device_addresses().await {
        for address in addresses {
            observe_device(&adapter, &registry, address).await;
            watchers
                .entry(address)
                .or_insert_with(|| spawn_watcher(&adapter, &registry, address));
        }
    }

    while let Some(event) = events.next().await {
        match event {
            AdapterEvent::DeviceAdded(address) => {
                observe_device(&adapter, &registry, address).await;
                watchers
                    .entry(address)
                    .or_insert_with(|| spawn_watcher(&adapter, &registry, address));
            }
            AdapterEvent::DeviceRemoved(address) => {
                if let Some(watcher) = watchers.remove(&address) {
                    watcher.abort();
                }
                registry.lock().forget(address);
            }
            AdapterEvent::PropertyChanged(_) => {}
        }
    }

    for watcher in watchers.values() {
        watcher.abort();
    }
    trace!("adapter event stream ended");
}

fn spawn_watcher(
    adapter: &Adapter,
    registry: &Arc<Mutex<DeviceRegistry>>,
    address: Address,
) -> JoinHandle<()> {
    tokio::spawn(watch_device(adapter.clone(), registry.clone(), address))
}

/// Follows paired-state changes of a single device.
async fn watch_device(adapter: Adapter, registry: Arc<Mutex<DeviceRegistry>>, address: Address) {
    let device = match adapter.device(address) {
        Ok(device) => device,
        Err(_) => return,
    };
    let mut events = match device.events().await {
        Ok(events) => events,
        Err(err) => {
            warn!("could not subscribe to events of {}: {}", address, err);
            return;
        }
    };
    while let Some(DeviceEvent::PropertyChanged(property)) = events.next().await {
        if let DeviceProperty::Paired(paired) = property {
            registry.lock().observe(address, paired);
        }
    }
}
