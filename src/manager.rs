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

//! Public entry point.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::device::BluetoothDevice;
use crate::discovery::DiscoveryParams;
use crate::error::Result;
use crate::event_loop::{Command, EventLoop};
use crate::types::{Address, DeviceFilter, DiscoveryStopReason};

/// Entry point to the library.
///
/// Owns the daemon session, the RFCOMM listener and the worker thread,
/// and hands out [`BluetoothDevice`] handles for outgoing connections.
/// All methods block the calling thread until the worker has executed
/// the operation.
///
/// Callbacks registered here are invoked from the worker thread, so
/// they must not call back into the manager.
pub struct BluetoothManager {
    event_loop: EventLoop,
    client_channel: u8,
}

impl BluetoothManager {
    /// Connects to the system Bluetooth daemon, binds the RFCOMM
    /// listener and starts the worker thread.
    pub fn new(config: Config) -> Result<Self> {
        let event_loop = EventLoop::start(&config)?;
        info!("Bluetooth manager ready");
        Ok(Self {
            event_loop,
            client_channel: config.client_channel,
        })
    }

    /// Friendly name of the local Bluetooth adapter.
    pub fn adapter_name(&self) -> Result<String> {
        self.event_loop.call(|reply| Command::AdapterName { reply })
    }

    /// Addresses of the currently paired devices passing the filter.
    pub fn paired_addresses(&self) -> Result<HashSet<Address>> {
        self.event_loop
            .call(|reply| Command::PairedAddresses { reply })
    }

    /// Installs the device filter applied by the pairing agent and the
    /// device observer. `None` accepts every device.
    pub fn set_device_filter(&self, filter: Option<DeviceFilter>) -> Result<()> {
        self.event_loop
            .call(|reply| Command::SetFilter { filter, reply })
    }

    /// Installs the callback invoked when a paired device gets unpaired
    /// or disappears. Runs on the worker thread.
    pub fn on_device_unpaired(
        &self,
        callback: impl Fn(Address) + Send + Sync + 'static,
    ) -> Result<()> {
        self.event_loop.call(|reply| Command::SetUnpairedCallback {
            callback: Arc::new(callback),
            reply,
        })
    }

    /// Installs a hook that runs on the worker thread right before it
    /// exits. Host bindings use this to detach thread-local runtime
    /// state.
    pub fn on_worker_stopping(&self, hook: impl FnOnce() + Send + 'static) -> Result<()> {
        self.event_loop.call(|reply| Command::SetStopHook {
            hook: Box::new(hook),
            reply,
        })
    }

    /// Starts a bounded discovery session.
    ///
    /// While the session runs, the host advertises an SPP service record
    /// built from `service_name`, `service_provider` and
    /// `service_description`, answers pairing requests of accepted
    /// devices with `pairing_pin`, and reports every newly observed
    /// paired device through `on_found_paired` exactly once.
    /// `on_stopped` is invoked with the reason when the session ends,
    /// at the latest after `duration` (1 to 300 seconds).
    ///
    /// Fails with [`Error::InvalidState`](crate::Error::InvalidState)
    /// when a session is already active; a failure during startup rolls
    /// back and reports [`DiscoveryStopReason::Error`] through
    /// `on_stopped`.
    #[allow(clippy::too_many_arguments)]
    pub fn start_discovery(
        &self,
        service_name: impl Into<String>,
        service_provider: impl Into<String>,
        service_description: impl Into<String>,
        pairing_pin: impl Into<String>,
        duration: Duration,
        on_stopped: impl FnOnce(DiscoveryStopReason) + Send + 'static,
        on_found_paired: impl Fn(Address) + Send + Sync + 'static,
    ) -> Result<()> {
        let params = DiscoveryParams {
            service_name: service_name.into(),
            service_provider: service_provider.into(),
            service_description: service_description.into(),
            pairing_pin: pairing_pin.into(),
            duration,
            on_stopped: Box::new(on_stopped),
            on_found_paired: Arc::new(on_found_paired),
        };
        params.validate()?;
        self.event_loop
            .call(|reply| Command::StartDiscovery { params, reply })
    }

    /// Stops a running discovery session. Harmless when none is active
    /// or the session already timed out.
    pub fn stop_discovery(&self) -> Result<()> {
        self.event_loop.call(|reply| Command::StopDiscovery {
            reason: DiscoveryStopReason::ManuallyStopped,
            reply: Some(reply),
        })
    }

    /// Unpairs the device with the given address by removing it from
    /// the daemon. Unknown addresses are a silent no-op.
    pub fn unpair_device(&self, address: Address) -> Result<()> {
        self.event_loop
            .call(|reply| Command::Unpair { address, reply })
    }

    /// Returns an unconnected handle to the peripheral at `address`,
    /// bound to the configured RFCOMM client channel.
    pub fn device(&self, address: Address) -> BluetoothDevice {
        BluetoothDevice::new(address, self.client_channel, self.event_loop.runtime())
    }

    /// Stops discovery, shuts the worker down and joins its thread.
    /// Idempotent; also runs on drop. Device handles created earlier
    /// stay usable.
    pub fn shutdown(&mut self) {
        let _ = self.stop_discovery();
        self.event_loop.shutdown();
    }
}

impl Drop for BluetoothManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
