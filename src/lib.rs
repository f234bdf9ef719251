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

//! Linux Bluetooth Classic client library for pump-style peripherals.
//!
//! The supported peripherals rendezvous with the host the other way
//! around: during pairing the *peripheral* looks the host up via SDP
//! and initiates the Bluetooth pairing, expecting a fixed PIN. The host
//! therefore has to advertise a Serial Port Profile record, act as the
//! system's default pairing agent and watch the daemon's device events,
//! all at once. [`BluetoothManager`] bundles that into one discovery
//! session. Data exchange afterwards happens over a plain RFCOMM byte
//! stream, opened separately through [`BluetoothDevice`].
//!
//! All state facing the BlueZ daemon lives on an internal worker
//! thread; the public API blocks the calling thread and is safe to use
//! from plain (non-async) code.
//!
//! ```no_run
//! use std::time::Duration;
//! use pumplink::{prefix_filter, BluetoothManager, Config};
//!
//! fn main() -> pumplink::Result<()> {
//!     let mut manager = BluetoothManager::new(Config::default())?;
//!     manager.set_device_filter(Some(prefix_filter([0x00, 0x0E, 0x2F])))?;
//!     manager.start_discovery(
//!         "PumpLink",
//!         "pumplink",
//!         "SPP rendezvous channel",
//!         "123456",
//!         Duration::from_secs(60),
//!         |reason| println!("discovery stopped: {}", reason),
//!         |address| println!("paired pump found: {}", address),
//!     )?;
//!
//!     // Once a pump is paired, talk to it over RFCOMM.
//!     let device = manager.device("00:0E:2F:11:22:33".parse().unwrap());
//!     device.connect()?;
//!     device.send(&[0x10, 0x20])?;
//!     let mut buffer = [0u8; 128];
//!     let _read = device.receive(&mut buffer)?;
//!     device.disconnect();
//!
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```

mod adapter;
mod agent;
mod cancel;
mod config;
mod device;
mod discovery;
mod error;
mod event_loop;
mod listener;
mod manager;
mod registry;
mod sdp;
mod types;

pub use config::Config;
pub use device::BluetoothDevice;
pub use error::{Error, Result};
pub use manager::BluetoothManager;
pub use types::{prefix_filter, Address, DeviceFilter, DiscoveryStopReason};
