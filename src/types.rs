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

//! Shared types and callback signatures.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub use bluer::Address;

/// Predicate applied to device addresses before the pairing agent hands
/// out the PIN and before discovery callbacks are invoked. Returning
/// `false` rejects the device.
pub type DeviceFilter = Arc<dyn Fn(Address) -> bool + Send + Sync>;

/// Filter slot shared between the pairing agent and the device observer.
pub(crate) type SharedFilter = Arc<Mutex<Option<DeviceFilter>>>;

/// Callback notified with a device address from the worker thread.
pub(crate) type AddressCallback = Arc<dyn Fn(Address) + Send + Sync>;

/// Builds a filter that accepts only devices whose address starts with
/// the given 3-byte prefix.
///
/// All peripherals of one product family share the OUI part of their
/// Bluetooth address, so a prefix check is enough to tell them apart
/// from unrelated devices.
pub fn prefix_filter(prefix: [u8; 3]) -> DeviceFilter {
    Arc::new(move |address: Address| address.0[..3] == prefix)
}

/// Why a discovery session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStopReason {
    /// The application called stop or shut the manager down.
    ManuallyStopped,
    /// The configured discovery duration elapsed.
    Timeout,
    /// Discovery could not be started or failed while running.
    Error,
}

impl fmt::Display for DiscoveryStopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStopReason::ManuallyStopped => write!(f, "manually stopped"),
            DiscoveryStopReason::Timeout => write!(f, "discovery timeout"),
            DiscoveryStopReason::Error => write!(f, "discovery error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let text = "AA:BB:CC:11:22:33";
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_string(), text);
        assert_eq!(address.0, [0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_address_rejects_malformed_input() {
        assert!("not an address".parse::<Address>().is_err());
        assert!("AA:BB:CC:11:22".parse::<Address>().is_err());
        assert!("AA:BB:CC:11:22:ZZ".parse::<Address>().is_err());
    }

    #[test]
    fn test_prefix_filter() {
        let filter = prefix_filter([0xAA, 0xBB, 0xCC]);
        assert!(filter("AA:BB:CC:01:02:03".parse().unwrap()));
        assert!(!filter("11:22:33:04:05:06".parse().unwrap()));
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(DiscoveryStopReason::ManuallyStopped.to_string(), "manually stopped");
        assert_eq!(DiscoveryStopReason::Timeout.to_string(), "discovery timeout");
        assert_eq!(DiscoveryStopReason::Error.to_string(), "discovery error");
    }
}
