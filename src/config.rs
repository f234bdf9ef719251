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

//! Library configuration.

/// Configuration for [`BluetoothManager`](crate::BluetoothManager).
///
/// Nothing here is persisted; all values are passed in by the host
/// application.
#[derive(Debug, Clone)]
pub struct Config {
    /// RFCOMM channel used for outgoing connections to the peripheral.
    ///
    /// Channel 1 is the one the supported pump family answers on.
    /// Other peripheral families may require a different channel.
    pub client_channel: u8,

    /// Channel the local listener socket binds to. The listener exists
    /// only to own the channel number advertised in the SDP record;
    /// 0 lets the kernel pick a free channel.
    pub listener_channel: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_channel: 1,
            listener_channel: 0,
        }
    }
}
