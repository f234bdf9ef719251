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

//! RFCOMM listener owning the channel advertised in the SDP record.

use bluer::rfcomm::{Listener, SocketAddr};
use bluer::Address;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Server socket whose only purpose is to own an RFCOMM channel number.
///
/// The peripheral looks the channel up through the SDP record and
/// connects back to the host on its own; those incoming connections are
/// never used and get closed right away.
pub(crate) struct RfcommListener {
    channel: u8,
    accept_task: JoinHandle<()>,
}

impl RfcommListener {
    /// Binds to the requested channel (0 lets the kernel pick one) and
    /// starts draining incoming connections.
    pub(crate) async fn bind(channel: u8) -> Result<Self> {
        let listener = Listener::bind(SocketAddr::new(Address::any(), channel)).await?;
        let local = listener.as_ref().local_addr()?;
        if local.channel == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "listener socket was bound without an RFCOMM channel",
            )));
        }

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("closing RFCOMM connection accepted from {}", peer.addr);
                        drop(stream);
                    }
                    Err(err) => {
                        warn!("RFCOMM accept failed: {}", err);
                        break;
                    }
                }
            }
        });

        info!("listening for RFCOMM connections on channel {}", local.channel);
        Ok(Self {
            channel: local.channel,
            accept_task,
        })
    }

    /// Channel the listener ended up on, always at least 1.
    pub(crate) fn channel(&self) -> u8 {
        self.channel
    }
}

impl Drop for RfcommListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
