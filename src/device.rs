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

//! RFCOMM connections to a peripheral.
//!
//! The connection API is blocking: `connect`, `send` and `receive`
//! suspend the calling thread until the operation finishes, fails or is
//! cancelled. Cancellation may come from any thread, `disconnect` in
//! particular, and surfaces as [`Error::Cancelled`] on the blocked
//! call.

use std::sync::Arc;

use bluer::rfcomm::{SocketAddr, Stream};
use parking_lot::{Condvar, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;
use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Idle,
    Connecting,
    Connected,
    ShuttingDown,
}

struct Shared {
    state: Mutex<ConnState>,
    connect_done: Condvar,
    stream: tokio::sync::Mutex<Option<Stream>>,
    connect_cancel: CancelToken,
    send_cancel: CancelToken,
    receive_cancel: CancelToken,
}

/// Handle to one peripheral, bound to an address and RFCOMM channel.
///
/// Creating the handle does not connect; call
/// [`connect`](Self::connect) for that. The handle stays usable after
/// the [`BluetoothManager`](crate::BluetoothManager) that created it is
/// shut down.
///
/// One thread drives `connect`/`send`/`receive`; `disconnect`,
/// `cancel_send` and `cancel_receive` are safe from any thread.
pub struct BluetoothDevice {
    address: Address,
    channel: u8,
    runtime: Arc<Runtime>,
    shared: Arc<Shared>,
}

impl BluetoothDevice {
    pub(crate) fn new(address: Address, channel: u8, runtime: Arc<Runtime>) -> Self {
        Self {
            address,
            channel,
            runtime,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnState::Idle),
                connect_done: Condvar::new(),
                stream: tokio::sync::Mutex::new(None),
                connect_cancel: CancelToken::new(),
                send_cancel: CancelToken::new(),
                receive_cancel: CancelToken::new(),
            }),
        }
    }

    /// Address of the peripheral this handle is bound to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// RFCOMM channel used for outgoing connections.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Opens the RFCOMM connection.
    ///
    /// Blocks until the peripheral accepts, an error occurs, or
    /// [`disconnect`](Self::disconnect) aborts the attempt from another
    /// thread, which surfaces here as [`Error::Cancelled`].
    pub fn connect(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                ConnState::ShuttingDown => {
                    debug!("not connecting to {}: handle is shutting down", self.address);
                    return Ok(());
                }
                ConnState::Connecting => {
                    return Err(Error::InvalidState("connection attempt already in progress"))
                }
                ConnState::Connected => {
                    return Err(Error::InvalidState("connection already established"))
                }
                ConnState::Idle => {}
            }
            // A disconnect that completed before this call must not
            // cancel the new attempt.
            self.shared.connect_cancel.reset();
            *state = ConnState::Connecting;
        }

        debug!(
            "attempting to open RFCOMM connection to {} on channel {}",
            self.address, self.channel
        );

        let peer = SocketAddr::new(self.address, self.channel);
        let cancel = self.shared.connect_cancel.clone();
        let connected = self.runtime.block_on(async {
            tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled("connect")),
                result = Stream::connect(peer) => result.map_err(Error::from),
            }
        });

        let result = match connected {
            Ok(stream) => {
                *self.shared.stream.blocking_lock() = Some(stream);
                // Only this function moves the state off Connecting;
                // disconnect_impl waits on the condition variable until
                // that happened. The state is still Connecting here.
                *self.shared.state.lock() = ConnState::Connected;
                info!(
                    "opened RFCOMM connection to {} on channel {}",
                    self.address, self.channel
                );
                Ok(())
            }
            Err(err) => {
                *self.shared.state.lock() = ConnState::Idle;
                if err.is_cancelled() {
                    debug!("connection attempt to {} cancelled", self.address);
                }
                Err(err)
            }
        };

        self.shared.connect_done.notify_all();
        result
    }

    /// Closes the connection and aborts whatever is in flight.
    ///
    /// Implicitly cancels ongoing send and receive operations, so
    /// callers do not need to invoke [`cancel_send`](Self::cancel_send)
    /// or [`cancel_receive`](Self::cancel_receive) first. Safe to call
    /// from any thread and on a never-connected handle; never fails.
    pub fn disconnect(&self) {
        self.disconnect_impl(false);
    }

    fn disconnect_impl(&self, shutting_down: bool) {
        trace!("disconnecting from {}", self.address);

        self.shared.send_cancel.cancel();
        self.shared.receive_cancel.cancel();
        // The connect token must be signalled before the state lock is
        // taken. An in-flight connect holds no lock while it waits, but
        // it only wakes up through this token; grabbing the lock first
        // and waiting for the condition variable would deadlock.
        self.shared.connect_cancel.cancel();

        if let Some(stream) = self.shared.stream.blocking_lock().take() {
            drop(stream);
            debug!("released RFCOMM stream to {}", self.address);
        }

        let mut state = self.shared.state.lock();
        while *state == ConnState::Connecting {
            self.shared.connect_done.wait(&mut state);
        }
        if *state == ConnState::Connected {
            // The connect finished between our stream takedown and the
            // wait; release the freshly adopted stream too.
            drop(state);
            drop(self.shared.stream.blocking_lock().take());
            state = self.shared.state.lock();
        }
        *state = if shutting_down {
            ConnState::ShuttingDown
        } else if *state == ConnState::ShuttingDown {
            ConnState::ShuttingDown
        } else {
            ConnState::Idle
        };
        drop(state);

        trace!("disconnected from {}", self.address);
    }

    /// Sends all of `data`, blocking until every byte was handed to the
    /// kernel.
    ///
    /// A concurrent [`cancel_send`](Self::cancel_send) or
    /// [`disconnect`](Self::disconnect) aborts with
    /// [`Error::Cancelled`]; everything else surfaces as an I/O error.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.shared.send_cancel.reset();
        let cancel = self.shared.send_cancel.clone();
        self.runtime.block_on(async {
            let mut guard = self.shared.stream.lock().await;
            let stream = guard
                .as_mut()
                .ok_or(Error::InvalidState("not connected"))?;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("send to {} cancelled", self.address);
                    Err(Error::Cancelled("send"))
                }
                result = stream.write_all(data) => {
                    result?;
                    trace!("sent {} byte(s) to {}", data.len(), self.address);
                    Ok(())
                }
            }
        })
    }

    /// Reads up to `buffer.len()` bytes and returns how many arrived.
    /// Partial reads are normal; zero means the peripheral closed the
    /// stream.
    pub fn receive(&self, buffer: &mut [u8]) -> Result<usize> {
        self.shared.receive_cancel.reset();
        let cancel = self.shared.receive_cancel.clone();
        self.runtime.block_on(async {
            let mut guard = self.shared.stream.lock().await;
            let stream = guard
                .as_mut()
                .ok_or(Error::InvalidState("not connected"))?;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("receive from {} cancelled", self.address);
                    Err(Error::Cancelled("receive"))
                }
                result = stream.read(buffer) => {
                    let read = result?;
                    trace!("received {} byte(s) from {}", read, self.address);
                    Ok(read)
                }
            }
        })
    }

    /// Aborts a blocked [`send`](Self::send) on another thread.
    pub fn cancel_send(&self) {
        self.shared.send_cancel.cancel();
    }

    /// Aborts a blocked [`receive`](Self::receive) on another thread.
    pub fn cancel_receive(&self) {
        self.shared.receive_cancel.cancel();
    }
}

impl Drop for BluetoothDevice {
    fn drop(&mut self) {
        self.disconnect_impl(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Builder;

    fn runtime() -> Arc<Runtime> {
        Arc::new(Builder::new_current_thread().enable_all().build().unwrap())
    }

    fn device() -> BluetoothDevice {
        BluetoothDevice::new("AA:BB:CC:11:22:33".parse().unwrap(), 1, runtime())
    }

    #[test]
    fn test_disconnect_without_connection_never_fails() {
        let device = device();
        device.disconnect();
        device.disconnect();
    }

    #[test]
    fn test_send_requires_connection() {
        let device = device();
        let result = device.send(b"ping");
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_receive_requires_connection() {
        let device = device();
        let mut buffer = [0u8; 16];
        let result = device.receive(&mut buffer);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_cancel_before_send_does_not_poison_next_operation() {
        let device = device();
        device.cancel_send();
        device.cancel_receive();
        // The tokens are reset on entry, so the stored cancellation must
        // not mask the real failure cause.
        assert!(matches!(device.send(b"x"), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_accessors() {
        let device = device();
        assert_eq!(device.address().to_string(), "AA:BB:CC:11:22:33");
        assert_eq!(device.channel(), 1);
    }

    #[test]
    fn test_connect_after_shutdown_is_a_silent_noop() {
        let device = device();
        device.disconnect_impl(true);
        assert!(device.connect().is_ok());
    }
}
