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

//! The worker event loop.
//!
//! All daemon-facing state (session, adapter, agent, SDP record,
//! registry) lives on one dedicated thread driving a current-thread
//! tokio runtime. Callers talk to it through typed commands; each
//! command carries a oneshot reply, so results and failures travel back
//! to the calling thread and commands from one caller run in submission
//! order.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::adapter::AdapterClient;
use crate::agent;
use crate::config::Config;
use crate::discovery::{dispatch_stopped, DiscoveryParams, DiscoverySession};
use crate::error::{Error, Result};
use crate::listener::RfcommListener;
use crate::registry::DeviceRegistry;
use crate::sdp;
use crate::types::{Address, AddressCallback, DeviceFilter, DiscoveryStopReason, SharedFilter};

type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) enum Command {
    StartDiscovery {
        params: DiscoveryParams,
        reply: Reply<()>,
    },
    StopDiscovery {
        reason: DiscoveryStopReason,
        // The auto-stop timer has nobody to reply to.
        reply: Option<Reply<()>>,
    },
    Unpair {
        address: Address,
        reply: Reply<()>,
    },
    AdapterName {
        reply: Reply<String>,
    },
    PairedAddresses {
        reply: Reply<HashSet<Address>>,
    },
    SetFilter {
        filter: Option<DeviceFilter>,
        reply: Reply<()>,
    },
    SetUnpairedCallback {
        callback: AddressCallback,
        reply: Reply<()>,
    },
    SetStopHook {
        hook: Box<dyn FnOnce() + Send>,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Handle to the worker thread.
pub(crate) struct EventLoop {
    runtime: Arc<Runtime>,
    thread: Option<thread::JoinHandle<()>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventLoop {
    /// Establishes the bus session and every worker-owned component,
    /// then starts the loop thread.
    pub(crate) fn start(config: &Config) -> Result<Self> {
        let runtime = Arc::new(
            Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(Error::Io)?,
        );
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let worker = runtime.block_on(Worker::setup(config, cmd_tx.clone()))?;

        let thread_runtime = runtime.clone();
        let thread = thread::Builder::new()
            .name("bluetooth-worker".into())
            .spawn(move || thread_runtime.block_on(worker.run(cmd_rx)))
            .map_err(Error::Io)?;

        Ok(Self {
            runtime,
            thread: Some(thread),
            cmd_tx,
        })
    }

    /// Runtime shared with device handles so they stay usable after the
    /// loop stopped.
    pub(crate) fn runtime(&self) -> Arc<Runtime> {
        self.runtime.clone()
    }

    /// Runs a command on the worker and blocks until it finished there,
    /// handing back its result. If the loop is already gone the default
    /// value is returned without an error.
    pub(crate) fn call<T: Default>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        if self.cmd_tx.send(make(reply)).is_err() {
            return Ok(T::default());
        }
        match response.blocking_recv() {
            Ok(result) => result,
            Err(_) => Ok(T::default()),
        }
    }

    /// Stops the loop and joins its thread. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            debug!("stopping Bluetooth worker");
            let _ = self.cmd_tx.send(Command::Shutdown);
            if thread.join().is_err() {
                error!("Bluetooth worker thread panicked");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State living on the worker thread.
struct Worker {
    session: bluer::Session,
    adapter: AdapterClient,
    registry: Arc<Mutex<DeviceRegistry>>,
    filter: SharedFilter,
    listener: RfcommListener,
    discovery: Option<DiscoverySession>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    stop_hook: Option<Box<dyn FnOnce() + Send>>,
}

impl Worker {
    async fn setup(config: &Config, cmd_tx: mpsc::UnboundedSender<Command>) -> Result<Self> {
        let session = bluer::Session::new().await.map_err(Error::Unavailable)?;
        trace!("Bluetooth daemon session established");

        let filter: SharedFilter = Arc::new(Mutex::new(None));
        let registry = Arc::new(Mutex::new(DeviceRegistry::new(filter.clone())));
        let adapter = AdapterClient::setup(&session, registry.clone()).await?;
        let listener = RfcommListener::bind(config.listener_channel).await?;

        Ok(Self {
            session,
            adapter,
            registry,
            filter,
            listener,
            discovery: None,
            cmd_tx,
            stop_hook: None,
        })
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        trace!("Bluetooth worker loop running");

        while let Some(command) = cmd_rx.recv().await {
            match command {
                Command::StartDiscovery { params, reply } => {
                    let _ = reply.send(self.start_discovery(params).await);
                }
                Command::StopDiscovery { reason, reply } => {
                    let result = self.stop_discovery(reason).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Command::Unpair { address, reply } => {
                    let _ = reply.send(self.adapter.remove_device(address).await);
                }
                Command::AdapterName { reply } => {
                    let _ = reply.send(self.adapter.friendly_name().await);
                }
                Command::PairedAddresses { reply } => {
                    let _ = reply.send(Ok(self.registry.lock().paired_addresses()));
                }
                Command::SetFilter { filter, reply } => {
                    *self.filter.lock() = filter;
                    let _ = reply.send(Ok(()));
                }
                Command::SetUnpairedCallback { callback, reply } => {
                    self.registry.lock().set_unpaired_callback(callback);
                    let _ = reply.send(Ok(()));
                }
                Command::SetStopHook { hook, reply } => {
                    self.stop_hook = Some(hook);
                    let _ = reply.send(Ok(()));
                }
                Command::Shutdown => break,
            }
        }

        trace!("Bluetooth worker loop stopping");
        if let Err(err) = self.stop_discovery(DiscoveryStopReason::ManuallyStopped).await {
            warn!("could not stop discovery during teardown: {}", err);
        }
        self.adapter.shutdown();
        if let Some(hook) = self.stop_hook.take() {
            hook();
        }
    }

    /// Brings up the discovery session: auto-stop timer, agent, SDP
    /// record, then the scan itself. Rolls everything back and reports
    /// a stopped reason if a step fails.
    async fn start_discovery(&mut self, params: DiscoveryParams) -> Result<()> {
        if self.discovery.is_some() {
            return Err(Error::InvalidState("discovery already started"));
        }
        params.validate()?;

        let DiscoveryParams {
            service_name,
            service_provider,
            service_description,
            pairing_pin,
            duration,
            on_stopped,
            on_found_paired,
        } = params;

        let cmd_tx = self.cmd_tx.clone();
        let timeout = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!("discovery timeout reached, stopping discovery");
            let _ = cmd_tx.send(Command::StopDiscovery {
                reason: DiscoveryStopReason::Timeout,
                reply: None,
            });
        });

        let assembled = self
            .assemble_discovery(
                &service_name,
                &service_provider,
                &service_description,
                pairing_pin,
                on_found_paired,
            )
            .await;

        match assembled {
            Ok((agent, profile)) => {
                self.discovery = Some(DiscoverySession::new(agent, profile, timeout, on_stopped));
                info!(
                    "discovery started (service \"{}\", {} second(s))",
                    service_name,
                    duration.as_secs()
                );
                Ok(())
            }
            Err(err) => {
                timeout.abort();
                self.registry.lock().clear_found_sink();
                self.adapter.stop_scan();
                dispatch_stopped(on_stopped, DiscoveryStopReason::Error);
                Err(err)
            }
        }
    }

    /// The fallible middle part of the discovery startup. Agent and
    /// profile registrations undo themselves on drop, so an early
    /// return here rolls back whatever was already set up, in reverse
    /// order.
    async fn assemble_discovery(
        &mut self,
        service_name: &str,
        service_provider: &str,
        service_description: &str,
        pairing_pin: String,
        on_found_paired: AddressCallback,
    ) -> Result<(bluer::agent::AgentHandle, bluer::rfcomm::ProfileHandle)> {
        let agent = agent::register(&self.session, pairing_pin, self.filter.clone()).await?;
        let profile = sdp::register(
            &self.session,
            service_name,
            service_provider,
            service_description,
            self.listener.channel(),
        )
        .await?;

        self.registry.lock().set_found_sink(on_found_paired);
        self.adapter.start_scan().await?;
        // Feed devices the daemon knew before the scan through the same
        // path as newly found ones.
        self.adapter.sweep_known_devices().await;

        Ok((agent, profile))
    }

    /// Tears the session down and reports the reason. No-op when no
    /// discovery is active, which also makes repeated stops harmless.
    async fn stop_discovery(&mut self, reason: DiscoveryStopReason) -> Result<()> {
        let Some(session) = self.discovery.take() else {
            return Ok(());
        };

        self.registry.lock().clear_found_sink();
        self.adapter.stop_scan();
        session.finish(reason);

        info!("discovery stopped ({})", reason);
        Ok(())
    }
}
