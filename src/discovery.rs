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

//! Discovery session state.
//!
//! A session bundles everything a running discovery owns: the agent and
//! profile registrations, the auto-stop timer and the stopped callback.
//! Assembly and teardown ordering live on the worker, which owns the
//! adapter and the registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bluer::agent::AgentHandle;
use bluer::rfcomm::ProfileHandle;
use tokio::task::JoinHandle;
use tracing::error;

use crate::error::{Error, Result};
use crate::types::{Address, DiscoveryStopReason};

/// Shortest accepted discovery duration.
pub(crate) const MIN_DISCOVERY_DURATION: Duration = Duration::from_secs(1);
/// Longest accepted discovery duration.
pub(crate) const MAX_DISCOVERY_DURATION: Duration = Duration::from_secs(300);

/// Arguments of one discovery session.
pub(crate) struct DiscoveryParams {
    pub(crate) service_name: String,
    pub(crate) service_provider: String,
    pub(crate) service_description: String,
    pub(crate) pairing_pin: String,
    pub(crate) duration: Duration,
    pub(crate) on_stopped: Box<dyn FnOnce(DiscoveryStopReason) + Send>,
    pub(crate) on_found_paired: Arc<dyn Fn(Address) + Send + Sync>,
}

impl DiscoveryParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.service_name.is_empty()
            || self.service_provider.is_empty()
            || self.service_description.is_empty()
        {
            return Err(Error::InvalidArgument(
                "SDP service name, provider and description must be non-empty".into(),
            ));
        }
        if self.pairing_pin.is_empty() {
            return Err(Error::InvalidArgument("pairing PIN must not be empty".into()));
        }
        if self.duration < MIN_DISCOVERY_DURATION || self.duration > MAX_DISCOVERY_DURATION {
            return Err(Error::InvalidArgument(format!(
                "discovery duration must be between {} and {} seconds",
                MIN_DISCOVERY_DURATION.as_secs(),
                MAX_DISCOVERY_DURATION.as_secs()
            )));
        }
        Ok(())
    }
}

/// State owned by a running discovery session.
pub(crate) struct DiscoverySession {
    agent: Option<AgentHandle>,
    profile: Option<ProfileHandle>,
    timeout: JoinHandle<()>,
    on_stopped: Option<Box<dyn FnOnce(DiscoveryStopReason) + Send>>,
}

impl DiscoverySession {
    pub(crate) fn new(
        agent: AgentHandle,
        profile: ProfileHandle,
        timeout: JoinHandle<()>,
        on_stopped: Box<dyn FnOnce(DiscoveryStopReason) + Send>,
    ) -> Self {
        Self {
            agent: Some(agent),
            profile: Some(profile),
            timeout,
            on_stopped: Some(on_stopped),
        }
    }

    /// Cancels the timer, unregisters the agent and the SDP record and
    /// runs the stopped callback with the given reason.
    pub(crate) fn finish(mut self, reason: DiscoveryStopReason) {
        self.timeout.abort();
        drop(self.profile.take());
        drop(self.agent.take());
        if let Some(on_stopped) = self.on_stopped.take() {
            dispatch_stopped(on_stopped, reason);
        }
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.timeout.abort();
    }
}

/// Runs the stopped callback, keeping panics out of the worker loop.
pub(crate) fn dispatch_stopped(
    on_stopped: Box<dyn FnOnce(DiscoveryStopReason) + Send>,
    reason: DiscoveryStopReason,
) {
    if catch_unwind(AssertUnwindSafe(move || on_stopped(reason))).is_err() {
        error!("discovery stopped callback panicked ({})", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(duration: Duration) -> DiscoveryParams {
        DiscoveryParams {
            service_name: "PumpLink".into(),
            service_provider: "pumplink".into(),
            service_description: "serial link".into(),
            pairing_pin: "1234".into(),
            duration,
            on_stopped: Box::new(|_| {}),
            on_found_paired: Arc::new(|_| {}),
        }
    }

    #[test]
    fn test_duration_bounds() {
        assert!(params(Duration::from_secs(1)).validate().is_ok());
        assert!(params(Duration::from_secs(300)).validate().is_ok());
        assert!(matches!(
            params(Duration::from_millis(500)).validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            params(Duration::from_secs(301)).validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_strings_rejected() {
        let mut bad = params(Duration::from_secs(30));
        bad.service_description = String::new();
        assert!(matches!(bad.validate(), Err(Error::InvalidArgument(_))));

        let mut bad = params(Duration::from_secs(30));
        bad.pairing_pin = String::new();
        assert!(matches!(bad.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_stopped_callback_panic_is_contained() {
        dispatch_stopped(
            Box::new(|_| panic!("host callback blew up")),
            DiscoveryStopReason::Timeout,
        );
    }
}
