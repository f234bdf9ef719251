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

//! Pairing agent.
//!
//! During discovery the library acts as the system-wide default pairing
//! agent so that the peripheral's pairing attempt is answered with the
//! fixed PIN without any user interaction. Only PIN requests are
//! handled; every other pairing prompt stays rejected.

use bluer::agent::{Agent, AgentHandle, ReqError, RequestPinCode};
use bluer::Session;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{Address, DeviceFilter, SharedFilter};

/// Decides the reply to a PIN request: the configured PIN for accepted
/// devices, rejection for everything else.
fn pin_for_device(
    address: Address,
    pin: &str,
    filter: Option<&DeviceFilter>,
) -> std::result::Result<String, ReqError> {
    if let Some(filter) = filter {
        if !filter(address) {
            debug!("rejecting PIN request from {}: filtered out", address);
            return Err(ReqError::Rejected);
        }
    }
    info!("device {} requested a PIN code", address);
    Ok(pin.to_string())
}

/// Registers the default pairing agent with the daemon.
///
/// The returned handle keeps the agent registered; dropping it
/// unregisters.
pub(crate) async fn register(
    session: &Session,
    pin: String,
    filter: SharedFilter,
) -> Result<AgentHandle> {
    let agent = Agent {
        request_default: true,
        request_pin_code: Some(Box::new(move |req: RequestPinCode| {
            let pin = pin.clone();
            let filter = filter.clone();
            Box::pin(async move {
                let filter = filter.lock().clone();
                pin_for_device(req.device, &pin, filter.as_ref())
            })
        })),
        ..Default::default()
    };

    let handle = session.register_agent(agent).await?;
    debug!("pairing agent registered");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prefix_filter;

    #[test]
    fn test_pin_reply_without_filter() {
        let address = "AA:BB:CC:DE:AD:BE".parse().unwrap();
        let reply = pin_for_device(address, "1234", None);
        assert_eq!(reply.unwrap(), "1234");
    }

    #[test]
    fn test_pin_reply_with_accepting_filter() {
        let address = "AA:BB:CC:DE:AD:BE".parse().unwrap();
        let filter = prefix_filter([0xAA, 0xBB, 0xCC]);
        let reply = pin_for_device(address, "1234", Some(&filter));
        assert_eq!(reply.unwrap(), "1234");
    }

    #[test]
    fn test_rejecting_filter_yields_rejected() {
        let address = "11:22:33:DE:AD:BE".parse().unwrap();
        let filter = prefix_filter([0xAA, 0xBB, 0xCC]);
        let reply = pin_for_device(address, "1234", Some(&filter));
        assert!(matches!(reply, Err(ReqError::Rejected)));
    }
}
