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

//! Serial Port Profile service record registration.
//!
//! The peripheral finds the host by browsing its SDP records for an SPP
//! service, so the record must carry the RFCOMM channel our listener
//! owns. The profile manager's own record builder is too limited for
//! that, hence the handwritten record XML.

use bluer::rfcomm::{Profile, ProfileHandle};
use bluer::Session;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Serial Port Profile class UUID.
pub(crate) const SERIAL_PORT_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Renders the SPP service record.
///
/// Attributes: ServiceClassIDList (0x0001) and ServiceID (0x0003) carry
/// the SPP class 0x1101, the ProtocolDescriptorList (0x0004) announces
/// RFCOMM on the given channel, the BrowseGroupList (0x0005) puts the
/// record under PublicBrowseRoot, ServiceAvailability (0x0008) is 0xff,
/// and the ProfileDescriptorList (0x0009) declares SPP version 0x0100.
fn service_record_xml(name: &str, description: &str, provider: &str, channel: u8) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>",
            "<record>",
            "<attribute id=\"0x0001\">",
            "<sequence><uuid value=\"0x1101\" /></sequence>",
            "</attribute>",
            "<attribute id=\"0x0003\">",
            "<uuid value=\"0x1101\" />",
            "</attribute>",
            "<attribute id=\"0x0004\">",
            "<sequence><sequence><uuid value=\"0x0003\" /><uint8 value=\"{channel}\" /></sequence></sequence>",
            "</attribute>",
            "<attribute id=\"0x0005\">",
            "<sequence><uuid value=\"0x1002\" /></sequence>",
            "</attribute>",
            "<attribute id=\"0x0008\">",
            "<uint8 value=\"0xff\" />",
            "</attribute>",
            "<attribute id=\"0x0009\">",
            "<sequence><sequence><uuid value=\"0x1101\" /><uint16 value=\"0x0100\" /></sequence></sequence>",
            "</attribute>",
            "<attribute id=\"0x0100\">",
            "<text value=\"{name}\" />",
            "</attribute>",
            "<attribute id=\"0x0101\">",
            "<text value=\"{description}\" />",
            "</attribute>",
            "<attribute id=\"0x0102\">",
            "<text value=\"{provider}\" />",
            "</attribute>",
            "</record>",
        ),
        name = name,
        description = description,
        provider = provider,
        channel = channel,
    )
}

/// Publishes the SPP record with the daemon's profile manager.
///
/// The returned handle keeps the record registered; dropping it
/// unregisters the profile again.
pub(crate) async fn register(
    session: &Session,
    name: &str,
    provider: &str,
    description: &str,
    channel: u8,
) -> Result<ProfileHandle> {
    if name.is_empty() || provider.is_empty() || description.is_empty() {
        return Err(Error::InvalidArgument(
            "SDP service name, provider and description must be non-empty".into(),
        ));
    }
    if channel == 0 {
        return Err(Error::InvalidArgument(
            "SDP record needs an RFCOMM channel of at least 1".into(),
        ));
    }

    let profile = Profile {
        uuid: SERIAL_PORT_UUID,
        name: Some(name.to_string()),
        channel: Some(u16::from(channel)),
        service_record: Some(service_record_xml(name, description, provider, channel)),
        auto_connect: Some(false),
        ..Default::default()
    };

    let handle = session.register_profile(profile).await?;
    debug!("registered SPP service record on channel {}", channel);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_port_uuid() {
        assert_eq!(
            SERIAL_PORT_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_record_carries_all_attributes() {
        let record = service_record_xml("PumpLink", "serial link", "pumplink", 3);
        for id in [
            "0x0001", "0x0003", "0x0004", "0x0005", "0x0008", "0x0009", "0x0100", "0x0101",
            "0x0102",
        ] {
            assert!(
                record.contains(&format!("<attribute id=\"{}\">", id)),
                "attribute {} missing from record",
                id
            );
        }
    }

    #[test]
    fn test_record_values() {
        let record = service_record_xml("PumpLink", "serial link", "pumplink", 7);
        assert!(record.contains("<uuid value=\"0x1101\" />"));
        assert!(record.contains("<uuid value=\"0x0003\" /><uint8 value=\"7\" />"));
        assert!(record.contains("<uint16 value=\"0x0100\" />"));
        assert!(record.contains("<uuid value=\"0x1002\" />"));
        assert!(record.contains("<uint8 value=\"0xff\" />"));
        assert!(record.contains("<text value=\"PumpLink\" />"));
        assert!(record.contains("<text value=\"serial link\" />"));
        assert!(record.contains("<text value=\"pumplink\" />"));
    }
}
