/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Provisioning responder: forwards the request to the metadata
//! service and publishes the minted credentials back to the device.
//! Failures are logged and dropped; the device retries.

use mqlink::{MqlinkClient, QoS};
use tracing::info;

use crate::errors::TransportError;
use crate::messages::{ProvisionRequest, ProvisionResponse};
use crate::metadata::MetadataClient;

pub async fn handle(
    metadata: &MetadataClient,
    broker: &MqlinkClient,
    payload: &[u8],
) -> Result<(), TransportError> {
    let request: ProvisionRequest = serde_json::from_slice(payload)?;
    info!(
        "Received provisioning request from {}",
        request.serial_number
    );

    let credentials = metadata.provision(&request.serial_number).await?;

    let response = ProvisionResponse {
        pattern: format!("provisioning/{}/response", request.serial_number),
        data: credentials,
    };
    broker
        .publish_json(&response.pattern, QoS::ExactlyOnce, &response)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_publishes_on_its_own_pattern() {
        let response = ProvisionResponse {
            pattern: "provisioning/TANK001/response".to_string(),
            data: crate::messages::ProvisionCredentials {
                username: "dev-user".into(),
                password: "dev-pass".into(),
                status: "ok".into(),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["pattern"], "provisioning/TANK001/response");
        assert_eq!(json["data"]["username"], "dev-user");
        assert_eq!(json["data"]["status"], "ok");
    }

    #[test]
    fn request_parses_wire_name() {
        let request: ProvisionRequest =
            serde_json::from_str(r#"{"serialNumber": "TANK001"}"#).unwrap();
        assert_eq!(request.serial_number, "TANK001");
    }
}
