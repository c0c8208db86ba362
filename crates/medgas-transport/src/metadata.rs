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

//! HTTP client for the device metadata service.
//!
//! The service returns fields with inconsistent keys across versions
//! (`deviceType` vs `type`, installation-point fields that come and
//! go), so responses are parsed into `serde_json::Value` first and then
//! projected into the typed record with per-field defaulting. A missing
//! field is empty/zero, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::convert::Segment;
use crate::messages::ProvisionCredentials;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Metadata service returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Invalid api key: {0}")]
    InvalidApiKey(String),
}

/// Flow / tank / pressure installation point of a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstallationPoint {
    pub hospital_id: String,
    pub location: String,
    pub high_threshold: f64,
    pub low_threshold: f64,
}

/// Typed projection of a metadata-service device record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    pub id: String,
    pub serial_number: String,
    pub device_type: String,
    pub flow: InstallationPoint,
    pub tank: InstallationPoint,
    pub pressure: InstallationPoint,
}

pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, MetadataError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let value = reqwest::header::HeaderValue::from_str(api_key)
            .map_err(|e| MetadataError::InvalidApiKey(e.to_string()))?;
        headers.insert("api-key", value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /devices/serial_number/<serial>`; 404 maps to
    /// [MetadataError::DeviceNotFound].
    pub async fn get_device(&self, serial_number: &str) -> Result<DeviceRecord, MetadataError> {
        let url = format!("{}/devices/serial_number/{}", self.base_url, serial_number);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::DeviceNotFound(serial_number.to_string()));
        }
        if !response.status().is_success() {
            return Err(MetadataError::UnexpectedStatus {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        debug!("Fetched device record for {serial_number}");
        Ok(project_device(&body["data"]))
    }

    /// `GET /tank-conversion-table/<serial>/formula`.
    pub async fn get_conversion_table(
        &self,
        serial_number: &str,
    ) -> Result<Vec<Segment>, MetadataError> {
        let url = format!(
            "{}/tank-conversion-table/{}/formula",
            self.base_url, serial_number
        );
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MetadataError::UnexpectedStatus {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        let segments = body["data"]["tank_conversion_table"].clone();
        Ok(serde_json::from_value(segments).unwrap_or_default())
    }

    /// `POST /provisioning` with the device serial number.
    pub async fn provision(
        &self,
        serial_number: &str,
    ) -> Result<ProvisionCredentials, MetadataError> {
        let url = format!("{}/provisioning", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "serialNumber": serial_number }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MetadataError::UnexpectedStatus {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        Ok(serde_json::from_value(body).unwrap_or_default())
    }
}

/// Project the untyped device JSON into a [DeviceRecord], tolerating
/// the key variants the service has shipped over time.
pub fn project_device(data: &Value) -> DeviceRecord {
    // Older responses nest the record one level deeper.
    let device = data.get("device").unwrap_or(data);

    DeviceRecord {
        id: string_field(device, &["id"]),
        serial_number: string_field(device, &["serialNumber", "serial_number"]),
        device_type: string_field(device, &["deviceType", "type"]),
        flow: project_point(device.get("installationPointFlow")),
        tank: project_point(device.get("installationPointTank")),
        pressure: project_point(device.get("installationPointPressure")),
    }
}

fn project_point(value: Option<&Value>) -> InstallationPoint {
    let Some(value) = value else {
        return InstallationPoint::default();
    };

    InstallationPoint {
        hospital_id: string_field(value, &["hospital", "hospitalId"]),
        location: string_field(value, &["location"]),
        high_threshold: number_field(value, &["highThreshold", "high_threshold"]),
        low_threshold: number_field(value, &["lowThreshold", "low_threshold"]),
    }
}

fn string_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn number_field(value: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_f64))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_current_key_shape() {
        let data = json!({
            "id": "dev-42",
            "serialNumber": "TANK001",
            "deviceType": "tank",
            "installationPointTank": {
                "hospital": "hosp-9",
                "location": "east wing",
                "highThreshold": 90.0,
                "lowThreshold": 10.0
            }
        });

        let record = project_device(&data);
        assert_eq!(record.id, "dev-42");
        assert_eq!(record.serial_number, "TANK001");
        assert_eq!(record.device_type, "tank");
        assert_eq!(record.tank.hospital_id, "hosp-9");
        assert_eq!(record.tank.high_threshold, 90.0);
        assert_eq!(record.flow, InstallationPoint::default());
    }

    #[test]
    fn projects_legacy_key_variants() {
        let data = json!({
            "device": {
                "id": "dev-1",
                "serial_number": "FLOW-7",
                "type": "flow",
                "installationPointFlow": { "hospitalId": "hosp-2" }
            }
        });

        let record = project_device(&data);
        assert_eq!(record.serial_number, "FLOW-7");
        assert_eq!(record.device_type, "flow");
        assert_eq!(record.flow.hospital_id, "hosp-2");
        assert_eq!(record.flow.location, "");
        assert_eq!(record.flow.high_threshold, 0.0);
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let record = project_device(&json!({}));
        assert_eq!(record, DeviceRecord::default());
    }

    #[test]
    fn cached_device_record_round_trips_byte_equal() {
        let record = DeviceRecord {
            id: "dev-42".into(),
            serial_number: "TANK001".into(),
            device_type: "tank".into(),
            tank: InstallationPoint {
                hospital_id: "hosp-9".into(),
                location: "east wing".into(),
                high_threshold: 90.0,
                low_threshold: 10.0,
            },
            ..DeviceRecord::default()
        };

        let cached = serde_json::to_string(&record).unwrap();
        let decoded: DeviceRecord = serde_json::from_str(&cached).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(serde_json::to_string(&decoded).unwrap(), cached);
    }

    #[test]
    fn conversion_table_segments_parse_with_defaults() {
        let segments: Vec<Segment> = serde_json::from_value(json!([
            { "slope": 2.0, "intercept": 1.0, "in_h2o_min": 0.0, "in_h2o_max": 10.0 },
            { "slope": 3.0 }
        ]))
        .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].slope, 2.0);
        assert_eq!(segments[1].intercept, 0.0);
        assert_eq!(segments[1].in_h2o_max, 0.0);
    }
}
