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

//! Wire payload types.
//!
//! Devices send sparse JSON: fields come and go across firmware
//! revisions, so everything defaults instead of failing to parse.

use serde::{Deserialize, Serialize};

/// Device-health block attached to every sensor payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceHealth {
    pub uptime: i64,
    pub temp: f64,
    pub hum: f64,
    pub long: f64,
    pub lat: f64,
    pub rssi: f64,
    pub hw_ver: String,
    pub fw_ver: String,
    pub rd_ver: String,
    pub model: String,
    pub mem_usage: f64,
    pub reset_reason: i32,
}

/// Solar subsystem block carried by tank-level devices.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SolarBlock {
    pub batt_temp: f64,
    pub batt_level: f64,
    pub batt_volt: f64,
    pub batt_status: Vec<i32>,
    pub device_status: Vec<i32>,
    pub load_status: Vec<i32>,
    pub e_gen: Vec<f64>,
    pub e_com: Vec<f64>,
}

/// Cryogenic tank level reading (`JI/v2/<serial>/level`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelPayload {
    pub ts: i64,
    pub level: f64,
    pub device: DeviceHealth,
    pub solar: SolarBlock,
}

/// Gas-flow totalizer reading (`JI/v2/<serial>/flow`). Volume and rate
/// arrive as 16-bit words; the derived values are computed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowPayload {
    pub ts: i64,
    pub v_hi: i32,
    pub v_lo: i32,
    pub v_dec: i32,
    pub f_rate_hi: i32,
    pub f_rate_lo: i32,
    pub device: DeviceHealth,
}

/// One entry of a pressure manifold's gas list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GasReading {
    pub measurement: String,
    pub value: f64,
    pub connection: i32,
    pub enable: bool,
    pub high_limit: f64,
    pub low_limit: f64,
}

/// Multi-gas pressure manifold reading (`JI/v2/<serial>/pressure`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PressurePayload {
    pub ts: i64,
    pub data: Vec<GasReading>,
    pub device: DeviceHealth,
}

/// Filling-transaction message (`JI/v2/<serial>/filling`).
/// `filling_state` 1 opens a transaction, 0 closes one; an empty
/// `nano_id` on an OPEN asks the service to generate the correlation id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillingPayload {
    pub ts: i64,
    pub filling_state: i64,
    pub level: f64,
    pub nano_id: String,
}

impl FillingPayload {
    pub fn is_open(&self) -> bool {
        self.filling_state == 1
    }
}

/// Answer published on `JI/v2/<serial>/filling-response`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FillingResponse {
    pub status: String,
    pub timestamp: i64,
    #[serde(rename = "nanoID")]
    pub nano_id: String,
}

impl FillingResponse {
    pub fn success(timestamp: i64, nano_id: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            timestamp,
            nano_id: nano_id.into(),
        }
    }

    pub fn fail(timestamp: i64, nano_id: impl Into<String>) -> Self {
        Self {
            status: "fail".to_string(),
            timestamp,
            nano_id: nano_id.into(),
        }
    }
}

/// Request received on the `provisioning` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
}

/// Credentials minted by the metadata service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionCredentials {
    pub username: String,
    pub password: String,
    pub status: String,
}

/// Answer published on `provisioning/<serial>/response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub pattern: String,
    pub data: ProvisionCredentials,
}

/// Enriched event republished on the KV store's `sensor:<kind>` channel.
#[derive(Debug, Clone, Serialize)]
pub struct SensorEvent<'a, T: Serialize> {
    pub serial_number: &'a str,
    pub data: &'a T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_level_payload_defaults() {
        let payload: LevelPayload = serde_json::from_str(r#"{"ts": 1700000000}"#).unwrap();
        assert_eq!(payload.ts, 1700000000);
        assert_eq!(payload.level, 0.0);
        assert_eq!(payload.device, DeviceHealth::default());
        assert_eq!(payload.solar, SolarBlock::default());
    }

    #[test]
    fn flow_payload_uses_wire_names() {
        let payload: FlowPayload = serde_json::from_str(
            r#"{"ts": 10, "vHi": 1, "vLo": 2, "vDec": 500, "fRateHi": 0, "fRateLo": 2000}"#,
        )
        .unwrap();
        assert_eq!(payload.v_hi, 1);
        assert_eq!(payload.v_lo, 2);
        assert_eq!(payload.v_dec, 500);
        assert_eq!(payload.f_rate_hi, 0);
        assert_eq!(payload.f_rate_lo, 2000);
    }

    #[test]
    fn filling_payload_missing_nano_id_is_empty() {
        let payload: FillingPayload =
            serde_json::from_str(r#"{"ts": 1700000000, "filling_state": 1, "level": 12.0}"#)
                .unwrap();
        assert!(payload.is_open());
        assert!(payload.nano_id.is_empty());
    }

    #[test]
    fn filling_response_wire_shape() {
        let response = FillingResponse::success(1700000000, "abc123def456");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["timestamp"], 1700000000);
        assert_eq!(json["nanoID"], "abc123def456");
    }

    #[test]
    fn device_health_parses_camel_case() {
        let device: DeviceHealth = serde_json::from_str(
            r#"{"uptime": 4200, "temp": 31.5, "hwVer": "2.1", "resetReason": 3}"#,
        )
        .unwrap();
        assert_eq!(device.uptime, 4200);
        assert_eq!(device.hw_ver, "2.1");
        assert_eq!(device.reset_reason, 3);
        assert_eq!(device.fw_ver, "");
    }
}
