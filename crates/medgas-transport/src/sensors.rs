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

//! Sensor sinks: one per telemetry kind.
//!
//! Each sink resolves the device (unknown serials are dropped),
//! deserializes the typed payload, computes derived fields, inserts the
//! row (the `(time, serial_number)` primary key absorbs retransmits)
//! and republishes the enriched event on the KV store's pub/sub
//! channel.

use chrono::{DateTime, TimeZone, Utc};
use medgas_db::sensor_pressure::GasColumns;
use medgas_db::{DatabaseResult, DeviceColumns};
use sqlx::PgPool;
use tracing::debug;

use crate::cache::Cache;
use crate::convert;
use crate::errors::TransportError;
use crate::messages::{
    DeviceHealth, FlowPayload, GasReading, LevelPayload, PressurePayload, SensorEvent,
};
use crate::topic::TopicKind;

pub struct SensorSinks {
    cache: Cache,
    pool: PgPool,
    density_divisor: f64,
}

impl SensorSinks {
    pub fn new(cache: Cache, pool: PgPool, density_divisor: f64) -> Self {
        Self {
            cache,
            pool,
            density_divisor,
        }
    }

    pub async fn handle_level(
        &self,
        serial_number: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.cache.device(serial_number).await?;

        let payload: LevelPayload = serde_json::from_slice(payload)?;
        if payload.level < 0.0 {
            return Err(TransportError::NegativeLevel(payload.level));
        }

        let table = self.cache.conversion_table(serial_number).await?;
        let (level_kg, level_meter_cubic) =
            convert::level_volumes(payload.level, &table, self.density_divisor);

        let row = medgas_db::sensor_level::SensorLevelRow {
            time: reading_time(payload.ts),
            serial_number: serial_number.to_string(),
            level: payload.level,
            level_kg,
            level_meter_cubic,
            device: device_columns(&payload.device),
            solar_batt_temp: payload.solar.batt_temp,
            solar_batt_level: payload.solar.batt_level,
            solar_batt_volt: payload.solar.batt_volt,
            solar_batt_status: payload.solar.batt_status.clone(),
            solar_device_status: payload.solar.device_status.clone(),
            solar_load_status: payload.solar.load_status.clone(),
            solar_e_gen: payload.solar.e_gen.clone(),
            solar_e_com: payload.solar.e_com.clone(),
        };

        tolerate_duplicate(medgas_db::sensor_level::insert(&self.pool, &row).await)?;
        self.publish(TopicKind::Level, serial_number, &payload).await
    }

    pub async fn handle_flow(
        &self,
        serial_number: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.cache.device(serial_number).await?;

        let payload: FlowPayload = serde_json::from_slice(payload)?;

        let row = medgas_db::sensor_flow::SensorFlowRow {
            time: reading_time(payload.ts),
            serial_number: serial_number.to_string(),
            total_volume: convert::total_volume(payload.v_hi, payload.v_lo, payload.v_dec),
            volume_high: payload.v_hi,
            volume_low: payload.v_lo,
            volume_decimal: payload.v_dec,
            flow_rate: convert::flow_rate(payload.f_rate_hi, payload.f_rate_lo),
            flow_rate_high: payload.f_rate_hi,
            flow_rate_low: payload.f_rate_lo,
            device: device_columns(&payload.device),
        };

        tolerate_duplicate(medgas_db::sensor_flow::insert(&self.pool, &row).await)?;
        self.publish(TopicKind::Flow, serial_number, &payload).await
    }

    pub async fn handle_pressure(
        &self,
        serial_number: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.cache.device(serial_number).await?;

        let payload: PressurePayload = serde_json::from_slice(payload)?;
        let (nitrous_oxide, oxygen, medical_air, vacuum) = flatten_gases(&payload.data);

        let row = medgas_db::sensor_pressure::SensorPressureRow {
            time: reading_time(payload.ts),
            serial_number: serial_number.to_string(),
            nitrous_oxide,
            oxygen,
            medical_air,
            vacuum,
            device: device_columns(&payload.device),
        };

        tolerate_duplicate(medgas_db::sensor_pressure::insert(&self.pool, &row).await)?;
        self.publish(TopicKind::Pressure, serial_number, &payload)
            .await
    }

    async fn publish<T: serde::Serialize>(
        &self,
        kind: TopicKind,
        serial_number: &str,
        data: &T,
    ) -> Result<(), TransportError> {
        let event = serde_json::to_string(&SensorEvent {
            serial_number,
            data,
        })?;
        self.cache.publish_event(kind.event_channel(), event).await?;
        debug!("Stored and republished {} data for {serial_number}", kind.as_str());
        Ok(())
    }
}

fn reading_time(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn device_columns(device: &DeviceHealth) -> DeviceColumns {
    DeviceColumns {
        uptime: device.uptime,
        temp: device.temp,
        hum: device.hum,
        long: device.long,
        lat: device.lat,
        rssi: device.rssi,
        hw_ver: device.hw_ver.clone(),
        fw_ver: device.fw_ver.clone(),
        rd_ver: device.rd_ver.clone(),
        model: device.model.clone(),
        mem_usage: device.mem_usage,
        reset_reason: device.reset_reason,
    }
}

/// Flatten the variable-length gas list into fixed column groups.
/// Unknown measurement names are ignored, never faulted: the set is
/// expected to grow.
fn flatten_gases(readings: &[GasReading]) -> (GasColumns, GasColumns, GasColumns, GasColumns) {
    let mut nitrous_oxide = GasColumns::default();
    let mut oxygen = GasColumns::default();
    let mut medical_air = GasColumns::default();
    let mut vacuum = GasColumns::default();

    for reading in readings {
        let columns = GasColumns {
            value: reading.value,
            connection: reading.connection,
            enable: reading.enable,
            high_limit: reading.high_limit,
            low_limit: reading.low_limit,
        };
        match reading.measurement.as_str() {
            "nitrous oxide" => nitrous_oxide = columns,
            "oxygen" => oxygen = columns,
            "medical air" => medical_air = columns,
            "vacuum" => vacuum = columns,
            other => debug!("Ignoring unknown gas measurement: {other}"),
        }
    }

    (nitrous_oxide, oxygen, medical_air, vacuum)
}

// A conflicting insert means the row is already there; the write
// counts as done (I4).
fn tolerate_duplicate(result: DatabaseResult<bool>) -> Result<(), TransportError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_benign_duplicate() => {
            debug!("Duplicate sensor row suppressed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
