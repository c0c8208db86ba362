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

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{with_deadline, DatabaseResult, DeviceColumns, STATEMENT_DEADLINE};

/// Per-gas column group of the pressure manifold table. The wire payload
/// is a variable-length list; the table flattens it into one group per
/// known gas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GasColumns {
    pub value: f64,
    pub connection: i32,
    pub enable: bool,
    pub high_limit: f64,
    pub low_limit: f64,
}

/// One row of the `sensor_pressure` hypertable.
#[derive(Debug, Clone, Default)]
pub struct SensorPressureRow {
    pub time: DateTime<Utc>,
    pub serial_number: String,
    pub nitrous_oxide: GasColumns,
    pub oxygen: GasColumns,
    pub medical_air: GasColumns,
    pub vacuum: GasColumns,
    pub device: DeviceColumns,
}

/// Insert a manifold reading; conflict on `(time, serial_number)` is a
/// no-op. Returns whether a row was actually written.
pub async fn insert(pool: &PgPool, row: &SensorPressureRow) -> DatabaseResult<bool> {
    let query = "INSERT INTO sensor_pressure (
            time, serial_number,
            nitrous_oxide_value, nitrous_oxide_connection, nitrous_oxide_enable,
            nitrous_oxide_high_limit, nitrous_oxide_low_limit,
            oxygen_value, oxygen_connection, oxygen_enable,
            oxygen_high_limit, oxygen_low_limit,
            medical_air_value, medical_air_connection, medical_air_enable,
            medical_air_high_limit, medical_air_low_limit,
            vacuum_value, vacuum_connection, vacuum_enable,
            vacuum_high_limit, vacuum_low_limit,
            device_uptime, device_temp, device_hum, device_long, device_lat,
            device_rssi, device_hw_ver, device_fw_ver, device_rd_ver,
            device_model, device_mem_usage, device_reset_reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
            $27, $28, $29, $30, $31, $32, $33, $34)
        ON CONFLICT (time, serial_number) DO NOTHING";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query)
            .bind(row.time)
            .bind(&row.serial_number)
            .bind(row.nitrous_oxide.value)
            .bind(row.nitrous_oxide.connection)
            .bind(row.nitrous_oxide.enable)
            .bind(row.nitrous_oxide.high_limit)
            .bind(row.nitrous_oxide.low_limit)
            .bind(row.oxygen.value)
            .bind(row.oxygen.connection)
            .bind(row.oxygen.enable)
            .bind(row.oxygen.high_limit)
            .bind(row.oxygen.low_limit)
            .bind(row.medical_air.value)
            .bind(row.medical_air.connection)
            .bind(row.medical_air.enable)
            .bind(row.medical_air.high_limit)
            .bind(row.medical_air.low_limit)
            .bind(row.vacuum.value)
            .bind(row.vacuum.connection)
            .bind(row.vacuum.enable)
            .bind(row.vacuum.high_limit)
            .bind(row.vacuum.low_limit)
            .bind(row.device.uptime)
            .bind(row.device.temp)
            .bind(row.device.hum)
            .bind(row.device.long)
            .bind(row.device.lat)
            .bind(row.device.rssi)
            .bind(&row.device.hw_ver)
            .bind(&row.device.fw_ver)
            .bind(&row.device.rd_ver)
            .bind(&row.device.model)
            .bind(row.device.mem_usage)
            .bind(row.device.reset_reason)
            .execute(pool),
    )
    .await?;

    Ok(result.rows_affected() > 0)
}
