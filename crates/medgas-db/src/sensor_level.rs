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

/// One row of the `sensor_level` hypertable: the raw tank reading, its
/// converted mass/volume, and the reporting device's health and solar
/// telemetry.
#[derive(Debug, Clone, Default)]
pub struct SensorLevelRow {
    pub time: DateTime<Utc>,
    pub serial_number: String,
    pub level: f64,
    pub level_kg: f64,
    pub level_meter_cubic: f64,
    pub device: DeviceColumns,
    pub solar_batt_temp: f64,
    pub solar_batt_level: f64,
    pub solar_batt_volt: f64,
    pub solar_batt_status: Vec<i32>,
    pub solar_device_status: Vec<i32>,
    pub solar_load_status: Vec<i32>,
    pub solar_e_gen: Vec<f64>,
    pub solar_e_com: Vec<f64>,
}

/// Insert a level reading. The `(time, serial_number)` primary key makes
/// retransmits no-ops; returns whether a row was actually written.
pub async fn insert(pool: &PgPool, row: &SensorLevelRow) -> DatabaseResult<bool> {
    let query = "INSERT INTO sensor_level (
            time, serial_number, level, level_kg, level_meter_cubic,
            device_uptime, device_temp, device_hum, device_long, device_lat,
            device_rssi, device_hw_ver, device_fw_ver, device_rd_ver,
            device_model, device_mem_usage, device_reset_reason,
            solar_batt_temp, solar_batt_level, solar_batt_volt,
            solar_batt_status, solar_device_status, solar_load_status,
            solar_e_gen, solar_e_com
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
        ON CONFLICT (time, serial_number) DO NOTHING";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query)
            .bind(row.time)
            .bind(&row.serial_number)
            .bind(row.level)
            .bind(row.level_kg)
            .bind(row.level_meter_cubic)
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
            .bind(row.solar_batt_temp)
            .bind(row.solar_batt_level)
            .bind(row.solar_batt_volt)
            .bind(&row.solar_batt_status)
            .bind(&row.solar_device_status)
            .bind(&row.solar_load_status)
            .bind(&row.solar_e_gen)
            .bind(&row.solar_e_com)
            .execute(pool),
    )
    .await?;

    Ok(result.rows_affected() > 0)
}
