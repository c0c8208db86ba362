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

/// One row of the `sensor_flow` hypertable: the decoded totalizer plus
/// the raw 16-bit words it was derived from.
#[derive(Debug, Clone, Default)]
pub struct SensorFlowRow {
    pub time: DateTime<Utc>,
    pub serial_number: String,
    pub total_volume: f64,
    pub volume_high: i32,
    pub volume_low: i32,
    pub volume_decimal: i32,
    pub flow_rate: f64,
    pub flow_rate_high: i32,
    pub flow_rate_low: i32,
    pub device: DeviceColumns,
}

/// Insert a flow reading; conflict on `(time, serial_number)` is a no-op.
/// Returns whether a row was actually written.
pub async fn insert(pool: &PgPool, row: &SensorFlowRow) -> DatabaseResult<bool> {
    let query = "INSERT INTO sensor_flow (
            time, serial_number, total_volume, volume_high, volume_low,
            volume_decimal, flow_rate, flow_rate_high, flow_rate_low,
            device_uptime, device_temp, device_hum, device_long, device_lat,
            device_rssi, device_hw_ver, device_fw_ver, device_rd_ver,
            device_model, device_mem_usage, device_reset_reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21)
        ON CONFLICT (time, serial_number) DO NOTHING";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query)
            .bind(row.time)
            .bind(&row.serial_number)
            .bind(row.total_volume)
            .bind(row.volume_high)
            .bind(row.volume_low)
            .bind(row.volume_decimal)
            .bind(row.flow_rate)
            .bind(row.flow_rate_high)
            .bind(row.flow_rate_low)
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
