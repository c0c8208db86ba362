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

//! Row-level statements for the `filling_transaction` table.
//!
//! A filling transaction is an OPEN row (`state=true`) and a CLOSE row
//! (`state=false`) sharing a `nano_id`. The OPEN row's `flag` walks
//! `'unclosed'` -> `'closed'` (matched CLOSE arrived) or `'invalid'`
//! (superseded by a later OPEN). Sequencing lives in the transport
//! crate's state machine; each statement here is individually atomic,
//! which is all the machine relies on.
//!
//! Uniqueness on `(serial_number, nano_id, state)` backs duplicate
//! suppression: a retransmitted OPEN or CLOSE conflicts and writes
//! nothing.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{with_deadline, DatabaseResult, PROBE_DEADLINE, STATEMENT_DEADLINE};

pub const FLAG_UNCLOSED: &str = "unclosed";
pub const FLAG_CLOSED: &str = "closed";
pub const FLAG_INVALID: &str = "invalid";

/// One row of `filling_transaction`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillingRow {
    pub time: DateTime<Utc>,
    pub serial_number: String,
    pub nano_id: String,
    pub level: f64,
    pub level_kg: f64,
    pub level_meter_cubic: f64,
    pub state: bool,
    pub flag: Option<String>,
}

/// Correlation ids of every unclosed OPEN for the serial that has no
/// matching CLOSE row (orphans a fresh OPEN will invalidate).
pub async fn orphan_open_ids(pool: &PgPool, serial_number: &str) -> DatabaseResult<Vec<String>> {
    let query = "SELECT nano_id FROM filling_transaction
        WHERE serial_number = $1 AND state = true AND flag = 'unclosed'
        AND nano_id NOT IN (
            SELECT nano_id FROM filling_transaction
            WHERE serial_number = $1 AND state = false
        )";

    let rows: Vec<(String,)> = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query_as(query).bind(serial_number).fetch_all(pool),
    )
    .await?;

    Ok(rows.into_iter().map(|(nano_id,)| nano_id).collect())
}

/// Flip every orphaned OPEN of the serial to `'invalid'`. Returns the
/// number of rows updated.
pub async fn invalidate_orphans(pool: &PgPool, serial_number: &str) -> DatabaseResult<u64> {
    let query = "UPDATE filling_transaction SET flag = 'invalid'
        WHERE serial_number = $1 AND state = true AND flag = 'unclosed'
        AND nano_id NOT IN (
            SELECT nano_id FROM filling_transaction
            WHERE serial_number = $1 AND state = false
        )";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query).bind(serial_number).execute(pool),
    )
    .await?;

    Ok(result.rows_affected())
}

/// Whether an unclosed OPEN exists for this correlation id (CLOSE
/// precondition). Probe runs under the short deadline.
pub async fn has_active_open(
    pool: &PgPool,
    serial_number: &str,
    nano_id: &str,
) -> DatabaseResult<bool> {
    let query = "SELECT COUNT(*) FROM filling_transaction
        WHERE serial_number = $1 AND nano_id = $2 AND state = true AND flag = 'unclosed'";

    let (count,): (i64,) = with_deadline(
        PROBE_DEADLINE,
        query,
        sqlx::query_as(query)
            .bind(serial_number)
            .bind(nano_id)
            .fetch_one(pool),
    )
    .await?;

    Ok(count > 0)
}

/// Whether a CLOSE row already exists for this correlation id. Probe
/// runs under the short deadline.
pub async fn close_exists(
    pool: &PgPool,
    serial_number: &str,
    nano_id: &str,
) -> DatabaseResult<bool> {
    let query = "SELECT COUNT(*) FROM filling_transaction
        WHERE serial_number = $1 AND nano_id = $2 AND state = false";

    let (count,): (i64,) = with_deadline(
        PROBE_DEADLINE,
        query,
        sqlx::query_as(query)
            .bind(serial_number)
            .bind(nano_id)
            .fetch_one(pool),
    )
    .await?;

    Ok(count > 0)
}

/// Flip the unclosed OPEN for this correlation id to `'closed'`.
/// Returns the number of rows updated (0 when the OPEN vanished).
pub async fn mark_closed(
    pool: &PgPool,
    serial_number: &str,
    nano_id: &str,
) -> DatabaseResult<u64> {
    let query = "UPDATE filling_transaction SET flag = 'closed'
        WHERE serial_number = $1 AND nano_id = $2 AND state = true AND flag = 'unclosed'";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query)
            .bind(serial_number)
            .bind(nano_id)
            .execute(pool),
    )
    .await?;

    Ok(result.rows_affected())
}

/// Insert a transaction row. The `(serial_number, nano_id, state)`
/// uniqueness suppresses retransmits; returns whether a row was
/// actually written.
pub async fn insert(pool: &PgPool, row: &FillingRow) -> DatabaseResult<bool> {
    let query = "INSERT INTO filling_transaction (
            time, serial_number, nano_id, level, level_kg,
            level_meter_cubic, state, flag
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (serial_number, nano_id, state) DO NOTHING";

    let result = with_deadline(
        STATEMENT_DEADLINE,
        query,
        sqlx::query(query)
            .bind(row.time)
            .bind(&row.serial_number)
            .bind(&row.nano_id)
            .bind(row.level)
            .bind(row.level_kg)
            .bind(row.level_meter_cubic)
            .bind(row.state)
            .bind(&row.flag)
            .execute(pool),
    )
    .await?;

    Ok(result.rows_affected() > 0)
}
