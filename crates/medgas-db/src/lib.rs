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

pub mod filling_transaction;
pub mod sensor_flow;
pub mod sensor_level;
pub mod sensor_pressure;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;
use std::time::Duration;

/// Deadline applied to every write statement.
pub const STATEMENT_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline applied to duplicate-existence probes in the filling machine.
pub const PROBE_DEADLINE: Duration = Duration::from_secs(2);

///
/// Wraps a sqlx::Error and records location and query
///
#[derive(Debug)]
pub struct AnnotatedSqlxError {
    file: &'static str,
    line: u32,
    query: String,
    pub source: sqlx::Error,
}

impl Display for AnnotatedSqlxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Database Error: {} file={} line={} query={}.",
            self.source, self.file, self.line, self.query,
        )
    }
}

impl Error for AnnotatedSqlxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlx(#[from] AnnotatedSqlxError),
    #[error("Database statement timed out: query={query}")]
    Timeout {
        /// The statement that exceeded its deadline
        query: String,
    },
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// How the caller should treat a failed (or conflicting) write.
///
/// Sensor streams are at-most-once: nothing here triggers a retry. A
/// duplicate key means the row already exists and the write counts as a
/// success; everything else is reported and the message dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unique violation (SQLSTATE 23505): idempotent write, treat as success.
    DuplicateKey,
    /// Foreign-key / not-null / check violation (23503/23502/23514).
    ConstraintViolation,
    /// Statement deadline exceeded.
    Timeout,
    /// Anything else (connection loss, protocol errors, ...).
    Other,
}

impl DatabaseError {
    #[track_caller]
    pub fn query(query: &str, source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: query.to_string(),
            source,
        })
    }

    /// Classify the error for the skip/retry/fail policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            DatabaseError::Timeout { .. } => ErrorClass::Timeout,
            DatabaseError::Sqlx(annotated) => match &annotated.source {
                sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                    Some("23505") => ErrorClass::DuplicateKey,
                    Some("23503") | Some("23502") | Some("23514") => {
                        ErrorClass::ConstraintViolation
                    }
                    _ => ErrorClass::Other,
                },
                _ => ErrorClass::Other,
            },
        }
    }

    /// Returns true when the write can be counted as having succeeded
    /// (the row was already there).
    pub fn is_benign_duplicate(&self) -> bool {
        self.class() == ErrorClass::DuplicateKey
    }
}

/// Run a statement future under a deadline, mapping both failure modes
/// into [DatabaseError].
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    query: &str,
    fut: F,
) -> DatabaseResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DatabaseError::query(query, e)),
        Err(_) => Err(DatabaseError::Timeout {
            query: query.to_string(),
        }),
    }
}

/// Device-health columns shared by every sensor table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceColumns {
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
