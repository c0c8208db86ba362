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

//! Filling-transaction state machine.
//!
//! A filling transaction is opened by an OPEN message and closed by a
//! CLOSE echoing the same correlation id. Per serial:
//!
//! - a fresh OPEN (no id on the wire) first invalidates every unclosed
//!   OPEN that never got a CLOSE, then inserts a new `unclosed` row
//!   under a generated id;
//! - an OPEN carrying an id is a retransmit and goes straight to the
//!   conflict-keyed insert;
//! - a CLOSE needs an active OPEN for its id, rejects duplicates, flips
//!   the OPEN row to `closed` and inserts the `state=false` row.
//!
//! The machine runs over individually-atomic statements; intra-serial
//! reordering cannot corrupt terminal state (every OPEN either opens or
//! invalidates a predecessor, every CLOSE either closes or is rejected).
//! Two simultaneous OPENs may both land as `unclosed`; the next OPEN
//! invalidates the stragglers.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use medgas_db::filling_transaction::{self, FillingRow, FLAG_UNCLOSED};
use medgas_db::DatabaseResult;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::messages::{FillingPayload, FillingResponse};

/// Correlation ids are 12 characters drawn from the timestamp++serial
/// alphabet. The id is opaque; the alphabet only seeds it.
pub const NANO_ID_LENGTH: usize = 12;

const MAX_GENERATE_ATTEMPTS: u32 = 3;
const GENERATE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

// nanoid accepts at most this many alphabet characters.
const MAX_ALPHABET_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
#[error("unusable correlation id alphabet ({0} characters)")]
struct AlphabetError(usize);

fn generate_nano_id(
    timestamp: DateTime<Utc>,
    serial_number: &str,
) -> Result<String, AlphabetError> {
    let alphabet: Vec<char> = format!("{}{}", timestamp.format("%Y%m%d%H%M%S"), serial_number)
        .chars()
        .collect();
    if alphabet.is_empty() || alphabet.len() > MAX_ALPHABET_LEN {
        return Err(AlphabetError(alphabet.len()));
    }

    Ok(nanoid::nanoid!(NANO_ID_LENGTH, &alphabet))
}

/// Generate a correlation id, retrying a few times before giving up and
/// letting the caller drop the message.
pub async fn generate_with_retry(
    timestamp: DateTime<Utc>,
    serial_number: &str,
) -> Result<String, TransportError> {
    for attempt in 1..=MAX_GENERATE_ATTEMPTS {
        match generate_nano_id(timestamp, serial_number) {
            Ok(id) if !id.is_empty() => return Ok(id),
            Ok(_) => {
                warn!("Generated empty correlation id for {serial_number} (attempt {attempt})")
            }
            Err(e) => {
                warn!("Error generating correlation id for {serial_number} (attempt {attempt}): {e}")
            }
        }
        tokio::time::sleep(GENERATE_RETRY_DELAY).await;
    }

    Err(TransportError::IdGeneration {
        attempts: MAX_GENERATE_ATTEMPTS,
    })
}

/// Storage the machine runs over. The Postgres implementation delegates
/// to `medgas_db`; tests swap in an in-memory store.
#[async_trait]
pub trait FillingStore: Send + Sync {
    async fn orphan_open_ids(&self, serial_number: &str) -> DatabaseResult<Vec<String>>;
    async fn invalidate_orphans(&self, serial_number: &str) -> DatabaseResult<u64>;
    async fn has_active_open(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool>;
    async fn close_exists(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool>;
    async fn mark_closed(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<u64>;
    async fn insert(&self, row: &FillingRow) -> DatabaseResult<bool>;
}

pub struct PgFillingStore {
    pool: PgPool,
}

impl PgFillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FillingStore for PgFillingStore {
    async fn orphan_open_ids(&self, serial_number: &str) -> DatabaseResult<Vec<String>> {
        filling_transaction::orphan_open_ids(&self.pool, serial_number).await
    }

    async fn invalidate_orphans(&self, serial_number: &str) -> DatabaseResult<u64> {
        filling_transaction::invalidate_orphans(&self.pool, serial_number).await
    }

    async fn has_active_open(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool> {
        filling_transaction::has_active_open(&self.pool, serial_number, nano_id).await
    }

    async fn close_exists(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool> {
        filling_transaction::close_exists(&self.pool, serial_number, nano_id).await
    }

    async fn mark_closed(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<u64> {
        filling_transaction::mark_closed(&self.pool, serial_number, nano_id).await
    }

    async fn insert(&self, row: &FillingRow) -> DatabaseResult<bool> {
        filling_transaction::insert(&self.pool, row).await
    }
}

/// A filling message after enrichment: topic serial attached, level
/// already converted.
#[derive(Debug, Clone)]
pub struct FillingMessage {
    pub serial_number: String,
    pub ts: i64,
    pub timestamp: DateTime<Utc>,
    pub state: bool,
    pub level: f64,
    pub level_kg: f64,
    pub level_meter_cubic: f64,
    pub nano_id: String,
}

impl FillingMessage {
    pub fn from_payload(
        serial_number: &str,
        payload: &FillingPayload,
        level_kg: f64,
        level_meter_cubic: f64,
    ) -> Self {
        Self {
            serial_number: serial_number.to_string(),
            ts: payload.ts,
            timestamp: Utc
                .timestamp_opt(payload.ts, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            state: payload.is_open(),
            level: payload.level,
            level_kg,
            level_meter_cubic,
            nano_id: payload.nano_id.clone(),
        }
    }
}

pub struct FillingMachine<S> {
    store: S,
}

impl<S: FillingStore> FillingMachine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one message through the machine. Returns the response to
    /// publish on the filling-response subtopic, or None when the
    /// message is dropped without a response (id generation exhausted).
    pub async fn handle(&self, msg: &FillingMessage) -> Option<FillingResponse> {
        if msg.state {
            self.handle_open(msg).await
        } else {
            Some(self.handle_close(msg).await)
        }
    }

    async fn handle_open(&self, msg: &FillingMessage) -> Option<FillingResponse> {
        let serial_number = &msg.serial_number;

        let nano_id = if msg.nano_id.is_empty() {
            let nano_id = match generate_with_retry(msg.timestamp, serial_number).await {
                Ok(id) => id,
                Err(e) => {
                    warn!("Dropping OPEN for {serial_number}: {e}");
                    return None;
                }
            };

            // A fresh OPEN supersedes whatever was left open on this
            // serial. A retransmit must not: its own row is among the
            // unclosed ones.
            match self.store.orphan_open_ids(serial_number).await {
                Ok(orphans) if !orphans.is_empty() => {
                    match self.store.invalidate_orphans(serial_number).await {
                        Ok(count) => info!(
                            "Marked {count} unclosed transactions as invalid for {serial_number}"
                        ),
                        Err(e) => {
                            warn!("Error invalidating unclosed transactions for {serial_number}: {e}");
                            return Some(FillingResponse::fail(msg.ts, nano_id));
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Error checking open transactions for {serial_number}: {e}");
                    return Some(FillingResponse::fail(msg.ts, nano_id));
                }
            }

            nano_id
        } else {
            msg.nano_id.clone()
        };

        let row = FillingRow {
            time: msg.timestamp,
            serial_number: serial_number.clone(),
            nano_id: nano_id.clone(),
            level: msg.level,
            level_kg: msg.level_kg,
            level_meter_cubic: msg.level_meter_cubic,
            state: true,
            flag: Some(FLAG_UNCLOSED.to_string()),
        };

        match self.store.insert(&row).await {
            Ok(inserted) => {
                if inserted {
                    info!("Opened filling transaction {nano_id} for {serial_number}");
                } else {
                    debug!("Retransmitted OPEN {nano_id} for {serial_number}, row already present");
                }
                Some(FillingResponse::success(msg.ts, nano_id))
            }
            Err(e) if e.is_benign_duplicate() => {
                debug!("Retransmitted OPEN {nano_id} for {serial_number}, row already present");
                Some(FillingResponse::success(msg.ts, nano_id))
            }
            Err(e) => {
                warn!("Error writing OPEN for {serial_number}: {e}");
                Some(FillingResponse::fail(msg.ts, nano_id))
            }
        }
    }

    async fn handle_close(&self, msg: &FillingMessage) -> FillingResponse {
        let serial_number = &msg.serial_number;
        let nano_id = msg.nano_id.clone();

        // CLOSE with no correlation id cannot match anything.
        if nano_id.is_empty() {
            warn!("CLOSE without correlation id for {serial_number}, skipping write");
            return FillingResponse::fail(msg.ts, nano_id);
        }

        match self.store.has_active_open(serial_number, &nano_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("No active transaction {nano_id} for {serial_number}, cannot close");
                return FillingResponse::fail(msg.ts, nano_id);
            }
            Err(e) => {
                warn!("Error checking active transaction for {serial_number}: {e}");
                return FillingResponse::fail(msg.ts, nano_id);
            }
        }

        match self.store.close_exists(serial_number, &nano_id).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("Duplicate CLOSE {nano_id} for {serial_number}, skipping");
                return FillingResponse::fail(msg.ts, nano_id);
            }
            Err(e) => {
                warn!("Error checking duplicate CLOSE for {serial_number}: {e}");
                return FillingResponse::fail(msg.ts, nano_id);
            }
        }

        if let Err(e) = self.store.mark_closed(serial_number, &nano_id).await {
            warn!("Error marking transaction {nano_id} closed for {serial_number}: {e}");
            return FillingResponse::fail(msg.ts, nano_id);
        }

        let row = FillingRow {
            time: msg.timestamp,
            serial_number: serial_number.clone(),
            nano_id: nano_id.clone(),
            level: msg.level,
            level_kg: msg.level_kg,
            level_meter_cubic: msg.level_meter_cubic,
            state: false,
            flag: None,
        };

        match self.store.insert(&row).await {
            Ok(true) => {
                info!("Closed filling transaction {nano_id} for {serial_number}");
                FillingResponse::success(msg.ts, nano_id)
            }
            Ok(false) => {
                // Lost a race with a concurrent duplicate CLOSE.
                warn!("Duplicate CLOSE {nano_id} for {serial_number}, skipping");
                FillingResponse::fail(msg.ts, nano_id)
            }
            Err(e) if e.is_benign_duplicate() => {
                warn!("Duplicate CLOSE {nano_id} for {serial_number}, skipping");
                FillingResponse::fail(msg.ts, nano_id)
            }
            Err(e) => {
                warn!("Error writing CLOSE for {serial_number}: {e}");
                FillingResponse::fail(msg.ts, nano_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().unwrap()
    }

    #[test]
    fn nano_id_has_fixed_length() {
        let id = generate_nano_id(ts(1700000000), "TANK001").unwrap();
        assert_eq!(id.chars().count(), NANO_ID_LENGTH);
    }

    #[test]
    fn nano_id_draws_from_timestamp_and_serial() {
        let timestamp = ts(1700000000);
        let alphabet: std::collections::HashSet<char> =
            format!("{}{}", timestamp.format("%Y%m%d%H%M%S"), "TANK001")
                .chars()
                .collect();

        let id = generate_nano_id(timestamp, "TANK001").unwrap();
        assert!(id.chars().all(|c| alphabet.contains(&c)));
    }

    #[test]
    fn oversized_alphabet_is_rejected() {
        let serial: String = std::iter::repeat('A').take(300).collect();
        assert!(generate_nano_id(ts(1700000000), &serial).is_err());
    }

    #[tokio::test]
    async fn retry_exhaustion_reports_attempts() {
        let serial: String = std::iter::repeat('A').take(300).collect();
        let err = generate_with_retry(ts(1700000000), &serial)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::IdGeneration { attempts: 3 }
        ));
    }

    #[test]
    fn message_from_payload_maps_state_and_time() {
        let payload = FillingPayload {
            ts: 1700000000,
            filling_state: 1,
            level: 12.0,
            nano_id: String::new(),
        };
        let msg = FillingMessage::from_payload("TANK001", &payload, 9.0, 6.97);
        assert!(msg.state);
        assert_eq!(msg.timestamp, ts(1700000000));
        assert_eq!(msg.level_kg, 9.0);

        let payload = FillingPayload {
            filling_state: 0,
            ..payload
        };
        let msg = FillingMessage::from_payload("TANK001", &payload, 9.0, 6.97);
        assert!(!msg.state);
    }
}
