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

// tests/filling_lifecycle.rs
// End-to-end scenarios for the filling-transaction state machine, run
// against an in-memory store that mirrors the row-level semantics of
// the filling_transaction table.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use medgas_db::filling_transaction::{FillingRow, FLAG_CLOSED, FLAG_INVALID, FLAG_UNCLOSED};
use medgas_db::DatabaseResult;
use medgas_transport::filling::{FillingMachine, FillingMessage, FillingStore};
use medgas_transport::messages::FillingPayload;

/// In-memory double of the `filling_transaction` table. Uniqueness on
/// `(serial_number, nano_id, state)` is enforced the way the conflict
/// target does it: a duplicate insert writes nothing.
#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<FillingRow>>,
}

impl MemoryStore {
    fn rows(&self) -> Vec<FillingRow> {
        self.rows.lock().unwrap().clone()
    }

    fn rows_for(&self, serial_number: &str, nano_id: &str) -> Vec<FillingRow> {
        self.rows()
            .into_iter()
            .filter(|row| row.serial_number == serial_number && row.nano_id == nano_id)
            .collect()
    }

    fn is_orphan(rows: &[FillingRow], row: &FillingRow) -> bool {
        row.state
            && row.flag.as_deref() == Some(FLAG_UNCLOSED)
            && !rows.iter().any(|other| {
                other.serial_number == row.serial_number
                    && other.nano_id == row.nano_id
                    && !other.state
            })
    }
}

#[async_trait]
impl FillingStore for MemoryStore {
    async fn orphan_open_ids(&self, serial_number: &str) -> DatabaseResult<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.serial_number == serial_number && Self::is_orphan(&rows, row))
            .map(|row| row.nano_id.clone())
            .collect())
    }

    async fn invalidate_orphans(&self, serial_number: &str) -> DatabaseResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let snapshot = rows.clone();
        let mut updated = 0;
        for row in rows.iter_mut() {
            if row.serial_number == serial_number && Self::is_orphan(&snapshot, row) {
                row.flag = Some(FLAG_INVALID.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn has_active_open(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool> {
        Ok(self.rows().iter().any(|row| {
            row.serial_number == serial_number
                && row.nano_id == nano_id
                && row.state
                && row.flag.as_deref() == Some(FLAG_UNCLOSED)
        }))
    }

    async fn close_exists(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<bool> {
        Ok(self
            .rows()
            .iter()
            .any(|row| row.serial_number == serial_number && row.nano_id == nano_id && !row.state))
    }

    async fn mark_closed(&self, serial_number: &str, nano_id: &str) -> DatabaseResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for row in rows.iter_mut() {
            if row.serial_number == serial_number
                && row.nano_id == nano_id
                && row.state
                && row.flag.as_deref() == Some(FLAG_UNCLOSED)
            {
                row.flag = Some(FLAG_CLOSED.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn insert(&self, row: &FillingRow) -> DatabaseResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let conflict = rows.iter().any(|existing| {
            existing.serial_number == row.serial_number
                && existing.nano_id == row.nano_id
                && existing.state == row.state
        });
        if conflict {
            return Ok(false);
        }
        rows.push(row.clone());
        Ok(true)
    }
}

const SERIAL: &str = "TANK001";

fn open_message(ts: i64, level: f64, nano_id: &str) -> FillingMessage {
    message(ts, 1, level, nano_id)
}

fn close_message(ts: i64, level: f64, nano_id: &str) -> FillingMessage {
    message(ts, 0, level, nano_id)
}

fn message(ts: i64, filling_state: i64, level: f64, nano_id: &str) -> FillingMessage {
    let payload = FillingPayload {
        ts,
        filling_state,
        level,
        nano_id: nano_id.to_string(),
    };
    // Calibration segment slope 2 / intercept 1 over the whole range.
    let level_kg = if level == 0.0 { 0.0 } else { level * 2.0 + 1.0 };
    FillingMessage::from_payload(SERIAL, &payload, level_kg, level_kg / 1.29)
}

/// Per-nano-id row-count invariant: at most one OPEN and one CLOSE row.
fn assert_row_uniqueness(store: &MemoryStore) {
    let rows = store.rows();
    for row in &rows {
        let opens = rows
            .iter()
            .filter(|r| r.serial_number == row.serial_number && r.nano_id == row.nano_id && r.state)
            .count();
        let closes = rows
            .iter()
            .filter(|r| {
                r.serial_number == row.serial_number && r.nano_id == row.nano_id && !r.state
            })
            .count();
        assert!(opens <= 1, "duplicate OPEN rows for {}", row.nano_id);
        assert!(closes <= 1, "duplicate CLOSE rows for {}", row.nano_id);
    }
}

/// A CLOSE row implies its OPEN row is flagged closed.
fn assert_close_implies_closed_open(store: &MemoryStore) {
    let rows = store.rows();
    for row in rows.iter().filter(|r| !r.state) {
        assert!(
            rows.iter().any(|open| {
                open.serial_number == row.serial_number
                    && open.nano_id == row.nano_id
                    && open.state
                    && open.flag.as_deref() == Some(FLAG_CLOSED)
            }),
            "CLOSE row without a closed OPEN for {}",
            row.nano_id
        );
    }
}

#[tokio::test]
async fn open_then_close_happy_path() {
    let machine = FillingMachine::new(MemoryStore::default());

    let open = machine
        .handle(&open_message(1700000000, 12.0, ""))
        .await
        .expect("OPEN must produce a response");
    assert_eq!(open.status, "success");
    assert_eq!(open.timestamp, 1700000000);
    let nano_id = open.nano_id.clone();
    assert!(!nano_id.is_empty());

    let close = machine
        .handle(&close_message(1700000600, 5.5, &nano_id))
        .await
        .expect("CLOSE must produce a response");
    assert_eq!(close.status, "success");
    assert_eq!(close.nano_id, nano_id);

    let store = machine.store();
    let rows = store.rows_for(SERIAL, &nano_id);
    assert_eq!(rows.len(), 2);

    let open_row = rows.iter().find(|row| row.state).unwrap();
    assert_eq!(open_row.flag.as_deref(), Some(FLAG_CLOSED));
    assert_eq!(open_row.level, 12.0);
    assert_eq!(open_row.level_kg, 25.0);
    assert_eq!(open_row.time, Utc.timestamp_opt(1700000000, 0).unwrap());

    let close_row = rows.iter().find(|row| !row.state).unwrap();
    assert_eq!(close_row.flag, None);
    assert_eq!(close_row.level, 5.5);

    assert_row_uniqueness(store);
    assert_close_implies_closed_open(store);
}

#[tokio::test]
async fn duplicate_open_invalidates_prior() {
    let machine = FillingMachine::new(MemoryStore::default());

    let first = machine
        .handle(&open_message(1700000000, 12.0, ""))
        .await
        .unwrap();
    assert_eq!(first.status, "success");

    let second = machine
        .handle(&open_message(1700000300, 13.0, ""))
        .await
        .unwrap();
    assert_eq!(second.status, "success");
    assert_ne!(first.nano_id, second.nano_id);

    let store = machine.store();
    let first_rows = store.rows_for(SERIAL, &first.nano_id);
    assert_eq!(first_rows.len(), 1);
    assert_eq!(first_rows[0].flag.as_deref(), Some(FLAG_INVALID));

    let second_rows = store.rows_for(SERIAL, &second.nano_id);
    assert_eq!(second_rows.len(), 1);
    assert_eq!(second_rows[0].flag.as_deref(), Some(FLAG_UNCLOSED));

    assert_row_uniqueness(store);
}

#[tokio::test]
async fn close_without_open_is_rejected() {
    let machine = FillingMachine::new(MemoryStore::default());

    let response = machine
        .handle(&close_message(1700000000, 5.5, "ZZZ"))
        .await
        .unwrap();
    assert_eq!(response.status, "fail");
    assert_eq!(response.nano_id, "ZZZ");

    assert!(machine.store().rows().is_empty());
}

#[tokio::test]
async fn duplicate_close_is_rejected() {
    let machine = FillingMachine::new(MemoryStore::default());

    let open = machine
        .handle(&open_message(1700000000, 12.0, ""))
        .await
        .unwrap();
    let nano_id = open.nano_id;

    let close = machine
        .handle(&close_message(1700000600, 5.5, &nano_id))
        .await
        .unwrap();
    assert_eq!(close.status, "success");

    let rows_before = machine.store().rows().len();
    let duplicate = machine
        .handle(&close_message(1700000600, 5.5, &nano_id))
        .await
        .unwrap();
    assert_eq!(duplicate.status, "fail");
    assert_eq!(machine.store().rows().len(), rows_before);

    assert_row_uniqueness(machine.store());
    assert_close_implies_closed_open(machine.store());
}

#[tokio::test]
async fn retransmitted_open_does_not_invalidate_itself() {
    let machine = FillingMachine::new(MemoryStore::default());

    let open = machine
        .handle(&open_message(1700000000, 12.0, ""))
        .await
        .unwrap();
    let nano_id = open.nano_id;

    // Same OPEN again, this time echoing the id it was assigned.
    let retransmit = machine
        .handle(&open_message(1700000000, 12.0, &nano_id))
        .await
        .unwrap();
    assert_eq!(retransmit.status, "success");
    assert_eq!(retransmit.nano_id, nano_id);

    let rows = machine.store().rows_for(SERIAL, &nano_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].flag.as_deref(), Some(FLAG_UNCLOSED));
}

#[tokio::test]
async fn close_with_empty_id_writes_nothing() {
    let machine = FillingMachine::new(MemoryStore::default());

    let response = machine
        .handle(&close_message(1700000000, 5.5, ""))
        .await
        .unwrap();
    assert_eq!(response.status, "fail");
    assert_eq!(response.nano_id, "");
    assert!(machine.store().rows().is_empty());
}

#[tokio::test]
async fn close_then_reopen_starts_a_fresh_transaction() {
    let machine = FillingMachine::new(MemoryStore::default());

    let first = machine
        .handle(&open_message(1700000000, 12.0, ""))
        .await
        .unwrap();
    machine
        .handle(&close_message(1700000600, 5.5, &first.nano_id))
        .await
        .unwrap();

    // Closed transactions aren't orphans; the new OPEN must not touch
    // the finished pair.
    let second = machine
        .handle(&open_message(1700001200, 14.0, ""))
        .await
        .unwrap();
    assert_eq!(second.status, "success");

    let store = machine.store();
    let first_open = store
        .rows_for(SERIAL, &first.nano_id)
        .into_iter()
        .find(|row| row.state)
        .unwrap();
    assert_eq!(first_open.flag.as_deref(), Some(FLAG_CLOSED));

    let second_rows = store.rows_for(SERIAL, &second.nano_id);
    assert_eq!(second_rows[0].flag.as_deref(), Some(FLAG_UNCLOSED));

    assert_row_uniqueness(store);
    assert_close_implies_closed_open(store);
}
