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

//! Read-through cache for device metadata and conversion tables.
//!
//! Records live in the KV store under `device/<serial>` and
//! `conversion_table/<serial>` with a 3-hour TTL; a miss fetches from
//! the metadata service and writes the record back. There is no
//! explicit invalidation, staleness is bounded by the TTL. Concurrent
//! misses for the same key may fetch twice; the remote call is
//! idempotent so the last write simply wins.
//!
//! The same connection doubles as the event bus: enriched sensor
//! events are republished on `sensor:<kind>` pub/sub channels,
//! fire-and-forget.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::convert::Segment;
use crate::errors::TransportError;
use crate::metadata::{DeviceRecord, MetadataClient};

/// Freshness window for cached records.
pub const CACHE_TTL_SECONDS: u64 = 3 * 60 * 60;

/// Open a connection manager against the KV store. The manager
/// reconnects on its own and is cheap to clone per operation.
pub async fn connect(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    metadata: Arc<MetadataClient>,
}

impl Cache {
    pub fn new(conn: ConnectionManager, metadata: Arc<MetadataClient>) -> Self {
        Self { conn, metadata }
    }

    /// Device record for the serial, from cache or the metadata service.
    pub async fn device(&self, serial_number: &str) -> Result<DeviceRecord, TransportError> {
        let key = format!("device/{serial_number}");
        let mut conn = self.conn.clone();

        let cached: Option<String> = conn.get(&key).await?;
        if let Some(json) = cached {
            return Ok(serde_json::from_str(&json)?);
        }

        let device = self.metadata.get_device(serial_number).await?;
        debug!("Device not found in cache, fetched from service: {serial_number}");
        self.store(&mut conn, &key, &device).await;
        Ok(device)
    }

    /// Conversion table for the serial, from cache or the metadata
    /// service.
    pub async fn conversion_table(
        &self,
        serial_number: &str,
    ) -> Result<Vec<Segment>, TransportError> {
        let key = format!("conversion_table/{serial_number}");
        let mut conn = self.conn.clone();

        let cached: Option<String> = conn.get(&key).await?;
        if let Some(json) = cached {
            return Ok(serde_json::from_str(&json)?);
        }

        let table = self.metadata.get_conversion_table(serial_number).await?;
        debug!("Conversion table not found in cache, fetched from service: {serial_number}");
        self.store(&mut conn, &key, &table).await;
        Ok(table)
    }

    // A failed write-back only costs a refetch on the next miss.
    async fn store<T: serde::Serialize>(&self, conn: &mut ConnectionManager, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Not caching {key}: {e}");
                return;
            }
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, json, CACHE_TTL_SECONDS)
            .await
        {
            warn!("Failed to cache {key}: {e}");
        }
    }

    /// Fire an enriched event at downstream consumers. Fire-and-forget:
    /// no delivery guarantees are offered on this channel.
    pub async fn publish_event(
        &self,
        channel: &str,
        payload: String,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }
}
