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

//! Ingress wiring: shared subscription, worker pool, topic routing,
//! and the per-interval message counter.
//!
//! Workers are independent; there is no ordering guarantee across
//! workers, and messages for the same serial may be processed out of
//! order. The filling machine tolerates that by construction.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use mqlink::{Envelope, MqlinkClient, QoS};
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::PipelineConfig;
use crate::convert;
use crate::errors::TransportError;
use crate::filling::{FillingMachine, FillingMessage, PgFillingStore};
use crate::messages::FillingPayload;
use crate::metadata::MetadataClient;
use crate::provisioning;
use crate::sensors::SensorSinks;
use crate::topic::{parse_sensor_topic, TopicKind};

/// Capacity of the bounded ingress queue between the broker event loop
/// and the workers. When full, new messages are dropped and counted.
pub const INGRESS_QUEUE_CAPACITY: usize = 1000;

/// Shared subscription group: process instances cooperatively consume
/// one logical subscription.
pub const SUBSCRIPTION_GROUP: &str = "g1";

/// Topic filters the service consumes. Sensor streams are QoS 0
/// (at-most-once is acceptable at this volume); responses go out at
/// QoS 2.
pub const SUBSCRIPTION_FILTERS: [&str; 5] = [
    "provisioning",
    "JI/v2/+/level",
    "JI/v2/+/flow",
    "JI/v2/+/pressure",
    "JI/v2/+/filling",
];

const COUNTER_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

pub struct Service {
    broker: Arc<MqlinkClient>,
    cache: Cache,
    metadata: Arc<MetadataClient>,
    sinks: SensorSinks,
    filling: FillingMachine<PgFillingStore>,
    density_divisor: f64,
    workers: usize,
    messages_processed: AtomicI64,
}

impl Service {
    pub fn new(
        broker: Arc<MqlinkClient>,
        cache: Cache,
        metadata: Arc<MetadataClient>,
        pool: PgPool,
        pipeline: &PipelineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            broker,
            sinks: SensorSinks::new(cache.clone(), pool.clone(), pipeline.level_density_divisor),
            filling: FillingMachine::new(PgFillingStore::new(pool)),
            cache,
            metadata,
            density_divisor: pipeline.level_density_divisor,
            workers: pipeline.workers,
            messages_processed: AtomicI64::new(0),
        })
    }

    /// Subscribe every filter under the shared subscription group.
    pub async fn subscribe(&self) -> Result<(), mqlink::MqlinkError> {
        for filter in SUBSCRIPTION_FILTERS {
            let shared = format!("$share/{SUBSCRIPTION_GROUP}/{filter}");
            self.broker.subscribe(&shared, QoS::AtMostOnce).await?;
        }
        Ok(())
    }

    /// Spawn the worker pool over the ingress queue receiver. Workers
    /// exit when the queue closes (broker client shut down).
    pub fn spawn_workers(
        self: &Arc<Self>,
        receiver: mpsc::Receiver<Envelope>,
    ) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));
        (0..self.workers)
            .map(|worker| {
                let service = self.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    loop {
                        let envelope = { receiver.lock().await.recv().await };
                        match envelope {
                            Some(envelope) => service.route(envelope).await,
                            None => break,
                        }
                    }
                    debug!("Worker {worker} exiting");
                })
            })
            .collect()
    }

    /// Swap-and-log the message counter every 15 seconds.
    pub fn spawn_counter_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COUNTER_INTERVAL);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let count = service.messages_processed.swap(0, Ordering::Relaxed);
                info!("Messages processed per 15 seconds: {count}");
            }
        })
    }

    async fn route(&self, envelope: Envelope) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);

        let topic = envelope.topic.as_str();
        if topic == "provisioning" {
            if let Err(e) =
                provisioning::handle(&self.metadata, &self.broker, &envelope.payload).await
            {
                warn!("Error handling provisioning request: {e}");
            }
            return;
        }

        if topic.starts_with("JI/v2/") {
            let (serial_number, kind) = match parse_sensor_topic(topic) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("{e}");
                    return;
                }
            };

            let result = match kind {
                TopicKind::Level => self.sinks.handle_level(serial_number, &envelope.payload).await,
                TopicKind::Flow => self.sinks.handle_flow(serial_number, &envelope.payload).await,
                TopicKind::Pressure => {
                    self.sinks
                        .handle_pressure(serial_number, &envelope.payload)
                        .await
                }
                TopicKind::Filling => self.handle_filling(serial_number, &envelope.payload).await,
            };

            if let Err(e) = result {
                warn!("Dropping {} message for {serial_number}: {e}", kind.as_str());
            }
            return;
        }

        warn!("Unknown topic: {topic}");
    }

    async fn handle_filling(
        &self,
        serial_number: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.cache.device(serial_number).await?;

        let payload: FillingPayload = serde_json::from_slice(payload)?;
        let table = self.cache.conversion_table(serial_number).await?;
        let (level_kg, level_meter_cubic) =
            convert::level_volumes(payload.level, &table, self.density_divisor);

        let msg = FillingMessage::from_payload(serial_number, &payload, level_kg, level_meter_cubic);
        if let Some(response) = self.filling.handle(&msg).await {
            let response_topic = format!("JI/v2/{serial_number}/filling-response");
            self.broker
                .publish_json(&response_topic, QoS::ExactlyOnce, &response)
                .await?;
        }

        Ok(())
    }
}
