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

// src/client/core.rs
// Main MQTT client implementation.
//
// The client owns a rumqttc v5 AsyncClient plus its EventLoop, and on
// start() splits incoming traffic from broker I/O: an event loop task
// polls the connection and pushes every received publication onto a
// bounded local queue, which the caller drains through the returned
// receiver. The enqueue never blocks the network task; when the queue
// is full the message is dropped and counted.

use std::sync::Arc;

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::client::ClientOptions;
use crate::errors::MqlinkError;
use crate::stats::{PublishStats, PublishStatsTracker, QueueStats, QueueStatsTracker};

const DEFAULT_KEEP_ALIVE: std::time::Duration = std::time::Duration::from_secs(60);
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
const DEFAULT_QUEUE_CAPACITY: usize = 1000;

// Envelope is a received publication: the topic it arrived on and the
// raw payload bytes. Routing and deserialization are the consumer's job.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: Vec<u8>,
}

// MqlinkClient wraps the rumqttc v5 client for both listening and
// sending. Create it, subscribe to the topic filters you care about,
// then call start() to get the receiver end of the ingest queue.
pub struct MqlinkClient {
    // client is the underlying MQTT client for actual network
    // communication.
    client: AsyncClient,
    // client_id is the client ID that we pass to the underlying
    // rumqttc::v5::AsyncClient. The AsyncClient itself doesn't
    // provide access to it, so we store it here for logging.
    client_id: String,
    // event_loop is stored to be consumed by start().
    event_loop: Mutex<Option<EventLoop>>,
    // options holds the optional client configuration; missing
    // fields fall back to the default consts.
    options: Option<ClientOptions>,
    // queue_stats tracks local ingest queue throughput and drops.
    queue_stats: Arc<QueueStatsTracker>,
    // publish_stats tracks message publishing statistics.
    publish_stats: Arc<PublishStatsTracker>,
}

impl MqlinkClient {
    // new creates a new MQTT v5 client. Call subscribe() for each topic
    // filter, then start() to begin receiving messages.
    pub fn new(
        broker_host: &str,
        broker_port: u16,
        client_id: &str,
        options: Option<ClientOptions>,
    ) -> Arc<Self> {
        let mut mqtt_options = MqttOptions::new(client_id, broker_host, broker_port);
        mqtt_options.set_keep_alive(
            options
                .as_ref()
                .and_then(|opts| opts.keep_alive)
                .unwrap_or(DEFAULT_KEEP_ALIVE),
        );
        mqtt_options.set_clean_start(
            options
                .as_ref()
                .and_then(|opts| opts.clean_start)
                .unwrap_or(true),
        );

        if let Some(credentials) = options.as_ref().and_then(|opts| opts.credentials.as_ref()) {
            mqtt_options.set_credentials(
                credentials.username.clone(),
                credentials.password.clone(),
            );
        }

        let (client, event_loop) = AsyncClient::new(
            mqtt_options,
            options
                .as_ref()
                .and_then(|opts| opts.channel_capacity)
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        );

        info!("Created MQTT client for {}:{}", broker_host, broker_port);

        Arc::new(Self {
            client,
            client_id: client_id.into(),
            event_loop: Mutex::new(Some(event_loop)),
            options,
            queue_stats: Arc::new(QueueStatsTracker::new()),
            publish_stats: Arc::new(PublishStatsTracker::new()),
        })
    }

    // subscribe subscribes to a topic filter with the specified QoS.
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MqlinkError> {
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(MqlinkError::ConnectionError)?;

        info!("Subscribed to topic: {} (QoS: {:?})", topic, qos);
        Ok(())
    }

    // start spawns the event loop task and returns the receiving end of
    // the local ingest queue. The task polls the broker connection,
    // converts every incoming publication into an Envelope, and pushes
    // it onto the queue with try_send so the network task never stalls
    // behind a slow consumer; a full queue drops the message.
    //
    // Connection errors back off (100ms doubling up to 30s) and the
    // next poll reconnects; any successfully received event resets
    // the backoff.
    pub async fn start(self: &Arc<Self>) -> Result<mpsc::Receiver<Envelope>, MqlinkError> {
        let mut event_loop = self
            .event_loop
            .lock()
            .await
            .take()
            .ok_or(MqlinkError::AlreadyStartedError)?;

        let (queue_tx, queue_rx) = mpsc::channel::<Envelope>(
            self.options
                .as_ref()
                .and_then(|opts| opts.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
        );

        let queue_stats = self.queue_stats.clone();
        let client_id = self.client_id.clone();
        let mut backoff = ReconnectBackoff::new();
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        backoff.reset();
                        let Event::Incoming(Packet::Publish(publish)) = event else {
                            continue;
                        };

                        let topic = match String::from_utf8(publish.topic.to_vec()) {
                            Ok(topic) => topic,
                            Err(_) => {
                                warn!("Dropping publication with non-UTF-8 topic");
                                continue;
                            }
                        };

                        let envelope = Envelope {
                            topic,
                            payload: publish.payload.to_vec(),
                        };
                        match queue_tx.try_send(envelope) {
                            Ok(_) => queue_stats.increment_enqueued(),
                            Err(mpsc::error::TrySendError::Full(envelope)) => {
                                warn!(
                                    "Ingest queue full, dropping message from topic: {}",
                                    envelope.topic
                                );
                                queue_stats.increment_dropped();
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                // The receiving end only closes when the
                                // application is shutting down.
                                debug!("Ingest queue receiver dropped, stopping event loop");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        error!("MQTT event loop connection error ({client_id}): {e:?}");
                        queue_stats.increment_event_loop_errors();
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
            }
        });

        info!("MQTT client started and receiving messages");
        Ok(queue_rx)
    }

    // publish sends raw bytes to the specified MQTT topic.
    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        payload: Vec<u8>,
    ) -> Result<(), MqlinkError> {
        let payload_size = payload.len();
        match self.client.publish(topic, qos, false, payload).await {
            Ok(_) => {
                self.publish_stats.increment_published(payload_size);
                debug!("Published message to topic: {}", topic);
                Ok(())
            }
            Err(e) => {
                self.publish_stats.increment_failed();
                Err(MqlinkError::ConnectionError(e))
            }
        }
    }

    // publish_json serializes the value as JSON and publishes it.
    pub async fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        qos: QoS,
        value: &T,
    ) -> Result<(), MqlinkError> {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, qos, payload).await
    }

    // disconnect gracefully shuts down the MQTT client connection.
    // Should be called before dropping the client.
    pub async fn disconnect(&self) -> Result<(), MqlinkError> {
        self.client
            .disconnect()
            .await
            .map_err(MqlinkError::ConnectionError)?;

        info!("MQTT client disconnected");
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    // queue_stats returns a snapshot of ingest queue counters.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue_stats.to_stats()
    }

    // publish_stats returns current publish statistics for monitoring.
    pub fn publish_stats(&self) -> PublishStats {
        self.publish_stats.to_stats()
    }
}

// ReconnectBackoff is a basic capped doubling backoff for event loop
// errors: starts at 100ms and grows to 30 seconds.
struct ReconnectBackoff {
    current: std::time::Duration,
    max: std::time::Duration,
}

impl ReconnectBackoff {
    fn new() -> Self {
        Self {
            current: std::time::Duration::from_millis(100),
            max: std::time::Duration::from_secs(30),
        }
    }

    fn next_delay(&mut self) -> std::time::Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        warn!("Event loop backoff updated: {}ms", delay.as_millis());
        delay
    }

    fn reset(&mut self) {
        self.current = std::time::Duration::from_millis(100);
    }
}
