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

use std::sync::Arc;

use clap::Parser;
use medgas_transport::{cache, service, Config, Service};
use medgas_transport::cache::Cache;
use medgas_transport::metadata::MetadataClient;
use mqlink::{ClientCredentials, ClientOptions, MqlinkClient};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "medgas-transport";

#[derive(Parser)]
#[command(name = SERVICE_NAME)]
#[command(about = "Transport service for medical-gas monitoring telemetry", long_about = None)]
struct Cli {
    // Increase log verbosity (-d for debug, -dd for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match cli.debug {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config = Config::from_env()?;

    info!("Setting up KV store connection");
    let kv = cache::connect(&config.redis.connection_url()).await?;

    info!("Setting up metadata service client");
    let metadata = Arc::new(MetadataClient::new(
        &config.metadata.url,
        &config.metadata.token,
    )?);

    info!("Setting up TimescaleDB pool");
    let pool = sqlx::PgPool::connect(&config.timescale.connection_url()).await?;

    info!("Setting up MQTT client");
    // Per-process suffix so shared-subscription group members don't
    // collide on client id.
    let client_id = format!("{}-{}", config.mqtt.client_id, std::process::id());
    let broker = MqlinkClient::new(
        &config.mqtt.host,
        config.mqtt.port,
        &client_id,
        Some(
            ClientOptions::default()
                .with_queue_capacity(service::INGRESS_QUEUE_CAPACITY)
                .with_credentials(ClientCredentials {
                    username: config.mqtt.username.clone(),
                    password: config.mqtt.password.clone(),
                }),
        ),
    );

    let service = Service::new(
        broker.clone(),
        Cache::new(kv, metadata.clone()),
        metadata,
        pool,
        &config.pipeline,
    );
    service.subscribe().await?;

    let receiver = broker.start().await?;
    service.spawn_workers(receiver);
    service.spawn_counter_ticker();

    info!("{SERVICE_NAME} started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    match tokio::time::timeout(std::time::Duration::from_secs(1), broker.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Error disconnecting MQTT client: {e}"),
        Err(_) => warn!("MQTT disconnect timed out"),
    }

    let stats = broker.queue_stats();
    info!(
        "Ingress totals: {} enqueued, {} dropped",
        stats.enqueued, stats.dropped
    );

    Ok(())
}
