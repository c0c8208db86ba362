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

//! Transport service for medical-gas monitoring devices.
//!
//! Consumes device telemetry from the broker on a shared subscription,
//! enriches it with device metadata, converts raw readings into
//! engineering units, persists time-series rows and filling-transaction
//! records into TimescaleDB, republishes enriched events on the KV
//! store's pub/sub channels, and answers request/response subtopics.

pub mod cache;
pub mod config;
pub mod convert;
pub mod errors;
pub mod filling;
pub mod messages;
pub mod metadata;
pub mod provisioning;
pub mod sensors;
pub mod service;
pub mod topic;

pub use config::Config;
pub use errors::TransportError;
pub use service::Service;
