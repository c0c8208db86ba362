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

use medgas_db::DatabaseError;
use thiserror::Error;

use crate::metadata::MetadataError;

// TransportError covers everything that can go wrong while handling a
// single message. The worker logs the error and drops the message; the
// pipeline is at-most-once, nothing retries.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid topic format: {0}")]
    InvalidTopic(String),
    #[error("Error parsing payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Invalid level reading: {0}")]
    NegativeLevel(f64),
    #[error("Metadata service error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("KV store error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Broker error: {0}")]
    Broker(#[from] mqlink::MqlinkError),
    #[error("Correlation id generation failed after {attempts} attempts")]
    IdGeneration { attempts: u32 },
}

impl TransportError {
    // Check if this error means the device is unknown to the
    // metadata service (as opposed to the service being down).
    pub fn is_device_not_found(&self) -> bool {
        matches!(self, Self::Metadata(MetadataError::DeviceNotFound(_)))
    }
}
