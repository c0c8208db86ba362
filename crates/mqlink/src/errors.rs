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

// src/errors.rs
// Error types for error handling throughout the MQTT client library.

use thiserror::Error;

// MqlinkError covers all possible error conditions in the
// MQTT client. Each variant provides specific context about
// what went wrong and why.
#[derive(Error, Debug)]
pub enum MqlinkError {
    // ConnectionError occurs when MQTT broker communication fails
    // (network issues, auth failures).
    #[error("MQTT connection error: {0}")]
    ConnectionError(#[from] rumqttc::v5::ClientError),
    // JsonSerializationError occurs when JSON payload serialization fails.
    #[error("JSON serialization error: {0}")]
    JsonSerializationError(#[from] serde_json::Error),
    // TopicEncodingError occurs when a received topic is not valid UTF-8.
    #[error("Topic is not valid UTF-8: {0}")]
    TopicEncodingError(String),
    // AlreadyStartedError occurs when start() has already
    // been called on the client.
    #[error("Already started error: start() has already been called on the client")]
    AlreadyStartedError,
}

impl MqlinkError {
    // Check if this error is related to network connectivity.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    // Check if this error is related to payload handling.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Self::JsonSerializationError(_))
    }
}
