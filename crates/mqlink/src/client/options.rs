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

// src/client/options.rs
// Configuration options for the mqlink client.

use tokio::time::Duration;

// ClientOptions are optional parameters that can be
// passed to the client, all of which have default
// fallbacks in the client itself.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    // keep_alive sets the keepalive to use for MQTT broker connections.
    pub keep_alive: Option<Duration>,
    // channel_capacity is the number of *messages* the underlying
    // async client queue should buffer before no longer reading
    // additional bytes from the wire.
    pub channel_capacity: Option<usize>,
    // queue_capacity sets a limit to the number of messages that
    // can be buffered in our local ingest queue (between the event
    // loop task and the consumer) before dropping.
    pub queue_capacity: Option<usize>,
    // credentials is an optional username/password pair for
    // authenticating with the broker.
    pub credentials: Option<ClientCredentials>,
    // clean_start controls whether the broker discards session
    // state from a previous connection with the same client id.
    pub clean_start: Option<bool>,
}

impl ClientOptions {
    // Builder methods that consume and return Self.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_credentials(mut self, credentials: ClientCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_clean_start(mut self, clean_start: bool) -> Self {
        self.clean_start = Some(clean_start);
        self
    }
}

// ClientCredentials are used for providing a username
// and password to the MQTT server.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let options = ClientOptions::default()
            .with_keep_alive(Duration::from_secs(30))
            .with_channel_capacity(500)
            .with_queue_capacity(1000)
            .with_clean_start(true)
            .with_credentials(ClientCredentials {
                username: "tank".to_string(),
                password: "hunter2".to_string(),
            });

        assert_eq!(options.keep_alive, Some(Duration::from_secs(30)));
        assert_eq!(options.channel_capacity, Some(500));
        assert_eq!(options.queue_capacity, Some(1000));
        assert_eq!(options.clean_start, Some(true));
        assert_eq!(options.credentials.unwrap().username, "tank");
    }
}
