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

// src/stats.rs
// Atomic counters for queue depth and publish throughput. Trackers are
// shared between the event loop task and callers; snapshots are plain
// value types safe to log or export.

use std::sync::atomic::{AtomicU64, Ordering};

// QueueStats is a point-in-time snapshot of the local ingest queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    // enqueued is the total number of messages pushed onto the
    // local queue since startup (or the last reset).
    pub enqueued: u64,
    // dropped is the number of messages discarded because the
    // queue was full when they arrived.
    pub dropped: u64,
    // event_loop_errors counts connection-level errors seen by
    // the event loop (each one triggers a backoff + reconnect).
    pub event_loop_errors: u64,
}

#[derive(Debug, Default)]
pub struct QueueStatsTracker {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    event_loop_errors: AtomicU64,
}

impl QueueStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_event_loop_errors(&self) {
        self.event_loop_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            event_loop_errors: self.event_loop_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counters(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.event_loop_errors.store(0, Ordering::Relaxed);
    }
}

// PublishStats is a point-in-time snapshot of outgoing traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishStats {
    // published is the number of messages handed to the broker client.
    pub published: u64,
    // failed is the number of publish attempts that errored.
    pub failed: u64,
    // bytes_published is the total payload bytes of successful publishes.
    pub bytes_published: u64,
}

#[derive(Debug, Default)]
pub struct PublishStatsTracker {
    published: AtomicU64,
    failed: AtomicU64,
    bytes_published: AtomicU64,
}

impl PublishStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_published(&self, payload_size: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published
            .fetch_add(payload_size as u64, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_stats(&self) -> PublishStats {
        PublishStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counters(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bytes_published.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_tracker_counts_and_resets() {
        let tracker = QueueStatsTracker::new();
        tracker.increment_enqueued();
        tracker.increment_enqueued();
        tracker.increment_dropped();
        tracker.increment_event_loop_errors();

        let stats = tracker.to_stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.event_loop_errors, 1);

        tracker.reset_counters();
        let stats = tracker.to_stats();
        assert_eq!(stats.enqueued, 0);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn publish_tracker_tracks_bytes() {
        let tracker = PublishStatsTracker::new();
        tracker.increment_published(128);
        tracker.increment_published(64);
        tracker.increment_failed();

        let stats = tracker.to_stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.bytes_published, 192);
    }
}
