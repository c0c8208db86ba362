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

//! Sensor topic grammar: `JI/v2/<serial>/<kind>`, exactly four
//! slash-delimited segments.

use crate::errors::TransportError;

/// Telemetry kinds carried on sensor subtopics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Level,
    Flow,
    Pressure,
    Filling,
}

impl TopicKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "level" => Some(Self::Level),
            "flow" => Some(Self::Flow),
            "pressure" => Some(Self::Pressure),
            "filling" => Some(Self::Filling),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Flow => "flow",
            Self::Pressure => "pressure",
            Self::Filling => "filling",
        }
    }

    /// KV pub/sub channel enriched events for this kind republish on.
    pub fn event_channel(&self) -> &'static str {
        match self {
            Self::Level => "sensor:level",
            Self::Flow => "sensor:flow",
            Self::Pressure => "sensor:pressure",
            Self::Filling => "sensor:filling",
        }
    }
}

/// Split a sensor topic into its serial number and kind.
pub fn parse_sensor_topic(topic: &str) -> Result<(&str, TopicKind), TransportError> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != 4 || parts[0] != "JI" || parts[1] != "v2" {
        return Err(TransportError::InvalidTopic(topic.to_string()));
    }

    let kind = TopicKind::from_segment(parts[3])
        .ok_or_else(|| TransportError::InvalidTopic(topic.to_string()))?;

    Ok((parts[2], kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_four_segment_sensor_topics() {
        let (serial, kind) = parse_sensor_topic("JI/v2/TANK001/level").unwrap();
        assert_eq!(serial, "TANK001");
        assert_eq!(kind, TopicKind::Level);

        let (serial, kind) = parse_sensor_topic("JI/v2/FLOW-7/flow").unwrap();
        assert_eq!(serial, "FLOW-7");
        assert_eq!(kind, TopicKind::Flow);

        let (_, kind) = parse_sensor_topic("JI/v2/M-1/pressure").unwrap();
        assert_eq!(kind, TopicKind::Pressure);

        let (_, kind) = parse_sensor_topic("JI/v2/M-1/filling").unwrap();
        assert_eq!(kind, TopicKind::Filling);
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        assert!(parse_sensor_topic("JI/v2/level").is_err());
        assert!(parse_sensor_topic("JI/v2/gateway/node/level").is_err());
        assert!(parse_sensor_topic("").is_err());
        assert!(parse_sensor_topic("provisioning").is_err());
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(parse_sensor_topic("AI/v2/TANK001/level").is_err());
        assert!(parse_sensor_topic("JI/v1/TANK001/level").is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse_sensor_topic("JI/v2/TANK001/humidity").is_err());
    }
}
