use serde::{Deserialize, Serialize};

use crate::{
    LocalId, MachineId, MachineRef, MachineStatus, MachineType, RoomId, SensorId, TimestampMs,
};

/// A physical sensor node, identified by its MAC address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub sensor_id: SensorId,
    pub mac_address: String,
    pub room_id: Option<RoomId>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// A logical input on a sensor node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub source: String,
    pub local_id: LocalId,
}

impl Channel {
    pub fn new(source: impl Into<String>, local_id: LocalId) -> Self {
        Self {
            source: source.into(),
            local_id,
        }
    }

    pub fn matches(&self, source: &str, local_id: LocalId) -> bool {
        self.local_id == local_id && self.source == source
    }
}

/// Binds one channel of a sensor to exactly one machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SensorLink {
    pub sensor_id: SensorId,
    pub channel: Channel,
    pub machine: MachineRef,
}

/// Denormalized "current view" of a machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub machine_id: MachineId,
    pub label: String,
    pub machine_type: MachineType,
    pub room_id: Option<RoomId>,
    pub current_status: MachineStatus,
    pub previous_status: MachineStatus,
    pub last_updated: Option<TimestampMs>,
    pub last_change_time: Option<TimestampMs>,
}

impl Machine {
    pub fn new(machine_id: MachineId, label: impl Into<String>, machine_type: MachineType) -> Self {
        Self {
            machine_id,
            label: label.into(),
            machine_type,
            room_id: None,
            current_status: MachineStatus::Unknown,
            previous_status: MachineStatus::Unknown,
            last_updated: None,
            last_change_time: None,
        }
    }

    pub fn machine_ref(&self) -> MachineRef {
        MachineRef {
            machine_id: self.machine_id,
            machine_type: self.machine_type,
        }
    }

    /// Apply one ingestion call's effect: a reading arrived at `at`, and the
    /// canonical status moved through `transitions` (possibly none).
    ///
    /// `previous_status` ends up as the status held right before the last transition.
    pub fn record(&mut self, at: TimestampMs, transitions: &[MachineStatus]) {
        self.last_updated = Some(at);
        let Some((&last, earlier)) = transitions.split_last() else {
            return;
        };
        self.previous_status = earlier.last().copied().unwrap_or(self.current_status);
        self.current_status = last;
        self.last_change_time = Some(at);
    }
}
