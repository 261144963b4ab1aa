use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::{EventId, LocalId, MachineId, MachineStatus, StatusCode, TimestampMs};

/// Stand-in for a numeric code that has no integer value (fractional or out
/// of range). Never translates to a status.
pub const UNREPRESENTABLE_CODE: StatusCode = StatusCode::MIN;

/// One sensor sample: the measured value and the threshold it is judged against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub threshold: f64,
}

impl Reading {
    pub fn new(value: f64, threshold: f64) -> Self {
        Self { value, threshold }
    }

    /// `None` when either side is not a finite number.
    pub fn is_above(&self) -> Option<bool> {
        if self.value.is_finite() && self.threshold.is_finite() {
            Some(self.value > self.threshold)
        } else {
            None
        }
    }
}

/// One element of a batch posted by a sensor node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EspEvent {
    pub local_id: LocalId,
    pub source: String,
    #[serde(alias = "state", deserialize_with = "any_numeric_code")]
    pub status_code: StatusCode,
    #[serde(default)]
    pub readings: Vec<Reading>,
    /// Combination strategy reported by the firmware. Not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<i32>,
}

/// Accept any JSON number so one odd code cannot reject a whole upload.
fn any_numeric_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    struct CodeVisitor;

    impl<'de> Visitor<'de> for CodeVisitor {
        type Value = StatusCode;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a numeric status code")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<StatusCode, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<StatusCode, E> {
            Ok(StatusCode::try_from(v).unwrap_or(UNREPRESENTABLE_CODE))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<StatusCode, E> {
            let in_range = v > StatusCode::MIN as f64 && v < StatusCode::MAX as f64;
            if v.fract() == 0.0 && in_range {
                Ok(v as StatusCode)
            } else {
                Ok(UNREPRESENTABLE_CODE)
            }
        }
    }

    deserializer.deserialize_any(CodeVisitor)
}

/// A raw event before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRawEvent {
    pub machine_id: MachineId,
    pub status: MachineStatus,
    pub readings: Vec<Reading>,
    pub timestamp: TimestampMs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: EventId,
    pub machine_id: MachineId,
    pub status: MachineStatus,
    pub readings: Vec<Reading>,
    pub timestamp: TimestampMs,
}

impl RawEvent {
    pub fn from_new(id: EventId, event: NewRawEvent) -> Self {
        Self {
            id,
            machine_id: event.machine_id,
            status: event.status,
            readings: event.readings,
            timestamp: event.timestamp,
        }
    }
}

/// Written only when a machine's stabilized status changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub id: EventId,
    pub machine_id: MachineId,
    pub status: MachineStatus,
    pub timestamp: TimestampMs,
}
