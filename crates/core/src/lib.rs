//! Core types and traits for Washwatch.

use serde::{Deserialize, Serialize};

pub mod clock;
pub mod device;
pub mod events;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{Channel, Machine, Sensor, SensorLink};
pub use events::{CanonicalEvent, EspEvent, NewRawEvent, RawEvent, Reading, UNREPRESENTABLE_CODE};
pub use status::{translate, MachineStatus, MachineType};

pub type MachineId = u64;
pub type SensorId = u64;
pub type RoomId = u64;
pub type EventId = u64;
pub type LocalId = i32;
pub type StatusCode = i64;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// The `(machine id, machine type)` pair a link resolves to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MachineRef {
    pub machine_id: MachineId,
    pub machine_type: MachineType,
}
