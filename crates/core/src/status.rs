use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StatusCode;

/// Canonical machine status shown to users.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Available,
    InUse,
    Finishing,
    HasIssues,
    #[default]
    Unknown,
}

impl MachineStatus {
    pub const ALL: [MachineStatus; 5] = [
        MachineStatus::Available,
        MachineStatus::InUse,
        MachineStatus::Finishing,
        MachineStatus::HasIssues,
        MachineStatus::Unknown,
    ];

    /// The compact code a sensor node transmits for this status.
    pub fn code(self) -> StatusCode {
        match self {
            MachineStatus::Unknown => -1,
            MachineStatus::Available => 0,
            MachineStatus::InUse => 1,
            MachineStatus::Finishing => 2,
            MachineStatus::HasIssues => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MachineStatus::Available => "AVAILABLE",
            MachineStatus::InUse => "IN_USE",
            MachineStatus::Finishing => "FINISHING",
            MachineStatus::HasIssues => "HAS_ISSUES",
            MachineStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a compact status code into a canonical status.
///
/// Returns `None` for codes outside the table; callers drop that reading.
pub fn translate(code: StatusCode) -> Option<MachineStatus> {
    match code {
        -1 => Some(MachineStatus::Unknown),
        0 => Some(MachineStatus::Available),
        1 => Some(MachineStatus::InUse),
        2 => Some(MachineStatus::Finishing),
        3 => Some(MachineStatus::HasIssues),
        _ => None,
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    Washer,
    Dryer,
}

impl MachineType {
    pub fn as_str(self) -> &'static str {
        match self {
            MachineType::Washer => "washer",
            MachineType::Dryer => "dryer",
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
