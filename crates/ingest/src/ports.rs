//! Narrow interfaces to the collaborators the pipeline consumes.

use std::collections::HashMap;

use serde::Serialize;
use ww_core::{
    CanonicalEvent, Machine, MachineId, MachineStatus, NewRawEvent, RawEvent, Sensor, SensorId,
    SensorLink, TimestampMs,
};

use crate::StoreError;

pub trait SensorDirectory: Send + Sync {
    fn find_sensor_by_mac(&self, mac: &str) -> Result<Option<Sensor>, StoreError>;

    /// All links of a sensor, each resolved to its machine.
    fn links_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<SensorLink>, StoreError>;
}

/// The summary change for one machine produced by one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineUpdate {
    pub machine_id: MachineId,
    pub touched_at: TimestampMs,
    /// Canonical statuses to append, oldest first. Empty when only
    /// `last_updated` moves.
    pub transitions: Vec<MachineStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineCommit {
    pub machine_id: MachineId,
    pub result: Result<Vec<CanonicalEvent>, StoreError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub machine_id: Option<MachineId>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            machine_id: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl HistoryQuery {
    pub fn for_machine(machine_id: MachineId) -> Self {
        Self {
            machine_id: Some(machine_id),
            ..Self::default()
        }
    }
}

/// A slice of history, newest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

pub trait EventStore: Send + Sync {
    /// Latest canonical status per machine. Machines without canonical
    /// events report their summary `current_status`; unknown ids are absent.
    fn latest_statuses(
        &self,
        machine_ids: &[MachineId],
    ) -> Result<HashMap<MachineId, MachineStatus>, StoreError>;

    /// Append raw events in one bulk write.
    fn insert_raw_events(&self, events: Vec<NewRawEvent>) -> Result<Vec<RawEvent>, StoreError>;

    /// Apply summary updates in one bulk write. For each machine the canonical
    /// events and the summary fields land together or not at all; one
    /// machine failing does not affect the others. A transition equal to the
    /// machine's latest status is not written.
    fn commit_machine_updates(&self, updates: Vec<MachineUpdate>) -> Vec<MachineCommit>;

    fn machine(&self, machine_id: MachineId) -> Result<Option<Machine>, StoreError>;

    fn canonical_history(&self, query: &HistoryQuery) -> Result<Page<CanonicalEvent>, StoreError>;

    fn raw_history(&self, query: &HistoryQuery) -> Result<Page<RawEvent>, StoreError>;
}
