//! In-process reference implementation of the sensor directory and event store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ww_core::{
    CanonicalEvent, Channel, Machine, MachineId, MachineStatus, MachineType, NewRawEvent, RawEvent,
    RoomId, Sensor, SensorId, SensorLink, TimestampMs,
};

use crate::{EventStore, HistoryQuery, MachineCommit, MachineUpdate, Page, SensorDirectory, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    sensors: BTreeMap<SensorId, Sensor>,
    links: Vec<SensorLink>,
    machines: BTreeMap<MachineId, Machine>,
    raw_events: Vec<RawEvent>,
    canonical_events: Vec<CanonicalEvent>,
    next_id: u64,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    raw_inserts: bool,
    machines: HashSet<MachineId>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Newest canonical status, or the summary status for a machine without
    /// history. `None` for unknown machines.
    fn latest_status(&self, machine_id: MachineId) -> Option<MachineStatus> {
        let machine = self.machines.get(&machine_id)?;
        let canonical = self
            .canonical_events
            .iter()
            .rev()
            .find(|e| e.machine_id == machine_id)
            .map(|e| e.status);
        Some(canonical.unwrap_or(machine.current_status))
    }

    /// Append canonical events and move the summary in one step. Transitions
    /// that repeat the latest status are dropped.
    fn apply(&mut self, update: &MachineUpdate) -> Result<Vec<CanonicalEvent>, StoreError> {
        let machine_id = update.machine_id;
        if self.faults.machines.contains(&machine_id) {
            return Err(StoreError::Unavailable(format!("machine {machine_id} is locked")));
        }
        let mut latest = self
            .latest_status(machine_id)
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))?;

        let mut statuses = Vec::with_capacity(update.transitions.len());
        for status in &update.transitions {
            if *status != latest {
                statuses.push(*status);
                latest = *status;
            }
        }
        let events: Vec<CanonicalEvent> = statuses
            .iter()
            .map(|status| CanonicalEvent {
                id: self.next_id(),
                machine_id,
                status: *status,
                timestamp: update.touched_at,
            })
            .collect();
        self.canonical_events.extend(events.iter().cloned());
        if let Some(machine) = self.machines.get_mut(&machine_id) {
            machine.record(update.touched_at, &statuses);
        }
        Ok(events)
    }
}

/// Newest first, ties broken by id.
fn page<T: Clone>(
    rows: &[T],
    query: &HistoryQuery,
    machine_of: impl Fn(&T) -> MachineId,
    order_key: impl Fn(&T) -> (TimestampMs, u64),
) -> Page<T> {
    let mut matching: Vec<&T> = rows
        .iter()
        .filter(|row| query.machine_id.map_or(true, |id| machine_of(row) == id))
        .collect();
    matching.sort_by_key(|row| std::cmp::Reverse(order_key(row)));
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .cloned()
        .collect();
    Page {
        items,
        total,
        offset: query.offset,
        limit: query.limit,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_machine(
        &self,
        label: impl Into<String>,
        machine_type: MachineType,
        room_id: Option<RoomId>,
    ) -> Machine {
        let mut tables = self.tables();
        let mut machine = Machine::new(tables.next_id(), label, machine_type);
        machine.room_id = room_id;
        tables.machines.insert(machine.machine_id, machine.clone());
        machine
    }

    /// Operator correction of a machine's status. Recorded like any other
    /// change: a canonical event plus the summary update, or nothing at all
    /// when `status` is already the latest.
    pub fn set_machine_status(
        &self,
        machine_id: MachineId,
        status: MachineStatus,
        at: TimestampMs,
    ) -> Result<Machine, StoreError> {
        let mut tables = self.tables();
        let latest = tables
            .latest_status(machine_id)
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))?;
        if latest != status {
            tables.apply(&MachineUpdate {
                machine_id,
                touched_at: at,
                transitions: vec![status],
            })?;
        }
        tables
            .machines
            .get(&machine_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))
    }

    pub fn register_sensor(&self, mac_address: &str) -> Result<Sensor, StoreError> {
        let mac_address = mac_address.trim();
        if mac_address.is_empty() {
            return Err(StoreError::Invalid("macAddress is required".into()));
        }
        let mut tables = self.tables();
        if tables.sensors.values().any(|s| s.mac_address == mac_address) {
            return Err(StoreError::Conflict(format!(
                "sensor with macAddress {mac_address} already exists"
            )));
        }
        let sensor = Sensor {
            sensor_id: tables.next_id(),
            mac_address: mac_address.to_string(),
            room_id: None,
            api_key: None,
        };
        tables.sensors.insert(sensor.sensor_id, sensor.clone());
        Ok(sensor)
    }

    /// Update a sensor's room and access key; `None` leaves a field as it is.
    pub fn assign_sensor(
        &self,
        sensor_id: SensorId,
        room_id: Option<RoomId>,
        api_key: Option<String>,
    ) -> Result<Sensor, StoreError> {
        if room_id.is_none() && api_key.is_none() {
            return Err(StoreError::Invalid("apiKey or roomId is required".into()));
        }
        let mut tables = self.tables();
        let sensor = tables
            .sensors
            .get_mut(&sensor_id)
            .ok_or_else(|| StoreError::NotFound(format!("sensor {sensor_id}")))?;
        if room_id.is_some() {
            sensor.room_id = room_id;
        }
        if api_key.is_some() {
            sensor.api_key = api_key;
        }
        Ok(sensor.clone())
    }

    /// Bind a channel of a sensor to a machine. Re-linking an existing channel
    /// moves it to the new machine, so `(source, local_id)` stays unique per sensor.
    pub fn link_sensor(
        &self,
        sensor_id: SensorId,
        channel: Channel,
        machine_id: MachineId,
    ) -> Result<SensorLink, StoreError> {
        let mut tables = self.tables();
        if !tables.sensors.contains_key(&sensor_id) {
            return Err(StoreError::NotFound(format!("sensor {sensor_id}")));
        }
        let machine = tables
            .machines
            .get(&machine_id)
            .map(Machine::machine_ref)
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))?;
        let link = SensorLink {
            sensor_id,
            channel,
            machine,
        };
        let existing = tables
            .links
            .iter()
            .position(|l| l.sensor_id == sensor_id && l.channel == link.channel);
        match existing {
            Some(pos) => tables.links[pos] = link.clone(),
            None => tables.links.push(link.clone()),
        }
        Ok(link)
    }

    pub fn unlink_sensor(&self, sensor_id: SensorId, channel: &Channel) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let before = tables.links.len();
        tables
            .links
            .retain(|l| !(l.sensor_id == sensor_id && &l.channel == channel));
        if tables.links.len() == before {
            return Err(StoreError::NotFound(format!(
                "link {}:{} on sensor {sensor_id}",
                channel.source, channel.local_id
            )));
        }
        Ok(())
    }

    pub fn raw_event_count(&self) -> usize {
        self.tables().raw_events.len()
    }

    pub fn canonical_event_count(&self) -> usize {
        self.tables().canonical_events.len()
    }

    /// Canonical events of one machine, oldest first.
    pub fn canonical_events_for(&self, machine_id: MachineId) -> Vec<CanonicalEvent> {
        self.tables()
            .canonical_events
            .iter()
            .filter(|e| e.machine_id == machine_id)
            .cloned()
            .collect()
    }

    /// Make raw event inserts fail until reset.
    pub fn fail_raw_inserts(&self, fail: bool) {
        self.tables().faults.raw_inserts = fail;
    }

    /// Make summary commits for `machine_id` fail until reset.
    pub fn fail_machine_updates(&self, machine_id: MachineId, fail: bool) {
        let mut tables = self.tables();
        if fail {
            tables.faults.machines.insert(machine_id);
        } else {
            tables.faults.machines.remove(&machine_id);
        }
    }
}

impl SensorDirectory for MemoryStore {
    fn find_sensor_by_mac(&self, mac: &str) -> Result<Option<Sensor>, StoreError> {
        Ok(self
            .tables()
            .sensors
            .values()
            .find(|s| s.mac_address == mac)
            .cloned())
    }

    fn links_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<SensorLink>, StoreError> {
        Ok(self
            .tables()
            .links
            .iter()
            .filter(|l| l.sensor_id == sensor_id)
            .cloned()
            .collect())
    }
}

impl EventStore for MemoryStore {
    fn latest_statuses(
        &self,
        machine_ids: &[MachineId],
    ) -> Result<HashMap<MachineId, MachineStatus>, StoreError> {
        let tables = self.tables();
        Ok(machine_ids
            .iter()
            .filter_map(|id| tables.latest_status(*id).map(|status| (*id, status)))
            .collect())
    }

    fn insert_raw_events(&self, events: Vec<NewRawEvent>) -> Result<Vec<RawEvent>, StoreError> {
        let mut tables = self.tables();
        if tables.faults.raw_inserts {
            return Err(StoreError::Unavailable("raw event table is read-only".into()));
        }
        let saved: Vec<RawEvent> = events
            .into_iter()
            .map(|event| RawEvent::from_new(tables.next_id(), event))
            .collect();
        tables.raw_events.extend(saved.iter().cloned());
        Ok(saved)
    }

    fn commit_machine_updates(&self, updates: Vec<MachineUpdate>) -> Vec<MachineCommit> {
        let mut tables = self.tables();
        updates
            .iter()
            .map(|update| MachineCommit {
                machine_id: update.machine_id,
                result: tables.apply(update),
            })
            .collect()
    }

    fn machine(&self, machine_id: MachineId) -> Result<Option<Machine>, StoreError> {
        Ok(self.tables().machines.get(&machine_id).cloned())
    }

    fn canonical_history(&self, query: &HistoryQuery) -> Result<Page<CanonicalEvent>, StoreError> {
        let tables = self.tables();
        Ok(page(
            &tables.canonical_events,
            query,
            |e| e.machine_id,
            |e| (e.timestamp, e.id),
        ))
    }

    fn raw_history(&self, query: &HistoryQuery) -> Result<Page<RawEvent>, StoreError> {
        let tables = self.tables();
        Ok(page(
            &tables.raw_events,
            query,
            |e| e.machine_id,
            |e| (e.timestamp, e.id),
        ))
    }
}
