#![allow(dead_code)]

use std::sync::Arc;

use ww_classifiers::{ClassifierConfig, ClassifierRegistry};
use ww_core::{
    Channel, Clock, EspEvent, Machine, MachineId, MachineStatus, MachineType, ManualClock, Reading,
    Sensor, StatusCode,
};
use ww_ingest::{EventStore, Ingestor, MemoryStore};

pub const MAC: &str = "AA:BB:CC:DD:EE:01";
pub const START_MS: u64 = 1_000;

/// One sensor with two linked channels: `adc/0` drives a washer, `adc/1` a dryer.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub ingestor: Ingestor,
    pub sensor: Sensor,
    pub washer: Machine,
    pub dryer: Machine,
}

impl Fixture {
    pub fn new(cfg: ClassifierConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let washer = store.add_machine("W01", MachineType::Washer, Some(1));
        let dryer = store.add_machine("D01", MachineType::Dryer, Some(1));
        let sensor = store.register_sensor(MAC).unwrap();
        store
            .link_sensor(sensor.sensor_id, Channel::new("adc", 0), washer.machine_id)
            .unwrap();
        store
            .link_sensor(sensor.sensor_id, Channel::new("adc", 1), dryer.machine_id)
            .unwrap();

        let clock = Arc::new(ManualClock::new(START_MS));
        let ingestor = Self::ingestor_for(&store, &clock, cfg);
        Self {
            store,
            clock,
            ingestor,
            sensor,
            washer,
            dryer,
        }
    }

    /// A second ingestor over the same store with empty classifier state, as
    /// after a process restart.
    pub fn restarted(&self, cfg: ClassifierConfig) -> Ingestor {
        Self::ingestor_for(&self.store, &self.clock, cfg)
    }

    fn ingestor_for(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>, cfg: ClassifierConfig) -> Ingestor {
        let registry = Arc::new(ClassifierRegistry::new(cfg));
        Ingestor::new(store.clone(), store.clone(), registry, clock.clone())
    }

    pub fn machine(&self, machine_id: MachineId) -> Machine {
        self.store.machine(machine_id).unwrap().unwrap()
    }

    /// Record `status` as an operator would; it becomes the first entry of
    /// the machine's canonical history.
    pub fn set_status(&self, machine_id: MachineId, status: MachineStatus) {
        self.store
            .set_machine_status(machine_id, status, self.clock.now())
            .unwrap();
    }

    pub fn statuses(&self, machine_id: MachineId) -> Vec<MachineStatus> {
        self.store
            .canonical_events_for(machine_id)
            .into_iter()
            .map(|e| e.status)
            .collect()
    }
}

pub fn element(source: &str, local_id: i32, status: MachineStatus) -> EspEvent {
    coded(source, local_id, status.code())
}

pub fn coded(source: &str, local_id: i32, status_code: StatusCode) -> EspEvent {
    EspEvent {
        local_id,
        source: source.to_string(),
        status_code,
        readings: Vec::new(),
        strategy: None,
    }
}

pub fn reading(source: &str, local_id: i32, active: bool) -> EspEvent {
    let value = if active { 8.0 } else { 0.5 };
    EspEvent {
        readings: vec![Reading::new(value, 2.0)],
        ..coded(source, local_id, MachineStatus::Unknown.code())
    }
}

pub fn no_adjacent_repeats(statuses: &[MachineStatus]) -> bool {
    statuses.windows(2).all(|w| w[0] != w[1])
}
