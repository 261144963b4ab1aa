use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use differential_dataflow::input::InputSession;
use timely::dataflow::operators::probe::Handle as ProbeHandle;
use tracing::{info, warn};

use ww_classifiers::{ClassifierRegistry, ClassifierStrategy};
use ww_core::{
    Channel, Clock, EspEvent, Machine, MachineRef, MachineStatus, MachineType, ManualClock, Reading,
};
use ww_ingest::{EventStore, Ingestor, MemoryStore, RoundTimer};
use ww_runtime::{init_tracing, start_runtime, Settings};
use ww_views::{status_counts, BoardFeed, StatusRow};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Debounce,
    ReadingModel,
}

impl From<Strategy> for ClassifierStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Debounce => ClassifierStrategy::Debounce,
            Strategy::ReadingModel => ClassifierStrategy::ReadingModel,
        }
    }
}

/// Drive a synthetic laundry room through ingestion and the status board.
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Settings file (JSON). Falls back to $WW_CONFIG, then defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sensor nodes; each watches one washer and one dryer.
    #[arg(long, default_value_t = 4)]
    sensors: u64,
    /// Poll cycles to simulate.
    #[arg(long, default_value_t = 40)]
    rounds: u64,
    /// Override the configured classifier strategy.
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,
}

const POLL_INTERVAL_MS: u64 = 30_000;

struct SimMachine {
    machine: Machine,
    cycle_start: u64,
    cycle_len: u64,
}

impl SimMachine {
    /// Active while inside its cycle, with a short pause every fifth round
    /// for washers (drum reversal / soak).
    fn active(&self, round: u64) -> bool {
        let offset = round.wrapping_sub(self.cycle_start);
        if round < self.cycle_start || offset >= self.cycle_len {
            return false;
        }
        !(self.machine.machine_type == MachineType::Washer && offset % 5 == 4)
    }
}

struct Room {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    ingestor: Ingestor,
    nodes: Vec<(String, SimMachine, SimMachine)>,
}

impl Room {
    fn build(sensors: u64, settings: &Settings) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let mut nodes = Vec::new();
        for n in 0..sensors {
            let mac = format!("24:6F:28:00:00:{n:02X}");
            let sensor = store.register_sensor(&mac)?;
            let washer = store.add_machine(format!("W{:02}", n + 1), MachineType::Washer, Some(1));
            let dryer = store.add_machine(format!("D{:02}", n + 1), MachineType::Dryer, Some(1));
            store.link_sensor(sensor.sensor_id, Channel::new("adc", 0), washer.machine_id)?;
            store.link_sensor(sensor.sensor_id, Channel::new("adc", 1), dryer.machine_id)?;
            nodes.push((
                mac,
                SimMachine {
                    cycle_start: (n * 7) % 11,
                    cycle_len: 14 + (n % 4) * 3,
                    machine: washer,
                },
                SimMachine {
                    cycle_start: 6 + (n * 5) % 9,
                    cycle_len: 10 + (n % 3) * 4,
                    machine: dryer,
                },
            ));
        }
        let registry = Arc::new(ClassifierRegistry::new(settings.classifiers.clone()));
        let ingestor = Ingestor::new(store.clone(), store.clone(), registry, clock.clone());
        Ok(Self {
            store,
            clock,
            ingestor,
            nodes,
        })
    }

    fn element(local_id: i32, sim: &SimMachine, round: u64) -> EspEvent {
        let active = sim.active(round);
        let value = if active { 3.0 + (round % 3) as f64 } else { 0.2 };
        EspEvent {
            local_id,
            source: "adc".to_string(),
            status_code: if active { 1 } else { 0 },
            readings: vec![Reading::new(value, 1.5), Reading::new(value * 0.8, 1.5)],
            strategy: Some(0),
        }
    }

    /// Ingest one poll cycle from every node; returns the machines to re-read.
    fn poll(&self, round: u64) -> Vec<MachineRef> {
        self.clock.advance(POLL_INTERVAL_MS);
        let mut touched = Vec::new();
        for (mac, washer, dryer) in &self.nodes {
            let mut batch = vec![Self::element(0, washer, round), Self::element(1, dryer, round)];
            if round % 9 == 3 {
                // Unwired input and a corrupted code, both dropped by ingestion.
                batch.push(EspEvent {
                    local_id: 7,
                    ..Self::element(0, washer, round)
                });
                batch.push(EspEvent {
                    status_code: 99,
                    ..Self::element(1, dryer, round)
                });
            }
            match self.ingestor.ingest(mac, &batch) {
                Ok(_) => {
                    touched.push(washer.machine.machine_ref());
                    touched.push(dryer.machine.machine_ref());
                }
                Err(err) => warn!(%mac, %err, "poll rejected"),
            }
        }
        touched
    }

    fn status(&self, machine_id: u64) -> MachineStatus {
        self.store
            .machine(machine_id)
            .ok()
            .flatten()
            .map(|m| m.current_status)
            .unwrap_or_default()
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env()?,
    };
    if let Some(strategy) = args.strategy {
        settings.classifiers.strategy = strategy.into();
    }
    info!(?args, strategy = ?settings.classifiers.strategy, "laundry_demo starting");

    let workers = settings.workers;
    start_runtime(workers, move |index, worker| {
        let room = if index == 0 {
            match Room::build(args.sensors, &settings) {
                Ok(room) => Some(room),
                Err(err) => {
                    warn!(%err, "could not build simulated room");
                    None
                }
            }
        } else {
            None
        };

        let mut input: InputSession<_, StatusRow, isize> = InputSession::new();
        let mut probe = ProbeHandle::new();
        worker.dataflow::<u64, _, _>(|scope| {
            status_counts(&input.to_collection(scope))
                .inspect(|((key, machines), time, diff)| {
                    if *diff > 0 {
                        info!(epoch = time, machine_type = %key.0, status = %key.1, machines, "status board");
                    }
                })
                .probe_with(&mut probe);
        });

        let mut feed = BoardFeed::default();
        for round in 0..args.rounds {
            let timer = RoundTimer::start();
            if let Some(room) = &room {
                for machine in room.poll(round) {
                    for (row, diff) in feed.observe(machine, room.status(machine.machine_id)) {
                        input.update(row, diff);
                    }
                }
            }
            input.advance_to(round + 1);
            input.flush();
            while probe.less_than(input.time()) {
                worker.step();
            }
            if let Some(room) = &room {
                let snapshot = room.ingestor.metrics().snapshot();
                info!(
                    round,
                    now = room.clock.now(),
                    duration_ms = timer.elapsed().as_millis() as u64,
                    raw_events = snapshot.raw_events,
                    canonical_events = snapshot.canonical_events,
                    "round complete"
                );
            }
        }

        if let Some(room) = &room {
            let line = room.ingestor.metrics().snapshot().to_json_line("laundry_demo", None);
            println!("{line}");
            info!(machines = feed.len(), "final metrics summary");
        }
    })
    .context("status board runtime failed")
}
