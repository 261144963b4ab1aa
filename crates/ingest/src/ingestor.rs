use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, MutexGuard};

use tracing::{debug, error, info, warn};
use ww_classifiers::{lock_slot, ClassifierRegistry, ClassifierSlot, MachineSlot, Observation};
use ww_core::{
    translate, Clock, EspEvent, MachineId, MachineRef, MachineStatus, NewRawEvent, RawEvent,
    Reading, SensorLink,
};

use crate::{EventStore, IngestError, IngestMetrics, IngestRequest, MachineUpdate, SensorDirectory};

/// A batch element whose channel resolved to a machine and whose code translated.
struct Resolved<'a> {
    machine: MachineRef,
    status: MachineStatus,
    readings: &'a [Reading],
}

/// Turns sensor batches into raw events, canonical events and summary updates.
///
/// Safe to call concurrently. Every machine touched by a batch is locked
/// (through its classifier slot, in ascending id order) from the moment its
/// latest status is read until its update is persisted.
pub struct Ingestor {
    directory: Arc<dyn SensorDirectory>,
    store: Arc<dyn EventStore>,
    registry: Arc<ClassifierRegistry>,
    clock: Arc<dyn Clock>,
    metrics: IngestMetrics,
}

impl Ingestor {
    pub fn new(
        directory: Arc<dyn SensorDirectory>,
        store: Arc<dyn EventStore>,
        registry: Arc<ClassifierRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            store,
            registry,
            clock,
            metrics: IngestMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: IngestMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &IngestMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    /// Decode a JSON upload and ingest it.
    pub fn ingest_json(&self, body: &[u8]) -> Result<Vec<RawEvent>, IngestError> {
        let request = IngestRequest::from_json(body).inspect_err(|err| {
            self.metrics.inc_batches(1);
            self.metrics.inc_rejected_batches(1);
            warn!(%err, "rejected upload");
        })?;
        self.ingest(&request.mac_address, &request.batch)
    }

    /// Ingest one batch from the sensor with MAC `mac`, returning the raw
    /// events that were persisted.
    pub fn ingest(&self, mac: &str, batch: &[EspEvent]) -> Result<Vec<RawEvent>, IngestError> {
        self.metrics.inc_batches(1);
        let result = self.ingest_batch(mac.trim(), batch);
        if let Err(err) = &result {
            if !matches!(err, IngestError::Persistence(_)) {
                self.metrics.inc_rejected_batches(1);
            }
            warn!(mac, %err, "batch failed");
        }
        result
    }

    fn ingest_batch(&self, mac: &str, batch: &[EspEvent]) -> Result<Vec<RawEvent>, IngestError> {
        if mac.is_empty() {
            return Err(IngestError::InvalidArgument("MAC address is required".into()));
        }
        let sensor = self
            .directory
            .find_sensor_by_mac(mac)?
            .ok_or_else(|| IngestError::NotFound(format!("sensor {mac}")))?;
        let links = self.directory.links_for_sensor(sensor.sensor_id)?;
        if links.is_empty() {
            return Err(IngestError::NotFound(format!(
                "machine links for sensor {}",
                sensor.sensor_id
            )));
        }

        let resolved = self.resolve(&links, batch);
        if resolved.is_empty() {
            debug!(mac, elements = batch.len(), "nothing to ingest");
            return Ok(Vec::new());
        }

        let mut machine_ids: Vec<MachineId> =
            resolved.iter().map(|r| r.machine.machine_id).collect();
        machine_ids.sort_unstable();
        machine_ids.dedup();

        let slots: Vec<ClassifierSlot> =
            machine_ids.iter().map(|id| self.registry.slot(*id)).collect();
        let mut guards: HashMap<MachineId, MutexGuard<'_, MachineSlot>> = machine_ids
            .iter()
            .zip(&slots)
            .map(|(id, slot)| (*id, lock_slot(slot)))
            .collect();

        // Raw events go first: a failed write must leave classifiers untouched.
        let now = self.clock.now();
        let raw_events = resolved
            .iter()
            .map(|item| NewRawEvent {
                machine_id: item.machine.machine_id,
                status: item.status,
                readings: item.readings.to_vec(),
                timestamp: now,
            })
            .collect();
        let saved = self.store.insert_raw_events(raw_events).inspect_err(|err| {
            self.metrics.inc_persistence_failures(1);
            error!(mac, %err, "raw event write failed");
        })?;
        self.metrics.inc_raw_events(saved.len() as u64);

        let mut latest = self.store.latest_statuses(&machine_ids)?;
        let mut transitions: BTreeMap<MachineId, Vec<MachineStatus>> = BTreeMap::new();

        for item in &resolved {
            let machine_id = item.machine.machine_id;
            let Some(guard) = guards.get_mut(&machine_id) else {
                continue;
            };
            let known = latest.get(&machine_id).copied();
            let stabilized = self
                .registry
                .get_or_create_in(guard, item.machine.machine_type, known)
                .update(&Observation {
                    raw_status: item.status,
                    readings: item.readings,
                    at: now,
                });

            if known != Some(stabilized) {
                latest.insert(machine_id, stabilized);
                transitions.entry(machine_id).or_default().push(stabilized);
            }
        }

        let updates = machine_ids
            .iter()
            .map(|id| MachineUpdate {
                machine_id: *id,
                touched_at: now,
                transitions: transitions.remove(id).unwrap_or_default(),
            })
            .collect();

        let mut changed = 0usize;
        for commit in self.store.commit_machine_updates(updates) {
            match commit.result {
                Ok(events) => {
                    if let Some(last) = events.last() {
                        info!(
                            machine_id = commit.machine_id,
                            status = %last.status,
                            changes = events.len(),
                            "status changed"
                        );
                        changed += 1;
                    }
                    self.metrics.inc_canonical_events(events.len() as u64);
                }
                Err(err) => {
                    self.metrics.inc_persistence_failures(1);
                    error!(machine_id = commit.machine_id, %err, "machine update failed");
                }
            }
        }
        drop(guards);

        info!(
            mac,
            elements = batch.len(),
            raw_events = saved.len(),
            machines = machine_ids.len(),
            changed,
            "batch ingested"
        );
        Ok(saved)
    }

    /// Keep the elements that map to a linked channel and a known status code,
    /// in batch order.
    fn resolve<'a>(&self, links: &[SensorLink], batch: &'a [EspEvent]) -> Vec<Resolved<'a>> {
        batch
            .iter()
            .filter_map(|event| {
                let Some(link) = links
                    .iter()
                    .find(|link| link.channel.matches(&event.source, event.local_id))
                else {
                    self.metrics.inc_skipped_unlinked(1);
                    debug!(source = %event.source, local_id = event.local_id, "unlinked channel");
                    return None;
                };
                let Some(status) = translate(event.status_code) else {
                    self.metrics.inc_skipped_untranslatable(1);
                    debug!(
                        machine_id = link.machine.machine_id,
                        code = event.status_code,
                        "untranslatable status code"
                    );
                    return None;
                };
                Some(Resolved {
                    machine: link.machine,
                    status,
                    readings: &event.readings,
                })
            })
            .collect()
    }
}
