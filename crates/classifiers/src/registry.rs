//! Process-wide map of per-machine classifiers.
//!
//! Each machine id owns one slot behind its own mutex. Holding a slot's
//! guard is what serializes classification for that machine; different
//! machines never contend beyond the brief map lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;
use ww_core::{MachineId, MachineStatus, MachineType};

use crate::{
    Classifier, ClassifierConfig, ClassifierStrategy, DebounceClassifier, MachineModel,
};

pub type ClassifierSlot = Arc<Mutex<MachineSlot>>;

/// Holds a machine's classifier once it has been created.
#[derive(Default)]
pub struct MachineSlot {
    classifier: Option<Box<dyn Classifier>>,
}

impl MachineSlot {
    pub fn is_initialized(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn classifier(&self) -> Option<&dyn Classifier> {
        self.classifier.as_deref()
    }

    pub fn get_or_insert_with<F>(&mut self, create: F) -> &mut dyn Classifier
    where
        F: FnOnce() -> Box<dyn Classifier>,
    {
        self.classifier.get_or_insert_with(create).as_mut()
    }
}

/// Lock a slot. A poisoned slot is still handed out: classifier state is
/// best-effort and a panic elsewhere must not wedge the machine forever.
pub fn lock_slot(slot: &ClassifierSlot) -> MutexGuard<'_, MachineSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ClassifierRegistry {
    cfg: ClassifierConfig,
    slots: RwLock<HashMap<MachineId, ClassifierSlot>>,
}

impl ClassifierRegistry {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self {
            cfg,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }

    /// The slot for `machine_id`, created empty on first use. Always the same
    /// `Arc` for a given id.
    pub fn slot(&self, machine_id: MachineId) -> ClassifierSlot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&machine_id)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(machine_id).or_default())
    }

    /// Build a fresh classifier for a machine of `machine_type` according to
    /// the configured strategy. `seed` is the last known canonical status.
    pub fn build(&self, machine_type: MachineType, seed: Option<MachineStatus>) -> Box<dyn Classifier> {
        let classifier: Box<dyn Classifier> = match self.cfg.strategy {
            ClassifierStrategy::Debounce => {
                Box::new(DebounceClassifier::new(self.cfg.debounce.window, seed))
            }
            ClassifierStrategy::ReadingModel => Box::new(MachineModel::new(
                machine_type,
                self.cfg.profile(machine_type).clone(),
                seed,
            )),
        };
        debug!(
            %machine_type,
            classifier = classifier.name(),
            seed = ?seed,
            "created classifier"
        );
        classifier
    }

    /// The slot for `machine_id` with its classifier guaranteed to exist.
    /// `seed` only matters when the classifier is created by this call.
    pub fn get_or_create(
        &self,
        machine_id: MachineId,
        machine_type: MachineType,
        seed: Option<MachineStatus>,
    ) -> ClassifierSlot {
        let slot = self.slot(machine_id);
        self.get_or_create_in(&mut lock_slot(&slot), machine_type, seed);
        slot
    }

    /// Same as [`get_or_create`](Self::get_or_create) for a slot the caller
    /// already holds locked.
    pub fn get_or_create_in<'s>(
        &self,
        slot: &'s mut MachineSlot,
        machine_type: MachineType,
        seed: Option<MachineStatus>,
    ) -> &'s mut dyn Classifier {
        slot.get_or_insert_with(|| self.build(machine_type, seed))
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::Observation;

    fn observe(slot: &ClassifierSlot, status: MachineStatus) -> MachineStatus {
        let mut guard = lock_slot(slot);
        let classifier = guard.get_or_insert_with(|| unreachable!("slot already initialized"));
        classifier.update(&Observation {
            raw_status: status,
            readings: &[],
            at: 0,
        })
    }

    #[test]
    fn same_id_returns_same_instance() {
        let registry = ClassifierRegistry::new(ClassifierConfig::debounce(2));
        let a = registry.get_or_create(7, MachineType::Washer, None);
        let b = registry.get_or_create(7, MachineType::Washer, None);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        observe(&a, MachineStatus::Available);
        observe(&a, MachineStatus::InUse);
        // Second observation lands on the state the first call left behind.
        assert_eq!(observe(&b, MachineStatus::InUse), MachineStatus::InUse);
    }

    #[test]
    fn seed_applies_only_on_creation() {
        let registry = ClassifierRegistry::new(ClassifierConfig::debounce(3));
        let slot = registry.get_or_create(5, MachineType::Washer, Some(MachineStatus::InUse));
        assert_eq!(observe(&slot, MachineStatus::Available), MachineStatus::InUse);

        let again = registry.get_or_create(5, MachineType::Washer, Some(MachineStatus::HasIssues));
        assert_eq!(lock_slot(&again).classifier().map(|c| c.current()), Some(MachineStatus::InUse));
        assert_eq!(observe(&again, MachineStatus::Available), MachineStatus::InUse);
        assert_eq!(observe(&again, MachineStatus::Available), MachineStatus::Available);
    }

    #[test]
    fn strategy_selects_classifier_by_type() {
        let registry = ClassifierRegistry::new(ClassifierConfig::default());
        let washer = registry.get_or_create(1, MachineType::Washer, None);
        let dryer = registry.get_or_create(2, MachineType::Dryer, None);
        assert_eq!(lock_slot(&washer).classifier().map(|c| c.name()), Some("washer"));
        assert_eq!(lock_slot(&dryer).classifier().map(|c| c.name()), Some("dryer"));

        let registry = ClassifierRegistry::new(ClassifierConfig::debounce(3));
        let any = registry.get_or_create(1, MachineType::Dryer, None);
        assert_eq!(lock_slot(&any).classifier().map(|c| c.name()), Some("debounce"));
    }

    #[test]
    fn concurrent_lookups_share_one_slot() {
        let registry = Arc::new(ClassifierRegistry::new(ClassifierConfig::debounce(3)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create(42, MachineType::Washer, None))
            })
            .collect();
        let slots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(slots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_slot_is_not_initialized() {
        let registry = ClassifierRegistry::new(ClassifierConfig::default());
        let slot = registry.slot(3);
        assert!(!lock_slot(&slot).is_initialized());
        assert!(!registry.is_empty());
    }
}
