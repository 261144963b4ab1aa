//! Status classifiers: turn a noisy stream of sensor observations for one
//! machine into a stabilized canonical status.

use ww_core::{MachineStatus, Reading, TimestampMs};

pub mod config;
pub mod debounce;
pub mod machine_model;
pub mod registry;

pub use config::{
    ClassifierConfig, ClassifierStrategy, ConfigError, DebounceConfig, MachineProfile,
    ThresholdRule,
};
pub use debounce::DebounceClassifier;
pub use machine_model::MachineModel;
pub use registry::{lock_slot, ClassifierRegistry, ClassifierSlot, MachineSlot};

/// Everything a classifier may look at for one batch element.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub raw_status: MachineStatus,
    pub readings: &'a [Reading],
    pub at: TimestampMs,
}

/// A per-machine state machine over observations.
///
/// `update` returns the stabilized status after taking the observation into
/// account, which need not equal the raw status.
pub trait Classifier: Send {
    fn update(&mut self, observation: &Observation<'_>) -> MachineStatus;

    fn current(&self) -> MachineStatus;

    fn name(&self) -> &'static str;
}
