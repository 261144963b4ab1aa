//! Reading-based washer/dryer state machine.
//!
//! `UNKNOWN -> AVAILABLE -> IN_USE -> FINISHING -> AVAILABLE`, with
//! `HAS_ISSUES` entered from any phase when the active signal never breaks
//! for longer than the profile allows.

use tracing::debug;
use ww_core::{MachineStatus, MachineType, TimestampMs};

use crate::{Classifier, MachineProfile, Observation};

#[derive(Debug, Clone)]
pub struct MachineModel {
    machine_type: MachineType,
    profile: MachineProfile,
    phase: MachineStatus,
    last_reading_time: Option<TimestampMs>,
    active_streak: u32,
    inactive_streak: u32,
}

impl MachineModel {
    pub fn new(machine_type: MachineType, profile: MachineProfile, seed: Option<MachineStatus>) -> Self {
        Self {
            machine_type,
            profile,
            phase: seed.unwrap_or_default(),
            last_reading_time: None,
            active_streak: 0,
            inactive_streak: 0,
        }
    }

    pub fn phase(&self) -> MachineStatus {
        self.phase
    }

    pub fn last_reading_time(&self) -> Option<TimestampMs> {
        self.last_reading_time
    }

    fn next_phase(&self, active: bool) -> MachineStatus {
        let p = &self.profile;
        if active
            && self.phase != MachineStatus::HasIssues
            && p.max_steady_active.is_some_and(|max| self.active_streak >= max)
        {
            return MachineStatus::HasIssues;
        }

        match self.phase {
            MachineStatus::Unknown | MachineStatus::Available | MachineStatus::Finishing
                if self.active_streak >= p.start_after =>
            {
                MachineStatus::InUse
            }
            MachineStatus::Unknown | MachineStatus::Finishing | MachineStatus::HasIssues
                if self.inactive_streak >= p.available_after =>
            {
                MachineStatus::Available
            }
            MachineStatus::InUse if self.inactive_streak >= p.finish_after => {
                MachineStatus::Finishing
            }
            phase => phase,
        }
    }
}

impl Classifier for MachineModel {
    fn update(&mut self, observation: &Observation<'_>) -> MachineStatus {
        self.last_reading_time = Some(observation.at);
        let Some(active) = self.profile.rule.activity(observation.readings) else {
            return self.phase;
        };

        if active {
            self.active_streak = self.active_streak.saturating_add(1);
            self.inactive_streak = 0;
        } else {
            self.inactive_streak = self.inactive_streak.saturating_add(1);
            self.active_streak = 0;
        }

        let next = self.next_phase(active);
        if next != self.phase {
            debug!(
                machine_type = %self.machine_type,
                from = %self.phase,
                to = %next,
                active_streak = self.active_streak,
                inactive_streak = self.inactive_streak,
                "phase change"
            );
            self.phase = next;
        }
        self.phase
    }

    fn current(&self) -> MachineStatus {
        self.phase
    }

    fn name(&self) -> &'static str {
        match self.machine_type {
            MachineType::Washer => "washer",
            MachineType::Dryer => "dryer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThresholdRule;
    use ww_core::Reading;

    fn profile() -> MachineProfile {
        MachineProfile {
            start_after: 2,
            finish_after: 2,
            available_after: 4,
            max_steady_active: Some(5),
            rule: ThresholdRule::AnyAbove,
        }
    }

    fn step(model: &mut MachineModel, active: bool, at: TimestampMs) -> MachineStatus {
        let value = if active { 10.0 } else { 0.0 };
        let readings = [Reading::new(value, 5.0)];
        model.update(&Observation {
            raw_status: MachineStatus::Unknown,
            readings: &readings,
            at,
        })
    }

    fn run(model: &mut MachineModel, pattern: &[bool]) -> Vec<MachineStatus> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, active)| step(model, *active, i as TimestampMs))
            .collect()
    }

    #[test]
    fn full_cycle() {
        use ww_core::MachineStatus::*;
        let mut m = MachineModel::new(MachineType::Washer, profile(), Some(Available));
        let out = run(&mut m, &[true, true, true, false, false, false, false]);
        assert_eq!(out, vec![Available, InUse, InUse, InUse, Finishing, Finishing, Available]);
    }

    #[test]
    fn brief_pause_does_not_finish() {
        use ww_core::MachineStatus::*;
        let mut m = MachineModel::new(MachineType::Washer, profile(), Some(InUse));
        let out = run(&mut m, &[false, true, false, true]);
        assert!(out.iter().all(|s| *s == InUse));
    }

    #[test]
    fn activity_during_finishing_resumes_use() {
        use ww_core::MachineStatus::*;
        let mut m = MachineModel::new(MachineType::Dryer, profile(), Some(InUse));
        let out = run(&mut m, &[false, false, true, true]);
        assert_eq!(out, vec![InUse, Finishing, Finishing, InUse]);
    }

    #[test]
    fn unbroken_activity_is_flagged_and_recovers() {
        use ww_core::MachineStatus::*;
        let mut m = MachineModel::new(MachineType::Washer, profile(), Some(InUse));
        let out = run(&mut m, &[true; 6]);
        assert_eq!(out[3], InUse);
        assert_eq!(&out[4..], &[HasIssues, HasIssues]);

        let out = run(&mut m, &[false, false, false, false]);
        assert_eq!(out, vec![HasIssues, HasIssues, HasIssues, Available]);
    }

    #[test]
    fn unknown_settles_from_idle_signal() {
        use ww_core::MachineStatus::*;
        let mut m = MachineModel::new(MachineType::Dryer, profile(), None);
        let out = run(&mut m, &[false, false, false, false]);
        assert_eq!(out, vec![Unknown, Unknown, Unknown, Available]);
    }

    #[test]
    fn missing_readings_only_touch_timestamp() {
        let mut m = MachineModel::new(MachineType::Washer, profile(), Some(MachineStatus::InUse));
        let status = m.update(&Observation {
            raw_status: MachineStatus::Available,
            readings: &[],
            at: 42,
        });
        assert_eq!(status, MachineStatus::InUse);
        assert_eq!(m.last_reading_time(), Some(42));
        assert_eq!(step(&mut m, false, 43), MachineStatus::InUse);
    }
}
