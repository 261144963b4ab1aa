use ww_core::MachineStatus;

use crate::{Classifier, Observation};

/// Accepts a new raw status only after `window` consecutive observations of it.
#[derive(Debug, Clone)]
pub struct DebounceClassifier {
    window: u32,
    last_accepted: Option<MachineStatus>,
    pending: Option<Candidate>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    status: MachineStatus,
    count: u32,
}

impl DebounceClassifier {
    /// `seed` is the last canonical status known for the machine. Without one
    /// (or with `UNKNOWN`) the first observation is accepted as-is.
    pub fn new(window: u32, seed: Option<MachineStatus>) -> Self {
        Self {
            window: window.max(1),
            last_accepted: seed.filter(|s| *s != MachineStatus::Unknown),
            pending: None,
        }
    }

    pub fn observe(&mut self, raw: MachineStatus) -> MachineStatus {
        let Some(accepted) = self.last_accepted else {
            self.last_accepted = Some(raw);
            return raw;
        };
        if raw == accepted {
            self.pending = None;
            return accepted;
        }

        let count = match self.pending {
            Some(candidate) if candidate.status == raw => candidate.count + 1,
            _ => 1,
        };
        if count >= self.window {
            self.last_accepted = Some(raw);
            self.pending = None;
            return raw;
        }
        self.pending = Some(Candidate { status: raw, count });
        accepted
    }
}

impl Classifier for DebounceClassifier {
    fn update(&mut self, observation: &Observation<'_>) -> MachineStatus {
        self.observe(observation.raw_status)
    }

    fn current(&self) -> MachineStatus {
        self.last_accepted.unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "debounce"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_core::MachineStatus::{Available as A, Finishing as F, InUse as B};

    fn feed(classifier: &mut DebounceClassifier, inputs: &[MachineStatus]) -> Vec<MachineStatus> {
        inputs.iter().map(|s| classifier.observe(*s)).collect()
    }

    #[test]
    fn third_consistent_observation_flips() {
        let mut c = DebounceClassifier::new(3, None);
        assert_eq!(feed(&mut c, &[A, B, B, B]), vec![A, A, A, B]);
    }

    #[test]
    fn flicker_is_absorbed() {
        let mut c = DebounceClassifier::new(3, Some(A));
        assert_eq!(feed(&mut c, &[B, A, B, B, A, F, B]), vec![A; 7]);
    }

    #[test]
    fn new_candidate_restarts_count() {
        let mut c = DebounceClassifier::new(3, Some(A));
        assert_eq!(feed(&mut c, &[B, B, F, F, F]), vec![A, A, A, A, F]);
    }

    #[test]
    fn stable_status_is_idempotent() {
        let mut c = DebounceClassifier::new(3, Some(B));
        assert!(feed(&mut c, &[B; 20]).iter().all(|s| *s == B));
        assert_eq!(c.current(), B);
    }

    #[test]
    fn window_of_one_follows_input() {
        let mut c = DebounceClassifier::new(1, Some(A));
        assert_eq!(feed(&mut c, &[B, A, F]), vec![B, A, F]);
    }

    #[test]
    fn unknown_seed_accepts_first_observation() {
        let mut c = DebounceClassifier::new(3, Some(MachineStatus::Unknown));
        assert_eq!(c.observe(B), B);
    }
}
