use serde::{Deserialize, Serialize};
use ww_core::{MachineType, Reading};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("debounce window must be at least 1")]
    ZeroWindow,
    #[error("{machine_type} profile: {field} must be at least 1")]
    ZeroStreak {
        machine_type: MachineType,
        field: &'static str,
    },
    #[error("{machine_type} profile: available_after ({available_after}) must exceed finish_after ({finish_after})")]
    AvailableBeforeFinish {
        machine_type: MachineType,
        finish_after: u32,
        available_after: u32,
    },
    #[error("{machine_type} profile: max_steady_active ({max_steady_active}) must exceed start_after ({start_after})")]
    SteadyLimitBeforeStart {
        machine_type: MachineType,
        start_after: u32,
        max_steady_active: u32,
    },
}

/// Which classifier the registry builds for new machines.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Debounce the raw status code, regardless of machine type.
    Debounce,
    /// Run the washer/dryer state machine over raw readings.
    #[default]
    ReadingModel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebounceConfig {
    /// Consistent observations required before a new status is accepted.
    pub window: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { window: 3 }
    }
}

/// How the readings of one observation combine into "active" or "idle".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    AnyAbove,
    MajorityAbove,
}

impl ThresholdRule {
    /// `None` when no reading carries a usable value.
    pub fn activity(self, readings: &[Reading]) -> Option<bool> {
        let mut valid = 0usize;
        let mut above = 0usize;
        for flag in readings.iter().filter_map(Reading::is_above) {
            valid += 1;
            if flag {
                above += 1;
            }
        }
        if valid == 0 {
            return None;
        }
        Some(match self {
            ThresholdRule::AnyAbove => above > 0,
            ThresholdRule::MajorityAbove => above * 2 > valid,
        })
    }
}

/// Streak lengths (in observations) for the reading-based state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineProfile {
    /// Active streak that moves an idle machine to `IN_USE`.
    pub start_after: u32,
    /// Idle streak that moves `IN_USE` to `FINISHING`.
    pub finish_after: u32,
    /// Idle streak that moves `FINISHING` (or `HAS_ISSUES`) to `AVAILABLE`.
    pub available_after: u32,
    /// Active streak without a single idle sample that is flagged as `HAS_ISSUES`.
    pub max_steady_active: Option<u32>,
    pub rule: ThresholdRule,
}

impl MachineProfile {
    /// Washers agitate in bursts and soak between them, so pauses are long
    /// and an uninterrupted active signal is suspicious.
    pub fn washer() -> Self {
        Self {
            start_after: 3,
            finish_after: 6,
            available_after: 12,
            max_steady_active: Some(90),
            rule: ThresholdRule::AnyAbove,
        }
    }

    pub fn dryer() -> Self {
        Self {
            start_after: 2,
            finish_after: 3,
            available_after: 8,
            max_steady_active: Some(360),
            rule: ThresholdRule::MajorityAbove,
        }
    }

    fn validate(&self, machine_type: MachineType) -> Result<(), ConfigError> {
        for (field, value) in [
            ("start_after", self.start_after),
            ("finish_after", self.finish_after),
            ("available_after", self.available_after),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroStreak { machine_type, field });
            }
        }
        if self.max_steady_active == Some(0) {
            return Err(ConfigError::ZeroStreak {
                machine_type,
                field: "max_steady_active",
            });
        }
        if let Some(max_steady_active) = self.max_steady_active {
            if max_steady_active <= self.start_after {
                return Err(ConfigError::SteadyLimitBeforeStart {
                    machine_type,
                    start_after: self.start_after,
                    max_steady_active,
                });
            }
        }
        if self.available_after <= self.finish_after {
            return Err(ConfigError::AvailableBeforeFinish {
                machine_type,
                finish_after: self.finish_after,
                available_after: self.available_after,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    pub debounce: DebounceConfig,
    pub washer: MachineProfile,
    pub dryer: MachineProfile,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::default(),
            debounce: DebounceConfig::default(),
            washer: MachineProfile::washer(),
            dryer: MachineProfile::dryer(),
        }
    }
}

impl ClassifierConfig {
    pub fn debounce(window: u32) -> Self {
        Self {
            strategy: ClassifierStrategy::Debounce,
            debounce: DebounceConfig { window },
            ..Self::default()
        }
    }

    pub fn profile(&self, machine_type: MachineType) -> &MachineProfile {
        match machine_type {
            MachineType::Washer => &self.washer,
            MachineType::Dryer => &self.dryer,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce.window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        self.washer.validate(MachineType::Washer)?;
        self.dryer.validate(MachineType::Dryer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ClassifierConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_available_not_after_finish() {
        let mut cfg = ClassifierConfig::default();
        cfg.dryer.available_after = cfg.dryer.finish_after;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::AvailableBeforeFinish { machine_type: MachineType::Dryer, .. })
        ));
    }

    #[test]
    fn rejects_steady_limit_not_after_start() {
        let mut cfg = ClassifierConfig::default();
        cfg.washer.max_steady_active = Some(cfg.washer.start_after);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SteadyLimitBeforeStart {
                machine_type: MachineType::Washer,
                start_after: 3,
                max_steady_active: 3,
            })
        );
        cfg.washer.max_steady_active = None;
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_window() {
        assert_eq!(ClassifierConfig::debounce(0).validate(), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ClassifierConfig =
            serde_json::from_str(r#"{"strategy":"debounce","debounce":{"window":5}}"#).unwrap();
        assert_eq!(cfg.strategy, ClassifierStrategy::Debounce);
        assert_eq!(cfg.debounce.window, 5);
        assert_eq!(cfg.washer, MachineProfile::washer());
    }

    #[test]
    fn threshold_rules_disagree_on_split_readings() {
        let readings = [Reading::new(5.0, 1.0), Reading::new(0.5, 1.0), Reading::new(0.2, 1.0)];
        assert_eq!(ThresholdRule::AnyAbove.activity(&readings), Some(true));
        assert_eq!(ThresholdRule::MajorityAbove.activity(&readings), Some(false));
        assert_eq!(ThresholdRule::AnyAbove.activity(&[]), None);
    }
}
