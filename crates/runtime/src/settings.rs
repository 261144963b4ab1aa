use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use ww_classifiers::ClassifierConfig;

pub const CONFIG_ENV: &str = "WW_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Timely workers for the status-board dataflow.
    pub workers: usize,
    pub classifiers: ClassifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 1,
            classifiers: ClassifierConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text).context("parsing settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings =
            Self::from_json(&text).with_context(|| format!("loading {}", path.display()))?;
        info!(path = %path.display(), strategy = ?settings.classifiers.strategy, "settings loaded");
        Ok(settings)
    }

    /// Settings from the file named by `WW_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        self.classifiers.validate().context("invalid classifier settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_classifiers::ClassifierStrategy;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn overrides_nested_fields() {
        let settings = Settings::from_json(
            r#"{"workers":2,"classifiers":{"strategy":"debounce","debounce":{"window":4}}}"#,
        )
        .unwrap();
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.classifiers.strategy, ClassifierStrategy::Debounce);
        assert_eq!(settings.classifiers.debounce.window, 4);
    }

    #[test]
    fn rejects_invalid_tuning() {
        let err = Settings::from_json(r#"{"classifiers":{"debounce":{"window":0}}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("debounce window"));
        assert!(Settings::from_json(r#"{"workers":0}"#).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Settings::load("/nonexistent/washwatch.json").unwrap_err();
        assert!(err.to_string().contains("reading settings"));
    }
}
