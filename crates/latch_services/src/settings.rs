//! Settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub script: ScriptSettings,
    pub simulation: SimulationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub failure_policy: UpdateFailurePolicy,
    /// Script sources loaded into the domain at startup.
    pub sources: Vec<PathBuf>,
}

/// What happens to a script instance whose OnUpdate keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UpdateFailurePolicy {
    /// Keep ticking the instance regardless of failures.
    #[default]
    Retain,
    /// Stop ticking after `after` consecutive failures.
    Suspend { after: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub delta_seconds: f32,
    pub frames: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            delta_seconds: 0.1,
            frames: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// How many native log records stay inspectable in memory.
    pub retained_records: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            retained_records: 256,
        }
    }
}

impl Settings {
    pub fn from_json(source: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&source)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.script.failure_policy, UpdateFailurePolicy::Retain);
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn test_parses_suspend_policy() {
        let settings = Settings::from_json(
            r#"{
                "script": { "failure_policy": { "mode": "suspend", "after": 3 }, "sources": ["a.js"] },
                "simulation": { "delta_seconds": 0.05, "frames": 20 }
            }"#,
        )
        .unwrap();
        assert_eq!(
            settings.script.failure_policy,
            UpdateFailurePolicy::Suspend { after: 3 }
        );
        assert_eq!(settings.script.sources, vec![PathBuf::from("a.js")]);
        assert_eq!(settings.simulation.frames, 20);
        assert_eq!(settings.logging.retained_records, 256);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Settings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            Settings::from_json("{ nope"),
            Err(SettingsError::Parse(_))
        ));
    }
}
