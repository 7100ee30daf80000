//! Runtime configuration: sampling frequencies and default input paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AccessError, Result};

// ---------------------------------------------------------------------------
// FrequencyTable
// ---------------------------------------------------------------------------

/// Sampling frequency (Hz) of each feature column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable(BTreeMap<String, u32>);

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: impl Into<String>, hz: u32) -> Option<u32> {
        self.0.insert(feature.into(), hz)
    }

    /// Frequency of `feature`, failing if it is not registered or is zero.
    pub fn frequency(&self, feature: &str) -> Result<u32> {
        match self.0.get(feature) {
            Some(0) => Err(AccessError::InvalidFrequency(0)),
            Some(hz) => Ok(*hz),
            None => Err(AccessError::UnknownFeature(feature.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, hz)| (name.as_str(), *hz))
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        FrequencyTable(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Contents of a JSON configuration file.
///
/// ```json
/// {
///   "frequencies": { "eeg": 50, "pulse": 10 },
///   "store": "train.parquet",
///   "labels": "y_train.csv"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub frequencies: FrequencyTable,

    /// Default store file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    /// Default label file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        log::info!(
            "loaded config from {} ({} feature frequencies)",
            path.display(),
            config.frequencies.0.len()
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> std::result::Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the configured paths with any given overrides.
    pub fn with_overrides(mut self, store: Option<PathBuf>, labels: Option<PathBuf>) -> Self {
        if store.is_some() {
            self.store = store;
        }
        if labels.is_some() {
            self.labels = labels;
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_lookup() {
        let table: FrequencyTable = [("eeg", 50), ("pulse", 10), ("broken", 0)]
            .into_iter()
            .collect();
        assert_eq!(table.frequency("eeg").unwrap(), 50);
        assert!(matches!(
            table.frequency("spo2"),
            Err(AccessError::UnknownFeature(name)) if name == "spo2"
        ));
        assert!(matches!(
            table.frequency("broken"),
            Err(AccessError::InvalidFrequency(0))
        ));
    }

    #[test]
    fn insert_replaces_and_iter_is_sorted() {
        let mut table = FrequencyTable::new();
        assert_eq!(table.insert("pulse", 10), None);
        assert_eq!(table.insert("eeg", 50), None);
        assert_eq!(table.insert("pulse", 25), Some(10));

        let entries: Vec<(&str, u32)> = table.iter().collect();
        assert_eq!(entries, vec![("eeg", 50), ("pulse", 25)]);
    }

    #[test]
    fn parses_minimal_config() {
        let config: Config = serde_json::from_str(r#"{"frequencies": {"eeg": 50}}"#).unwrap();
        assert_eq!(config.frequencies.frequency("eeg").unwrap(), 50);
        assert!(config.store.is_none());
        assert!(config.labels.is_none());
    }

    #[test]
    fn overrides_only_replace_given_paths() {
        let config = Config {
            store: Some("a.parquet".into()),
            labels: Some("a.csv".into()),
            ..Config::default()
        }
        .with_overrides(Some("b.parquet".into()), None);
        assert_eq!(config.store, Some(PathBuf::from("b.parquet")));
        assert_eq!(config.labels, Some(PathBuf::from("a.csv")));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            frequencies: [("x", 10)].into_iter().collect(),
            store: Some("store.parquet".into()),
            labels: None,
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.frequencies, config.frequencies);
        assert_eq!(loaded.store, config.store);
    }
}
