//! Dashboard configuration file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use av_core::InstanceId;
use av_results::{DirectorySource, RunStore};
use serde::{Deserialize, Serialize};

use crate::aggregate::MetricPreset;
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{EngineError, EngineResult};
use crate::session::{Session, SessionOptions};
use crate::view_state::ViewportPolicy;

const DEFAULT_INSTANCES: [&str; 6] = [
    "Call_7_Vehicle_3",
    "Call_18_Vehicle_5",
    "Call_35_Vehicle_7",
    "Call_80_Vehicle_20",
    "Call_130_Vehicle_40",
    "Call_300_Vehicle_90",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// Directory holding the run files.
    pub instrumentation_dir: PathBuf,
    pub prefix: String,
    /// Accepted file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Instances offered for selection.
    pub instances: Vec<InstanceId>,
    pub cache_capacity: usize,
    pub show_bands: bool,
    pub viewport_policy: ViewportPolicy,
    pub metric_set: MetricPreset,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            instrumentation_dir: PathBuf::from("instrumentation"),
            prefix: "annealing".to_string(),
            extensions: vec!["jsonl".to_string(), "ndjson".to_string(), "json".to_string()],
            instances: DEFAULT_INSTANCES.into_iter().map(InstanceId::from).collect(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            show_bands: true,
            viewport_policy: ViewportPolicy::default(),
            metric_set: MetricPreset::default(),
        }
    }
}

impl VizConfig {
    pub fn load_yaml(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        // A relative run directory is taken relative to the config file.
        if config.instrumentation_dir.is_relative()
            && let Some(parent) = path.parent()
        {
            config.instrumentation_dir = parent.join(&config.instrumentation_dir);
        }
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> EngineResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_yaml(&self, path: &Path) -> EngineResult<()> {
        self.validate()?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.prefix.is_empty() {
            return Err(EngineError::Config("prefix must not be empty".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(EngineError::Config(
                "at least one file extension is required".to_string(),
            ));
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(EngineError::Config(format!(
                "extension '{}' must be given without the leading dot",
                ext
            )));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance) {
                return Err(EngineError::Config(format!(
                    "instance {} is listed twice",
                    instance
                )));
            }
        }
        Ok(())
    }

    pub fn store(&self) -> RunStore<DirectorySource> {
        RunStore::open(
            self.instrumentation_dir.clone(),
            self.prefix.clone(),
            self.extensions.clone(),
        )
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            cache_capacity: self.cache_capacity,
            metric_set: self.metric_set.metric_set(),
            show_bands: self.show_bands,
            viewport_policy: self.viewport_policy,
            ..SessionOptions::default()
        }
    }

    pub fn session(&self) -> Session<DirectorySource> {
        Session::new(self.store(), self.session_options())
    }
}
