//! Configuration loading.
//!
//! The configuration file is YAML. Lifecycle-relevant sections are
//! typed; the per-consumer blocks stay opaque `serde_yml::Value`s for
//! the surrounding framework to interpret. Legacy spellings (a
//! `Bindings` section, a `Monitoring` block, nested `consumers`
//! sub-blocks) are still accepted, with a deprecation warning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_yml::Value;
use tracing::warn;

use crate::error::ConfigError;
use crate::logging::LoggingConfig;

/// Top level of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "Logging", default)]
    pub logging: LoggingConfig,
    #[serde(rename = "Consumers", default)]
    consumers: BTreeMap<String, Value>,
    #[serde(rename = "Bindings", default)]
    bindings: BTreeMap<String, Value>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pidfile: Option<PathBuf>,
    #[serde(default)]
    poll_interval: Option<f64>,
    #[serde(default)]
    monitor: Option<bool>,
    #[serde(rename = "Monitoring", default)]
    monitoring: Option<MonitoringSection>,
}

/// Legacy monitoring block, superseded by the top-level `monitor` and
/// `poll_interval` attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoringSection {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    interval: Option<f64>,
}

impl Config {
    /// The consumer blocks, with legacy spellings normalized: a
    /// `Bindings` section stands in for a missing `Consumers` section,
    /// and a nested `consumers` sub-block is flattened into its parent
    /// (nested values win).
    pub fn consumers(&self) -> BTreeMap<String, Value> {
        let source = if !self.consumers.is_empty() {
            &self.consumers
        } else {
            if !self.bindings.is_empty() {
                warn!("The Bindings section is deprecated, rename it to Consumers");
            }
            &self.bindings
        };

        source
            .iter()
            .map(|(name, value)| (name.clone(), flatten_consumer_block(name, value.clone())))
            .collect()
    }

    /// The main-loop poll interval in seconds, falling back to the
    /// legacy `Monitoring.interval` attribute.
    pub fn poll_interval(&self) -> Option<f64> {
        if self.poll_interval.is_some() {
            return self.poll_interval;
        }
        let legacy = self.monitoring.as_ref().and_then(|m| m.interval);
        if legacy.is_some() {
            warn!(
                "Monitoring.interval is deprecated, use the top-level poll_interval attribute"
            );
        }
        legacy
    }

    /// [`poll_interval`] as a `Duration`; negative or non-finite values
    /// are treated as unset.
    ///
    /// [`poll_interval`]: Config::poll_interval
    pub fn poll_duration(&self) -> Option<Duration> {
        self.poll_interval()
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Whether stats monitoring is on. The top-level `monitor` flag
    /// wins; the legacy `Monitoring.enabled` flag is honored with a
    /// deprecation warning; the default is off.
    pub fn monitoring_enabled(&self) -> bool {
        if let Some(flag) = self.monitor {
            return flag;
        }
        match &self.monitoring {
            None => false,
            Some(section) => {
                warn!("The Monitoring section is deprecated, use the top-level monitor flag");
                section.enabled.unwrap_or(false)
            }
        }
    }
}

fn flatten_consumer_block(name: &str, mut value: Value) -> Value {
    if let Value::Mapping(ref mut mapping) = value {
        if let Some(Value::Mapping(nested)) = mapping.remove("consumers") {
            warn!(
                "Consumer {} nests its settings under a consumers block, flattening it",
                name
            );
            for (key, nested_value) in nested {
                mapping.insert(key, nested_value);
            }
        }
    }
    value
}

/// Read and parse the configuration file.
///
/// The caller owns the fatal-at-startup policy; this function only
/// reports what went wrong.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }
    serde_yml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
