//! Engine configuration with TOML file support.
//!
//! Device selection and execution tuning are consolidated here. Options
//! serialize to/from TOML so deployments can keep per-machine files (adapter
//! pinning on multi-GPU hosts, queue counts for submission fan-out). All
//! sub-structs use `#[serde(default)]` so a partial file overriding a single
//! section works.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SurgeError;

/// Top-level engine options container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EngineOptions {
    /// Adapter/device selection.
    pub device: DeviceOptions,
    /// Submission and await tuning.
    pub execution: ExecutionOptions,
}

impl EngineOptions {
    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Io`] if the file cannot be read and
    /// [`SurgeError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, SurgeError> {
        let content = std::fs::read_to_string(path).map_err(SurgeError::Io)?;
        toml::from_str(&content)
            .map_err(|e| SurgeError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::OptionsParse`] on serialization failure and
    /// [`SurgeError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SurgeError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SurgeError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SurgeError::Io)?;
        }
        std::fs::write(path, content).map_err(SurgeError::Io)
    }
}

/// Which adapter to run on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceOptions {
    /// Index into the enumerated adapter list. `None` selects by
    /// [`power_preference`](Self::power_preference) instead.
    pub adapter_index: Option<usize>,
    /// Adapter class preferred when no explicit index is pinned.
    pub power_preference: PowerClass,
    /// Accept a software fallback adapter when no hardware one is present.
    pub allow_fallback: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            adapter_index: None,
            power_preference: PowerClass::HighPerformance,
            allow_fallback: false,
        }
    }
}

/// Adapter power class requested from the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PowerClass {
    /// Discrete/high-throughput adapter.
    HighPerformance,
    /// Integrated/low-power adapter.
    LowPower,
    /// No preference; backend picks.
    NoPreference,
}

impl PowerClass {
    /// Matching wgpu power preference.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            Self::HighPerformance => wgpu::PowerPreference::HighPerformance,
            Self::LowPower => wgpu::PowerPreference::LowPower,
            Self::NoPreference => wgpu::PowerPreference::None,
        }
    }
}

/// Submission and await tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Number of logical submission queues sequences can bind to.
    pub queue_count: u32,
    /// Deadline applied by `eval` when the caller passes no timeout, in
    /// milliseconds. `None` waits indefinitely.
    pub default_timeout_ms: Option<u64>,
    /// Sleep between fence polls while awaiting with a deadline, in
    /// microseconds.
    pub poll_interval_us: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            queue_count: 1,
            default_timeout_ms: None,
            poll_interval_us: 100,
        }
    }
}
