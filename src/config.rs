use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Correction applied to engine-reported breakpoints whose first entry is not at 0.
///
/// Engines drift by a small constant (observed: one or two chars, and not the
/// same for every position API), so the value must come from calibration
/// against the integrated engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum OffsetCorrection {
    /// Shift each axis by the offset of its own first breakpoint.
    #[default]
    Detect,
    /// Subtract a calibrated constant from each axis whose first breakpoint is not 0.
    Fixed(usize),
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct MappingConfig {
    pub offset_correction: OffsetCorrection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the persistent alignment cache; one sub-directory per document.
    pub cache_root: PathBuf,
    pub memory_capacity: usize,
    /// Units scheduled ahead of the playing one.
    pub prefetch_depth: usize,
    pub mapping: MappingConfig,
    /// Tolerance for "word durations sum to the total duration".
    pub duration_epsilon_secs: f64,
}

impl SyncConfig {
    pub const DEFAULT_MEMORY_CAPACITY: usize = 100;
    pub const DEFAULT_PREFETCH_DEPTH: usize = 3;
    pub const DEFAULT_DURATION_EPSILON_SECS: f64 = 1e-3;

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io("read sync config", e))?;
        let config: Self =
            serde_json::from_str(&data).map_err(|e| ConfigError::json("parse sync config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::invalid("memory_capacity must be >= 1"));
        }
        if !self.duration_epsilon_secs.is_finite() || self.duration_epsilon_secs <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "duration_epsilon_secs must be a positive number, got {}",
                self.duration_epsilon_secs
            )));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().join("readalong-cache"),
            memory_capacity: Self::DEFAULT_MEMORY_CAPACITY,
            prefetch_depth: Self::DEFAULT_PREFETCH_DEPTH,
            mapping: MappingConfig::default(),
            duration_epsilon_secs: Self::DEFAULT_DURATION_EPSILON_SECS,
        }
    }
}
