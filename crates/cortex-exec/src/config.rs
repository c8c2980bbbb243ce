//! Processor, pool and engine configuration.
//!
//! [`EngineConfig`] aggregates every tunable of a running engine and is read
//! from a JSON file. Every field has a default, so `{}` is a valid config.

use std::path::Path;

use cortex_core::BrainConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits and switches for a single processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum call-frame depth (and nested evaluation depth). Default: 256.
    pub max_frames: usize,
    /// Maximum steps per top-level run. Default: 1,000,000.
    pub max_steps: u64,
    /// Whether to record a [`TraceEntry`](crate::TraceEntry) per instruction.
    pub trace_enabled: bool,
    /// Seed for the `Random` instruction; `None` seeds from the OS.
    pub random_seed: Option<u64>,
    /// Turn instruction failures into fatal [`ExecError`](crate::ExecError)s
    /// instead of logging them.
    pub escalate_errors: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            max_frames: 256,
            max_steps: 1_000_000,
            trace_enabled: false,
            random_seed: None,
            escalate_errors: false,
        }
    }
}

/// Bounds of a [`ProcessorPool`](crate::ProcessorPool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Processors created up front and always kept.
    pub min_size: usize,
    /// Upper bound on processors alive at once.
    pub max_size: usize,
    /// How long `acquire` waits for a processor when all are busy.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            min_size: 1,
            max_size: 8,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// Everything an engine needs to start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub brain: BrainConfig,
    pub processor: ProcessorConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.pool.max_size == 0 {
            return Err(ConfigError::Invalid("pool.max_size must be at least 1".into()));
        }
        if self.pool.min_size > self.pool.max_size {
            return Err(ConfigError::Invalid(format!(
                "pool.min_size ({}) exceeds pool.max_size ({})",
                self.pool.min_size, self.pool.max_size
            )));
        }
        if self.processor.max_frames == 0 {
            return Err(ConfigError::Invalid("processor.max_frames must be at least 1".into()));
        }
        Ok(())
    }
}
