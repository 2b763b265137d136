use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Controller tunables, loaded from TOML. A missing file or missing fields
/// fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub signal: SignalConfig,
}

/// Operation queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Buffered operation events before `submit` reports backpressure
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Worker routines draining the queue
    #[serde(default = "default_queue_workers")]
    pub workers: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_queue_workers() -> usize {
    4
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            workers: default_queue_workers(),
        }
    }
}

/// Signal dispatcher sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Pending signal requests before further ones are dropped (the
    /// annotation stays authoritative, so dropping is safe)
    #[serde(default = "default_signal_capacity")]
    pub capacity: usize,

    #[serde(default = "default_signal_workers")]
    pub workers: usize,
}

fn default_signal_capacity() -> usize {
    256
}

fn default_signal_workers() -> usize {
    2
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            capacity: default_signal_capacity(),
            workers: default_signal_workers(),
        }
    }
}

impl ControllerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!("Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context("Failed to read configuration file")?;
        toml::from_str(&content).context("Failed to parse configuration file")
    }
}
