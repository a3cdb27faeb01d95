//! Unified configuration for the stateful inference server

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Global server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the REST surface
    pub host: String,
    /// Bind port for the REST surface
    pub port: u16,
    /// Idle sequence reaper period in minutes
    pub sequence_cleaner_interval: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9178,
            sequence_cleaner_interval: 5,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("STATESTREAM_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("STATESTREAM_PORT") {
            match port.parse() {
                Ok(p) => config.port = p,
                Err(_) => warn!("Ignoring unparsable STATESTREAM_PORT: {}", port),
            }
        }
        if let Ok(interval) = std::env::var("STATESTREAM_SEQUENCE_CLEANER_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(minutes) if minutes >= 1 => config.sequence_cleaner_interval = minutes,
                _ => warn!(
                    "Ignoring invalid STATESTREAM_SEQUENCE_CLEANER_INTERVAL: {}",
                    interval
                ),
            }
        }
        if let Ok(level) = std::env::var("STATESTREAM_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }
}

/// Per-model configuration for a stateful model version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatefulModelConfig {
    /// Model name as addressed by clients
    pub name: String,
    /// Model version
    pub version: u64,
    /// Execution slot pool size; 0 selects the runtime's recommended count
    #[serde(default)]
    pub nireq: usize,
    /// Upper bound on concurrently live sequences
    #[serde(default = "default_max_sequence_number")]
    pub max_sequence_number: u32,
    /// Opt into background cleanup of idle sequences
    #[serde(default = "default_idle_sequence_cleanup")]
    pub idle_sequence_cleanup: bool,
    /// Apply the runtime's low-latency transform at load time; state slots
    /// are only exposed on transformed models
    #[serde(default)]
    pub low_latency_transformation: bool,
}

fn default_max_sequence_number() -> u32 {
    500
}

fn default_idle_sequence_cleanup() -> bool {
    true
}

impl Default for StatefulModelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            version: 1,
            nireq: 0,
            max_sequence_number: default_max_sequence_number(),
            idle_sequence_cleanup: default_idle_sequence_cleanup(),
            low_latency_transformation: false,
        }
    }
}
