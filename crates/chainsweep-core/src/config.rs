//! Runtime configuration.
//!
//! Keys use dotted names so existing property files translate one-to-one:
//!
//! ```yaml
//! retry.max.attempts: 5
//! retry.sleep.time: 1000      # ms
//! max.blocks.per.batch: 8
//! fetch.concurrency: 16
//! endpoint.selection: random  # or round-robin
//! endpoints:
//!   - https://eth.llamarpc.com
//!   - https://ethereum.publicnode.com
//! database.path: ./chainsweep.db
//! log:
//!   level: info
//!   json: false
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::pool::SelectionPolicy;
use crate::retry::RetryConfig;

/// Top-level configuration for allocation and scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Attempts per remote call, including the first.
    #[serde(rename = "retry.max.attempts")]
    pub retry_max_attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    #[serde(rename = "retry.sleep.time")]
    pub retry_sleep_time_ms: u64,
    /// Blocks committed together as one checkpoint step.
    #[serde(rename = "max.blocks.per.batch")]
    pub max_blocks_per_batch: u64,
    /// Width of the block-fetch and balance-lookup worker tiers.
    #[serde(rename = "fetch.concurrency")]
    pub fetch_concurrency: usize,
    /// JSON-RPC endpoint URLs.
    pub endpoints: Vec<String>,
    #[serde(rename = "endpoint.selection")]
    pub endpoint_selection: SelectionPolicy,
    /// SQLite database file.
    #[serde(rename = "database.path")]
    pub database_path: String,
    /// Per-request HTTP timeout, in milliseconds.
    #[serde(rename = "request.timeout")]
    pub request_timeout_ms: u64,
    pub log: LogConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_sleep_time_ms: 1_000,
            max_blocks_per_batch: 8,
            fetch_concurrency: default_concurrency(),
            endpoints: vec![],
            endpoint_selection: SelectionPolicy::Random,
            database_path: "chainsweep.db".into(),
            request_timeout_ms: 30_000,
            log: LogConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    (num_cpus::get() * 2).max(1)
}

impl SweepConfig {
    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, SweepError> {
        serde_yaml::from_str(s).map_err(|e| SweepError::Config(e.to_string()))
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SweepError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SweepError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    /// Reject values that would stall or spin the scanner.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.retry_max_attempts == 0 {
            return Err(SweepError::Config("retry.max.attempts must be >= 1".into()));
        }
        if self.max_blocks_per_batch == 0 {
            return Err(SweepError::Config("max.blocks.per.batch must be >= 1".into()));
        }
        if self.fetch_concurrency == 0 {
            return Err(SweepError::Config("fetch.concurrency must be >= 1".into()));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            delay: Duration::from_millis(self.retry_sleep_time_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ─── LogConfig ────────────────────────────────────────────────────────────────

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: component_name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directive string, e.g. `"info,chainsweep_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.retry_max_attempts, 3);
        assert_eq!(cfg.retry_sleep_time_ms, 1000);
        assert_eq!(cfg.max_blocks_per_batch, 8);
        assert!(cfg.fetch_concurrency >= 1);
        assert_eq!(cfg.endpoint_selection, SelectionPolicy::Random);
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_dotted_keys() {
        let cfg = SweepConfig::from_yaml_str(
            "retry.max.attempts: 10\n\
             retry.sleep.time: 250\n\
             max.blocks.per.batch: 16\n\
             endpoint.selection: round-robin\n\
             endpoints: [\"http://a\", \"http://b\"]\n\
             log:\n  level: debug\n  components:\n    chainsweep-core: trace\n",
        )
        .unwrap();
        assert_eq!(cfg.retry_max_attempts, 10);
        assert_eq!(cfg.retry_config().delay, Duration::from_millis(250));
        assert_eq!(cfg.max_blocks_per_batch, 16);
        assert_eq!(cfg.endpoint_selection, SelectionPolicy::RoundRobin);
        assert_eq!(cfg.endpoints.len(), 2);
        assert_eq!(cfg.log.directives(), "debug,chainsweep_core=trace");
        // untouched keys keep defaults
        assert_eq!(cfg.database_path, "chainsweep.db");
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let cfg = SweepConfig {
            max_blocks_per_batch: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SweepError::Config(_))));
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = SweepConfig::from_yaml_str("retry.max.attempts: [").unwrap_err();
        assert!(err.is_precondition());
    }
}
