use serde::Deserialize;
use std::time::Duration;

use crate::domain::orchestrator::{OrchestratorConfig, RetryPacing};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine tuning, all durations in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub attempt_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub stream_buffer: usize,
    pub retrieval_limit: u32,
    pub retrieval_timeout_ms: u64,
    pub pacing_initial_delay_ms: u64,
    pub pacing_max_delay_ms: u64,
    pub pacing_backoff_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 30_000,
            request_timeout_ms: 120_000,
            stream_buffer: 32,
            retrieval_limit: 5,
            retrieval_timeout_ms: 2_000,
            pacing_initial_delay_ms: 100,
            pacing_max_delay_ms: 5_000,
            pacing_backoff_multiplier: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl From<&EngineConfig> for OrchestratorConfig {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_millis(engine.attempt_timeout_ms),
            request_timeout: Duration::from_millis(engine.request_timeout_ms),
            stream_buffer: engine.stream_buffer,
            retrieval_limit: engine.retrieval_limit,
            retrieval_timeout: Duration::from_millis(engine.retrieval_timeout_ms),
            pacing: RetryPacing {
                initial_delay_ms: engine.pacing_initial_delay_ms,
                max_delay_ms: engine.pacing_max_delay_ms,
                backoff_multiplier: engine.pacing_backoff_multiplier,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.attempt_timeout_ms, 30_000);
        assert_eq!(engine.stream_buffer, 32);
    }

    #[test]
    fn test_orchestrator_config_conversion() {
        let engine = EngineConfig {
            attempt_timeout_ms: 5_000,
            ..Default::default()
        };

        let orchestrator = OrchestratorConfig::from(&engine);
        assert_eq!(orchestrator.attempt_timeout, Duration::from_secs(5));
        assert_eq!(orchestrator.pacing.initial_delay_ms, 100);
    }

    #[test]
    fn test_log_format_deserializes_lowercase() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
