//! Configuration Loader
//!
//! Environment-aware configuration loading. A base `scheduler.yaml` is layered with an
//! optional `scheduler.<environment>.yaml` overlay through the `config` crate, then
//! deserialized into [`SchedulerConfig`] and validated.

use super::error::{ConfigResult, ConfigurationError};
use super::SchedulerConfig;
use crate::constants::environment::{DEFAULT_ENVIRONMENT, ENV_VAR};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "scheduler";

/// Loaded, validated scheduler configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: SchedulerConfig,
    environment: String,
    config_directory: Option<PathBuf>,
}

impl ConfigManager {
    /// Load `scheduler.yaml` from `config_dir` for the detected environment
    pub fn load_from_directory(config_dir: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory_with_env(config_dir, &detect_environment())
    }

    /// Load configuration with an explicit environment.
    /// Useful for tests that should not touch process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: impl AsRef<Path>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.as_ref().to_path_buf();
        let base_path = config_directory.join(format!("{BASE_FILE_STEM}.yaml"));
        let overlay_path = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        debug!(
            environment = %environment,
            base = %base_path.display(),
            overlay = %overlay_path.display(),
            "Loading scheduler configuration"
        );

        if !base_path.is_file() {
            return Err(ConfigurationError::FileNotFound { path: base_path });
        }

        let settings = Config::builder()
            .add_source(File::from(base_path.as_path()).format(FileFormat::Yaml))
            .add_source(
                File::from(overlay_path.as_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .build()?;

        let config: SchedulerConfig = settings.try_deserialize()?;
        Self::finish(config, environment, Some(config_directory))
    }

    /// Build configuration from an in-memory YAML document
    pub fn from_yaml_str(yaml: &str, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        let config: SchedulerConfig = settings.try_deserialize()?;
        Self::finish(config, environment, None)
    }

    fn finish(
        config: SchedulerConfig,
        environment: &str,
        config_directory: Option<PathBuf>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = %environment,
            workers = config.worker_pool.workers,
            bulkhead_capacity = config.bulkhead.capacity,
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_attempts = config.retry.max_attempts,
            "🔧 Scheduler configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Directory the configuration was read from, `None` for in-memory documents
    pub fn config_directory(&self) -> Option<&Path> {
        self.config_directory.as_deref()
    }
}

/// Current environment from `TASKER_ENV`, defaulting to "development"
pub fn detect_environment() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}
