use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::coordinator::CoordinatorPolicy;
use crate::executor::ExecutorPolicy;
use crate::generate::CommandGenerator;

/// Main configuration structure for Mission Control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissionControlConfig {
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub dispatcher: DispatcherConfig,
    /// Agent executor thresholds
    pub executor: ExecutorPolicy,
    /// Coordinator caps and snapshot windows
    pub coordinator: CoordinatorPolicy,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite URL or file path
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Run embedded migrations on connect
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    pub poll_interval_seconds: u64,
    /// Pending requests fetched per tick
    pub batch_size: usize,
    /// Concurrent invocations
    pub max_workers: usize,
    pub invocation_timeout_seconds: u64,
    /// Queued runs skip the executor's dwell and debounce checks
    pub force_on_request: bool,
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_seconds.max(1))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            batch_size: 50,
            max_workers: 4,
            invocation_timeout_seconds: 600,
            force_on_request: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Program that reads a prompt on stdin and answers on stdout
    pub command: String,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
}

impl GeneratorConfig {
    pub fn build(&self) -> CommandGenerator {
        CommandGenerator::new(
            self.command.clone(),
            self.args.clone(),
            Duration::from_secs(self.timeout_seconds.max(1)),
        )
    }
}

impl Default for MissionControlConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: ".mission-control/mission-control.db".to_string(),
                max_connections: 10,
                auto_migrate: true,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            dispatcher: DispatcherConfig::default(),
            executor: ExecutorPolicy::default(),
            coordinator: CoordinatorPolicy::default(),
            generator: GeneratorConfig {
                command: "claude".to_string(),
                args: vec!["--print".to_string()],
                timeout_seconds: 300,
            },
        }
    }
}

impl MissionControlConfig {
    /// Load configuration from the current directory
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration files in `dir` (mission-control.toml, .mission-control-rc)
    /// 3. Environment variables (prefixed with MISSION_CONTROL_, nested with `__`)
    pub fn load_from(dir: &Path) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("Failed to encode default configuration")?;
        let mut builder = Config::builder().add_source(defaults);

        let toml_path = dir.join("mission-control.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".mission-control-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("MISSION_CONTROL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to read configuration sources")?;
        let config: MissionControlConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = MissionControlConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.dispatcher.poll_interval_seconds, 30);
        assert_eq!(config.dispatcher.invocation_timeout_seconds, 600);
        assert_eq!(config.coordinator.max_creates, 3);
        assert_eq!(config.executor.debounce_minutes, 3);
        assert!(config.database.auto_migrate);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MissionControlConfig::default();
        config.dispatcher.max_workers = 9;
        config.coordinator.max_actions = 4;
        config.generator.args = vec!["run".into(), "--quiet".into()];
        config
            .save_to_file(dir.path().join("mission-control.toml"))
            .unwrap();

        let loaded = MissionControlConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.dispatcher.max_workers, 9);
        assert_eq!(loaded.coordinator.max_actions, 4);
        assert_eq!(loaded.generator.args, vec!["run", "--quiet"]);
        assert_eq!(loaded.dispatcher.batch_size, 50);
    }

    #[test]
    fn test_durations_never_zero() {
        let config = DispatcherConfig {
            poll_interval_seconds: 0,
            invocation_timeout_seconds: 0,
            ..DispatcherConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.invocation_timeout(), Duration::from_secs(1));
    }
}
