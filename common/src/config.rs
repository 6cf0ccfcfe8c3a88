// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub nats: NatsConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub invoker: InvokerSettings,
    #[serde(default)]
    pub capabilities: CapabilitySettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    pub subject_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub tick_interval_seconds: u64,
    pub lock_resource: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 2,
            lock_resource: "pipeline_scheduler_execution".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerSettings {
    pub poll_interval_ms: u64,
    pub maintenance_backoff_seconds: u64,
    pub queue_name: String,
    pub maintenance_key: String,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            maintenance_backoff_seconds: 30,
            queue_name: "pipeline_invoke_events".to_string(),
            maintenance_key: "maintenance".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySettings {
    pub refresh_interval_seconds: u64,
    pub guard_ttl_seconds: u64,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 10,
            guard_ttl_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if self.nats.url.is_empty() {
            return Err("NATS URL cannot be empty".to_string());
        }
        if self.nats.stream_name.is_empty() {
            return Err("NATS stream_name cannot be empty".to_string());
        }

        if self.scheduler.tick_interval_seconds == 0 {
            return Err("Scheduler tick_interval_seconds must be greater than 0".to_string());
        }
        if self.scheduler.lock_resource.is_empty() {
            return Err("Scheduler lock_resource cannot be empty".to_string());
        }

        if self.invoker.poll_interval_ms == 0 {
            return Err("Invoker poll_interval_ms must be greater than 0".to_string());
        }
        if self.invoker.queue_name.is_empty() {
            return Err("Invoker queue_name cannot be empty".to_string());
        }

        if self.capabilities.refresh_interval_seconds == 0 {
            return Err("Capabilities refresh_interval_seconds must be greater than 0".to_string());
        }
        if self.capabilities.guard_ttl_seconds == 0 {
            return Err("Capabilities guard_ttl_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/cdflow".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool_size: 10,
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                stream_name: "PIPELINE_RUNS".to_string(),
                subject_prefix: "pipelines.run".to_string(),
            },
            scheduler: SchedulerSettings::default(),
            invoker: InvokerSettings::default(),
            capabilities: CapabilitySettings::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}
