use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::application::services::ConsumerConfig;

use super::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub event_bus: EventBusSettings,
    #[serde(default)]
    pub consumer: ConsumerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub workers: WorkerSettings,
}

impl Settings {
    /// Reads `appsettings.{environment}.toml` when present, then `APP_*`
    /// variables (`APP_EVENT_BUS__URL` sets `event_bus.url`).
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.file_suffix()))
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Without a URL the process keeps its records in memory.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventBusProviderSetting {
    Redis,
    /// Process-local streams for development. Nothing is shared between
    /// processes and published entries are never trimmed.
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventBusSettings {
    pub provider: EventBusProviderSetting,
    pub url: String,
    pub prefix: String,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            provider: EventBusProviderSetting::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "jobs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub group: String,
    /// Defaults to the host name plus process id.
    pub name: Option<String>,
    pub batch_size: usize,
    pub block_ms: u64,
    pub concurrency: usize,
    pub min_idle_ms: u64,
    pub claim_interval_ms: u64,
    pub max_deliveries: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group: "orchestrator".to_string(),
            name: None,
            batch_size: 10,
            block_ms: 5_000,
            concurrency: 4,
            min_idle_ms: 60_000,
            claim_interval_ms: 30_000,
            max_deliveries: 5,
        }
    }
}

impl ConsumerSettings {
    pub fn consumer_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "dragoman".to_string());
            format!("{}-{}", host, std::process::id())
        })
    }

    /// Consumer settings for `group`, sharing every other knob.
    pub fn to_consumer_config(&self, group: &str) -> ConsumerConfig {
        let mut config = ConsumerConfig::new(group, self.consumer_name());
        config.batch_size = self.batch_size.max(1);
        config.block = Duration::from_millis(self.block_ms);
        config.concurrency = self.concurrency.max(1);
        config.min_idle = Duration::from_millis(self.min_idle_ms);
        config.claim_interval = Duration::from_millis(self.claim_interval_ms);
        config.max_deliveries = self.max_deliveries.max(1);
        config
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderSetting {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub provider: StorageProviderSetting,
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    /// MinIO or another S3-compatible endpoint.
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_allow_http: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProviderSetting::Local,
            local_path: "./data/blobs".to_string(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_allow_http: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub json: bool,
    /// Overrides the built-in filter when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Run the orchestrator consumer in this process.
    pub orchestrator: bool,
    /// Run the built-in translation stage worker in this process.
    pub translation: bool,
    /// On startup the orchestrator re-issues work for in-flight jobs untouched
    /// for this many seconds. Zero disables the sweep.
    pub resume_after_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            orchestrator: true,
            translation: false,
            resume_after_secs: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_settings_map_onto_consumer_config() {
        let settings = ConsumerSettings {
            name: Some("worker-a".to_string()),
            block_ms: 0,
            concurrency: 0,
            ..ConsumerSettings::default()
        };
        let config = settings.to_consumer_config("translation-workers");

        assert_eq!(config.group, "translation-workers");
        assert_eq!(config.consumer, "worker-a");
        assert!(config.block.is_zero());
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_deliveries, 5);
    }

    #[test]
    fn workers_resume_stalled_jobs_after_fifteen_minutes_by_default() {
        let workers = WorkerSettings::default();
        assert!(workers.orchestrator);
        assert!(!workers.translation);
        assert_eq!(workers.resume_after_secs, 900);
    }

    #[test]
    fn storage_defaults_to_local_disk() {
        let storage = StorageSettings::default();
        assert_eq!(storage.provider, StorageProviderSetting::Local);
        assert_eq!(storage.s3_region, "us-east-1");
    }
}
