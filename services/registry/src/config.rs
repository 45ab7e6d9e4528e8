use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors detected while validating a loaded configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Main configuration for the registry service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Patient record store configuration
    pub store: StoreConfig,
    /// S3 configuration for exam uploads
    pub s3: S3Config,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Which record store implementation backs the service
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Dynamodb,
    Memory,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store implementation
    #[serde(default)]
    pub backend: StoreBackend,
    /// DynamoDB table holding patient records
    #[serde(default)]
    pub table_name: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for LocalStack, DynamoDB Local, etc.)
    pub endpoint_url: Option<String>,
}

/// S3 configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// S3 bucket receiving exam images
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Upload URL expiration in seconds
    #[serde(default = "default_upload_url_expiry_secs")]
    pub upload_url_expiry_secs: u64,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// Default value functions
fn default_service_name() -> String {
    "registry-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_upload_url_expiry_secs() -> u64 {
    15 * 60
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from config files and the environment, then validate it
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "registry-service")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            .add_source(config::File::with_name("config/registry").required(false))
            .add_source(config::File::with_name("/etc/oncovision/registry").required(false))
            // REGISTRY__STORE__TABLE_NAME -> store.table_name
            .add_source(
                config::Environment::with_prefix("REGISTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variable names used by the existing deployment templates
            .set_override_option("store.table_name", std::env::var("TABLE_NAME").ok())?
            .set_override_option("s3.bucket", std::env::var("BUCKET_NAME").ok())?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Check required values up front so a bad deployment fails at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Dynamodb && self.store.table_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("store.table_name".to_string()));
        }

        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::MissingRequired("s3.bucket".to_string()));
        }

        if self.s3.upload_url_expiry_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "s3.upload_url_expiry_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get upload URL expiry as Duration
    pub fn upload_url_expiry(&self) -> Duration {
        Duration::from_secs(self.s3.upload_url_expiry_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Dynamodb,
                table_name: "patients".to_string(),
                region: default_region(),
                endpoint_url: None,
            },
            s3: S3Config {
                bucket: "exam-uploads".to_string(),
                region: default_region(),
                endpoint_url: None,
                force_path_style: false,
                upload_url_expiry_secs: default_upload_url_expiry_secs(),
            },
            api: ApiConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_upload_url_expiry_secs(), 900);
        assert_eq!(default_region(), "us-east-1");
        assert_eq!(test_config().upload_url_expiry(), Duration::from_secs(900));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert_eq!(test_config().validate(), Ok(()));
    }

    #[test]
    fn test_validate_requires_table_for_dynamodb() {
        let mut config = test_config();
        config.store.table_name = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired("store.table_name".to_string()))
        );

        config.store.backend = StoreBackend::Memory;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_requires_bucket() {
        let mut config = test_config();
        config.s3.bucket = String::new();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired("s3.bucket".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_zero_expiry() {
        let mut config = test_config();
        config.s3.upload_url_expiry_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_sources() {
        let config: Config = config::Config::builder()
            .set_override("store.backend", "memory")
            .unwrap()
            .set_override("s3.bucket", "exam-uploads")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.s3.upload_url_expiry_secs, 900);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.service.name, "registry-service");
    }
}
