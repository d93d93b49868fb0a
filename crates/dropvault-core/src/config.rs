//! Configuration module
//!
//! Settings for the metadata store, blob store, lifecycle policy, burn queue and
//! reconciliation sweep. Everything has a default so a bare `dropvault` starts
//! against `./uploads` and a local SQLite file.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const DATABASE_URL: &str = "sqlite://dropvault.db";
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const LOCAL_STORAGE_PATH: &str = "./uploads";
const FILE_TTL_SECONDS: u64 = 3600;
const MAX_FILE_TTL_SECONDS: u64 = 86_400;
const MAX_FILE_SIZE_MB: usize = 32;
const BURN_QUEUE_MAX_WORKERS: usize = 4;
const BURN_QUEUE_CAPACITY: usize = 1024;
const BURN_MAX_RETRIES: u32 = 3;
const BURN_RETRY_BASE_DELAY_MS: u64 = 250;
const BURN_RETRY_MAX_DELAY_MS: u64 = 30_000;
const BURN_TIMEOUT_SECONDS: u64 = 30;
const SWEEP_INTERVAL_SECS: u64 = 300;
const SWEEP_BATCH_SIZE: usize = 500;
const ORPHAN_GRACE_PERIOD_SECS: u64 = 3600;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Invalid log format: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
}

/// Expiry policy applied to new uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(FILE_TTL_SECONDS),
            max_ttl: Duration::from_secs(MAX_FILE_TTL_SECONDS),
        }
    }
}

impl LifecyclePolicy {
    /// TTL for an upload: the default when none was requested, otherwise the
    /// request clamped to `[1s, max_ttl]`. A `max_ttl` under one second is
    /// treated as one second.
    pub fn resolve_ttl(&self, requested: Option<Duration>) -> Duration {
        const MIN_TTL: Duration = Duration::from_secs(1);
        match requested {
            None => self.default_ttl,
            Some(ttl) => ttl.max(MIN_TTL).min(self.max_ttl.max(MIN_TTL)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BurnQueueSettings {
    pub max_workers: usize,
    pub capacity: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub timeout: Duration,
}

impl Default for BurnQueueSettings {
    fn default() -> Self {
        Self {
            max_workers: BURN_QUEUE_MAX_WORKERS,
            capacity: BURN_QUEUE_CAPACITY,
            max_retries: BURN_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(BURN_RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_millis(BURN_RETRY_MAX_DELAY_MS),
            timeout: Duration::from_secs(BURN_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SweepSettings {
    /// Zero disables the periodic sweep.
    pub interval: Duration,
    pub batch_size: usize,
    pub orphan_grace_period: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            batch_size: SWEEP_BATCH_SIZE,
            orphan_grace_period: Duration::from_secs(ORPHAN_GRACE_PERIOD_SECS),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub server_port: u16,
    /// Requests served concurrently before new ones wait.
    pub http_concurrency_limit: usize,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub policy: LifecyclePolicy,
    pub max_file_size_bytes: usize,
    pub burn_queue: BurnQueueSettings,
    pub sweep: SweepSettings,
    pub log_format: LogFormat,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults; unknown enum
    /// values and invalid combinations are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = lookup("PORT")
            .unwrap_or_else(|| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let http_concurrency_limit = lookup("HTTP_CONCURRENCY_LIMIT")
            .unwrap_or_else(|| HTTP_CONCURRENCY_LIMIT.to_string())
            .parse::<usize>()
            .unwrap_or(HTTP_CONCURRENCY_LIMIT)
            .max(1);

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").unwrap_or_else(|| DATABASE_URL.to_string()),
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            timeout: Duration::from_secs(
                lookup("DB_TIMEOUT_SECONDS")
                    .unwrap_or_else(|| CONNECTION_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(CONNECTION_TIMEOUT_SECS),
            ),
        };

        let storage = StorageConfig {
            backend: lookup("STORAGE_BACKEND")
                .unwrap_or_else(|| StorageBackend::Local.to_string())
                .parse()?,
            local_path: lookup("LOCAL_STORAGE_PATH")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| LOCAL_STORAGE_PATH.to_string()),
        };

        let policy = LifecyclePolicy {
            default_ttl: Duration::from_secs(
                lookup("FILE_TTL_SECONDS")
                    .unwrap_or_else(|| FILE_TTL_SECONDS.to_string())
                    .parse()
                    .unwrap_or(FILE_TTL_SECONDS),
            ),
            max_ttl: Duration::from_secs(
                lookup("MAX_FILE_TTL_SECONDS")
                    .unwrap_or_else(|| MAX_FILE_TTL_SECONDS.to_string())
                    .parse()
                    .unwrap_or(MAX_FILE_TTL_SECONDS),
            ),
        };

        let max_file_size_mb = lookup("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let burn_queue = BurnQueueSettings {
            max_workers: lookup("BURN_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|| BURN_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(BURN_QUEUE_MAX_WORKERS),
            capacity: lookup("BURN_QUEUE_CAPACITY")
                .unwrap_or_else(|| BURN_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(BURN_QUEUE_CAPACITY),
            max_retries: lookup("BURN_MAX_RETRIES")
                .unwrap_or_else(|| BURN_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(BURN_MAX_RETRIES),
            retry_base_delay: Duration::from_millis(
                lookup("BURN_RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|| BURN_RETRY_BASE_DELAY_MS.to_string())
                    .parse()
                    .unwrap_or(BURN_RETRY_BASE_DELAY_MS),
            ),
            retry_max_delay: Duration::from_millis(
                lookup("BURN_RETRY_MAX_DELAY_MS")
                    .unwrap_or_else(|| BURN_RETRY_MAX_DELAY_MS.to_string())
                    .parse()
                    .unwrap_or(BURN_RETRY_MAX_DELAY_MS),
            ),
            timeout: Duration::from_secs(
                lookup("BURN_TIMEOUT_SECONDS")
                    .unwrap_or_else(|| BURN_TIMEOUT_SECONDS.to_string())
                    .parse()
                    .unwrap_or(BURN_TIMEOUT_SECONDS),
            ),
        };

        let sweep = SweepSettings {
            interval: Duration::from_secs(
                lookup("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|| SWEEP_INTERVAL_SECS.to_string())
                    .parse()
                    .unwrap_or(SWEEP_INTERVAL_SECS),
            ),
            batch_size: lookup("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|| SWEEP_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(SWEEP_BATCH_SIZE),
            orphan_grace_period: Duration::from_secs(
                lookup("ORPHAN_GRACE_PERIOD_SECS")
                    .unwrap_or_else(|| ORPHAN_GRACE_PERIOD_SECS.to_string())
                    .parse()
                    .unwrap_or(ORPHAN_GRACE_PERIOD_SECS),
            ),
        };

        let log_format = lookup("LOG_FORMAT")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        let config = Config {
            environment,
            server_port,
            http_concurrency_limit,
            database,
            storage,
            policy,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            burn_queue,
            sweep,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a SQLite connection string (sqlite://...)"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
        }

        if self.policy.default_ttl.is_zero() {
            return Err(anyhow::anyhow!("FILE_TTL_SECONDS must be greater than 0"));
        }

        if self.policy.max_ttl < self.policy.default_ttl {
            return Err(anyhow::anyhow!(
                "MAX_FILE_TTL_SECONDS must not be smaller than FILE_TTL_SECONDS"
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.burn_queue.max_workers == 0 || self.burn_queue.capacity == 0 {
            return Err(anyhow::anyhow!(
                "BURN_QUEUE_MAX_WORKERS and BURN_QUEUE_CAPACITY must be at least 1"
            ));
        }

        if self.burn_queue.retry_max_delay < self.burn_queue.retry_base_delay {
            return Err(anyhow::anyhow!(
                "BURN_RETRY_MAX_DELAY_MS must not be smaller than BURN_RETRY_BASE_DELAY_MS"
            ));
        }

        if self.burn_queue.timeout.is_zero() {
            return Err(anyhow::anyhow!("BURN_TIMEOUT_SECONDS must be greater than 0"));
        }

        if self.sweep.batch_size == 0 {
            return Err(anyhow::anyhow!("SWEEP_BATCH_SIZE must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.database.url, "sqlite://dropvault.db");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_path, "./uploads");
        assert_eq!(config.policy.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_file_size_bytes, 32 * 1024 * 1024);
        assert_eq!(config.burn_queue.max_workers, 4);
        assert_eq!(config.burn_queue.max_retries, 3);
        assert_eq!(config.sweep.interval, Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("APP_ENV", "prod"),
            ("PORT", "9000"),
            ("STORAGE_BACKEND", "memory"),
            ("FILE_TTL_SECONDS", "60"),
            ("BURN_QUEUE_MAX_WORKERS", "8"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.policy.default_ttl, Duration::from_secs(60));
        assert_eq!(config.burn_queue.max_workers, 8);
        assert!(config.sweep.interval.is_zero());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = config_from(&[("DB_MAX_CONNECTIONS", "lots")]).unwrap();
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "postgresql://localhost/db")]).is_err());
        assert!(config_from(&[("STORAGE_BACKEND", "s3")]).is_err());
        assert!(config_from(&[("FILE_TTL_SECONDS", "0")]).is_err());
        assert!(config_from(&[("FILE_TTL_SECONDS", "7200"), ("MAX_FILE_TTL_SECONDS", "60")]).is_err());
        assert!(config_from(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_resolve_ttl_clamps_requests() {
        let policy = LifecyclePolicy {
            default_ttl: Duration::from_secs(3600),
            max_ttl: Duration::from_secs(7200),
        };
        assert_eq!(policy.resolve_ttl(None), Duration::from_secs(3600));
        assert_eq!(
            policy.resolve_ttl(Some(Duration::from_secs(60))),
            Duration::from_secs(60)
        );
        assert_eq!(
            policy.resolve_ttl(Some(Duration::from_secs(100_000))),
            Duration::from_secs(7200)
        );
        assert_eq!(
            policy.resolve_ttl(Some(Duration::ZERO)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_resolve_ttl_with_zero_max_ttl() {
        let policy = LifecyclePolicy {
            default_ttl: Duration::from_secs(3600),
            max_ttl: Duration::ZERO,
        };
        assert_eq!(
            policy.resolve_ttl(Some(Duration::from_secs(5))),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.resolve_ttl(Some(Duration::ZERO)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_zero_max_ttl_is_rejected() {
        assert!(config_from(&[("MAX_FILE_TTL_SECONDS", "0")]).is_err());
    }
}
