use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::dispatcher::ControllerSettings;
use crate::retry::Backoff;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Conflict retry policy for a single reconcile
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Controller validations
        let c = &self.controller;
        if c.workers == 0 {
            return Err("controller.workers must be > 0".into());
        }
        if c.reconcile_timeout_ms == 0 {
            return Err("controller.reconcile_timeout_ms must be > 0".into());
        }
        if c.requeue_base_delay_ms > c.requeue_max_delay_ms {
            return Err(
                "controller.requeue_base_delay_ms must be <= controller.requeue_max_delay_ms"
                    .into(),
            );
        }
        if c.event_buffer == 0 {
            return Err("controller.event_buffer must be > 0".into());
        }
        // Retry validations
        let r = &self.retry;
        if r.steps == 0 {
            return Err("retry.steps must be > 0".into());
        }
        if !r.factor.is_finite() || r.factor < 1.0 {
            return Err("retry.factor must be >= 1.0".into());
        }
        if !(0.0..=1.0).contains(&r.jitter) {
            return Err("retry.jitter must be within 0.0..=1.0".into());
        }
        // Health validations
        if self.health.enabled && self.health.port == 0 {
            return Err("health.port must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn health_addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .health
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.health.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upper bound for one reconcile, retries included.
    #[serde(default = "default_reconcile_timeout_ms")]
    pub reconcile_timeout_ms: u64,
    #[serde(default = "default_requeue_base_delay_ms")]
    pub requeue_base_delay_ms: u64,
    #[serde(default = "default_requeue_max_delay_ms")]
    pub requeue_max_delay_ms: u64,
    /// Periodic full resync; 0 disables it.
    #[serde(default)]
    pub resync_interval_secs: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_workers() -> usize {
    2
}
fn default_reconcile_timeout_ms() -> u64 {
    30_000
}
fn default_requeue_base_delay_ms() -> u64 {
    5
}
fn default_requeue_max_delay_ms() -> u64 {
    300_000
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            reconcile_timeout_ms: default_reconcile_timeout_ms(),
            requeue_base_delay_ms: default_requeue_base_delay_ms(),
            requeue_max_delay_ms: default_requeue_max_delay_ms(),
            resync_interval_secs: 0,
            event_buffer: default_event_buffer(),
        }
    }
}

impl ControllerConfig {
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            workers: self.workers,
            reconcile_timeout: Duration::from_millis(self.reconcile_timeout_ms),
            requeue_base_delay: Duration::from_millis(self.requeue_base_delay_ms),
            requeue_max_delay: Duration::from_millis(self.requeue_max_delay_ms),
            resync_interval: (self.resync_interval_secs > 0)
                .then(|| Duration::from_secs(self.resync_interval_secs)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_steps")]
    pub steps: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub factor: f64,
    #[serde(default = "default_retry_jitter")]
    pub jitter: f64,
    /// Cap on a single sleep; 0 means uncapped.
    #[serde(default)]
    pub max_delay_ms: u64,
}

fn default_retry_steps() -> u32 {
    5
}
fn default_retry_initial_delay_ms() -> u64 {
    10
}
fn default_retry_factor() -> f64 {
    1.0
}
fn default_retry_jitter() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            steps: default_retry_steps(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            factor: default_retry_factor(),
            jitter: default_retry_jitter(),
            max_delay_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            steps: self.steps,
            duration: Duration::from_millis(self.initial_delay_ms),
            factor: self.factor,
            jitter: self.jitter,
            cap: (self.max_delay_ms > 0).then(|| Duration::from_millis(self.max_delay_ms)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    #[serde(default = "default_health_host")]
    pub host: String,
    #[serde(default = "default_health_port")]
    pub port: u16,
}

fn default_health_enabled() -> bool {
    true
}
fn default_health_host() -> String {
    "0.0.0.0".into()
}
fn default_health_port() -> u16 {
    8081
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// JSON manifests loaded into the in-memory store at startup.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("rootproxy.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., ROOTPROXY__CONTROLLER__WORKERS=4
        builder = builder.add_source(
            Environment::with_prefix("ROOTPROXY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
