use std::{env, sync::Arc};

use anyhow::Context;
use rootproxy_controller::config::loader::load_config;
use rootproxy_controller::{AppConfig, Controller, build_app, observability};
use rootproxy_core::Scheme;
use rootproxy_core::events::EventBroadcaster;
use rootproxy_db_memory::{InMemoryStore, load_manifests};
use rootproxy_storage::EventedStore;
use tokio_util::sync::CancellationToken;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From ROOTPROXY_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (rootproxy.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (ROOTPROXY_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(cfg).await {
        eprintln!("Controller error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let scheme = Arc::new(Scheme::with_http_proxy());
    let memory = InMemoryStore::new(scheme);
    if let Some(path) = &cfg.store.seed_path {
        let objects = load_manifests(path)
            .await
            .with_context(|| format!("loading seed manifests from {}", path.display()))?;
        let count = memory.seed(objects)?;
        tracing::info!(count, "Seeded store");
    }

    let broadcaster = Arc::new(EventBroadcaster::with_capacity(cfg.controller.event_buffer));
    let store = Arc::new(EventedStore::new(memory, broadcaster.clone()));
    let controller = Controller::new(store, broadcaster, cfg.controller.settings())
        .with_backoff(cfg.retry.backoff());

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let health = if cfg.health.enabled {
        let addr = cfg.health_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding health endpoint on {addr}"))?;
        tracing::info!("health endpoints listening on {}", addr);
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, build_app())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }))
    } else {
        None
    };

    let result = controller.run(shutdown.clone()).await;
    shutdown.cancel();

    if let Some(handle) = health {
        handle.await?.context("health server")?;
    }
    result?;
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: ROOTPROXY_CONFIG
/// 3. Default: rootproxy.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("ROOTPROXY_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("rootproxy.toml".to_string(), ConfigSource::Default)
}
