use crate::cli::Cli;
use arc_swap::ArcSwap;
use genrelay_core::config::Config;
use genrelay_core::metrics::Metrics;
use genrelay_core::store::InMemoryConfigStore;
use genrelay_provider::NativeHttpClient;
use genrelay_server::AppState;
use std::sync::Arc;

/// Load config, wire up the store/upstream/metrics, and serve until
/// interrupted. The pool, trigger key, and fallback are seeded from
/// environment variables since there is no admin API in this build.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {e}; falling back to defaults", cli.config);
            Config::default()
        }
    };

    let _log_guard = genrelay_core::logging::init_logging(&config.log_level, config.log_to_file, config.log_dir.as_deref());

    let store = Arc::new(InMemoryConfigStore::new());
    seed_store_from_env(&store).await;

    let upstream = Arc::new(NativeHttpClient::new(config.connect_timeout_secs, config.request_timeout_secs));
    let http_client = genrelay_provider::common::build_http_client(config.connect_timeout_secs, config.request_timeout_secs)?;
    let metrics = Arc::new(Metrics::new());

    let bind_addr = cli.bind.unwrap_or_else(|| format!("{}:{}", config.host, config.port));
    let config = Arc::new(ArcSwap::from_pointee(config));

    let state = AppState { config, store, upstream, metrics, http_client };
    let router = genrelay_server::build_router(state);

    tracing::info!(addr = %bind_addr, "starting listener");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn seed_store_from_env(store: &InMemoryConfigStore) {
    use genrelay_core::store::{ConfigStore, Credential};

    if let Ok(trigger) = std::env::var("GENRELAY_TRIGGER_KEY") {
        store.set_trigger_key(Some(trigger)).await;
    }

    if let Ok(pool) = std::env::var("GENRELAY_PRIMARY_POOL") {
        let entries: Vec<Credential> = pool
            .split(',')
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, key)| Credential { id: format!("pool-{i}"), key: key.trim().to_string() })
            .collect();
        store.add_primary_entries(entries).await;
    }

    if let Ok(fallback) = std::env::var("GENRELAY_FALLBACK_KEY") {
        store.set_fallback_key(Some(fallback)).await;
    }

    if let Ok(models) = std::env::var("GENRELAY_FALLBACK_MODELS") {
        let models: Vec<String> = models.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
        store.set_fallback_model_set(models).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
