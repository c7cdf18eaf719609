use bazaar_server::server::{
    config::{CliArgs, ServerConfig},
    module::Module,
    providers::{HttpProvider, ProviderRegistry},
    service::{OfferService, router},
    telemetry::init_telemetry,
};
use clap::Parser;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let registry = build_registry(&config)?;
    let module = Module::get_instance(&config.engine());
    let service = OfferService::new(
        Arc::clone(&module),
        Arc::new(registry),
        config.offer_list_capacity,
    );

    let app = router(service).layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = TcpListener::bind(config.server_addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Connections are drained at this point, so nothing submits new jobs.
    if !module.stop().await {
        tracing::warn!("Job queue was not observed closed after stop");
    }
    tracing::info!("Service shut down successfully");
    providers.shutdown();

    served?;
    Ok(())
}

fn build_registry(config: &ServerConfig) -> anyhow::Result<ProviderRegistry> {
    let client = reqwest::Client::builder()
        .timeout(config.provider_http_timeout)
        .build()?;

    let mut registry = ProviderRegistry::new(config.providers_us.clone(), config.providers_ca.clone());
    for (marketplace, url) in &config.endpoints {
        let provider = HttpProvider::new(*marketplace, url, client.clone())?;
        tracing::info!("Registered {marketplace} at {}", provider.base_url());
        registry.register(Arc::new(provider));
    }

    if config.endpoints.is_empty() {
        tracing::warn!("No PROVIDER_ENDPOINTS configured; searches will return empty lists");
    }
    Ok(registry)
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting offer service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting offer service on {} with {} workers",
            config.server_addr,
            config.max_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
