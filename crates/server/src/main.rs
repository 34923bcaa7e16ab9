use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashpack_core::{
    load_config, validate_config, ArtifactNamespace, EncodeLauncher, FfmpegLauncher,
    FfprobeInspector, StreamInspector, TranscodeCoordinator,
};
use dashpack_server::{api::create_router, metrics::job_update_callback, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("dashpack {}", VERSION);

    // Determine config path
    let config_path = std::env::var("DASHPACK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Upload directory: {:?}", config.storage.upload_dir);
    info!("Output directory: {:?}", config.storage.output_dir);

    // Create storage directories
    for dir in [&config.storage.upload_dir, &config.storage.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    // Create encoder collaborators
    let launcher = FfmpegLauncher::new(config.encoder.clone());
    match launcher.validate().await {
        Ok(()) => info!(
            "Encoder binaries available (ffmpeg: {:?}, ffprobe: {:?})",
            config.encoder.ffmpeg_path, config.encoder.ffprobe_path
        ),
        Err(e) => warn!("Encoder validation failed, jobs will fail until fixed: {}", e),
    }

    let inspector: Arc<dyn StreamInspector> = Arc::new(FfprobeInspector::new(&config.encoder));
    let launcher: Arc<dyn EncodeLauncher> = Arc::new(launcher);

    let coordinator = Arc::new(
        TranscodeCoordinator::new(
            ArtifactNamespace::new(config.storage.output_dir.clone()),
            inspector,
            launcher,
        )
        .with_update_callback(job_update_callback()),
    );
    info!("Transcode coordinator initialized");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&coordinator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let running encodes finish and record their outcome
    info!("Server shutting down...");
    coordinator.shutdown().await;
    info!("All encodes finished");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
