// src/main.rs

//! # livedocs Main Entry Point
//!
//! Loads configuration, initializes logging, starts the change detector on
//! its own thread, and runs the web server until Ctrl-C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use livedocs::client::ClientScript;
use livedocs::config::AppConfig;
use livedocs::error::ServeError;
use livedocs::signal::ReloadSignal;
use livedocs::watcher::{ChangeDetector, WatchFilter};
use livedocs::web::{self, AppState};
use livedocs::{browser, network};

/// How long open connections may delay exit after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// The main entry point for livedocs.
///
/// This function performs the following steps:
/// 1. Loads the application configuration from CLI, file, and environment.
/// 2. Initializes the tracing subscriber for logging.
/// 3. Verifies the documentation directory and frees the port from a previous run.
/// 4. Primes the change detector and moves it to a background thread.
/// 5. Binds the listener and serves until a Ctrl-C signal arrives.
///
/// # Returns
/// Returns `Ok(())` after a clean shutdown. Startup failures exit with status 1.
#[tokio::main]
async fn main() -> Result<()> {
    let app_config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app_config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");

    tracing::info!("livedocs starting with configuration: {:?}", app_config);

    if !app_config.root.is_dir() {
        tracing::error!("{}", ServeError::MissingRoot(app_config.root.clone()));
        eprintln!("Run from the project root or pass --root <DIR>.");
        std::process::exit(1);
    }

    if app_config.reclaim_port {
        match network::reclaim_port(app_config.port).await {
            Ok(true) => tokio::time::sleep(network::RECLAIM_SETTLE).await,
            Ok(false) => tracing::debug!("Port {} is free", app_config.port),
            Err(e) => tracing::warn!("Could not reclaim port {}: {}", app_config.port, e),
        }
    }

    let signal = Arc::new(ReloadSignal::new());
    let mut detector = ChangeDetector::new(
        app_config.root.clone(),
        WatchFilter::from_config(&app_config),
    );
    if let Err(e) = detector.poll(&signal) {
        tracing::warn!("Initial scan failed: {}", e);
    }
    tracing::info!(
        "Tracking {} files under {}",
        detector.tracked_files(),
        app_config.root.display()
    );
    detector.spawn(Arc::clone(&signal), app_config.scan_interval)?;

    let listener = match web::bind(&app_config.listen_addr(), app_config.port).await {
        Ok(listener) => listener,
        Err(e @ ServeError::PortInUse { .. }) => {
            tracing::error!("{}", e);
            eprintln!(
                "Try a different port: livedocs {}",
                app_config.port.checked_add(1).unwrap_or(3000)
            );
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let port = listener.local_addr()?.port();
    tracing::info!("Local access:   http://localhost:{}", port);
    match network::local_ip().await {
        Some(ip) => tracing::info!("Network access: http://{}:{}", ip, port),
        None => tracing::info!("Network access: unavailable"),
    }
    tracing::info!("Press Ctrl+C to stop the server");

    if app_config.open_browser {
        browser::open_later(format!("http://localhost:{}", port));
    }

    let state = Arc::new(AppState::new(
        app_config.root.clone(),
        signal,
        ClientScript::new(app_config.mode, app_config.poll_interval),
    ));

    // Shutdown signal channel for graceful shutdown of the web server.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(web::start_server(listener, state, shutdown_rx));

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Ctrl-C received, shutting down server..."),
            Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
        },
        result = &mut server => {
            match result {
                Ok(Ok(())) => tracing::error!("Web server stopped unexpectedly."),
                Ok(Err(e)) => tracing::error!("Web server exited with error: {}", e),
                Err(e) => tracing::error!("Web server task panicked: {}", e),
            }
            std::process::exit(1);
        }
    }

    if shutdown_tx.send(true).is_err() {
        tracing::error!("Failed to send shutdown signal");
    }

    // The detector thread is detached and ends with the process.
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("livedocs shut down gracefully."),
        Ok(Ok(Err(e))) => tracing::error!("Web server exited with error: {}", e),
        Ok(Err(e)) => tracing::error!("Web server task panicked: {}", e),
        Err(_) => tracing::warn!("Open connections did not close in time; exiting anyway."),
    }
    Ok(())
}
