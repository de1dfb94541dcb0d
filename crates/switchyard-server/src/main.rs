//! Switchyard binary: loads configuration, installs logging and runs every
//! enabled channel until SIGINT/SIGTERM.

use std::process::ExitCode;
use switchyard_server::config::{self, DEFAULT_CONFIG_PATH};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn resolve_config_path(arg: Option<String>) -> (String, &'static str) {
    if let Some(path) = arg.filter(|value| !value.trim().is_empty()) {
        return (path, "cli-arg");
    }

    if let Ok(path) = std::env::var("SWITCHYARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (path, "env-var");
        }
    }

    (DEFAULT_CONFIG_PATH.to_string(), "default")
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let arg = std::env::args().nth(1);
    if matches!(arg.as_deref(), Some("--version" | "-V")) {
        println!("switchyard {}", VERSION);
        return ExitCode::SUCCESS;
    }

    let (config_path, config_source) = resolve_config_path(arg);
    let config = match config::load_config(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("switchyard: failed to load configuration from {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging);
    tracing::info!(version = VERSION, "switchyard starting");
    tracing::info!(
        source = config_source,
        path = %config_path,
        "resolved startup configuration path"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    match switchyard_server::run(config, shutdown).await {
        Ok(()) => {
            tracing::info!("switchyard stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "switchyard failed to start");
            ExitCode::FAILURE
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
