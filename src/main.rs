// az-health-exporter
// Prometheus exporter for Azure Resource Health with tracing logging
use anyhow::{bail, Context};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, level_filters::LevelFilter};

use az_health_exporter::cli::{Args, LogLevel};
use az_health_exporter::commands;
use az_health_exporter::config::{Config, EnvConfig};
use az_health_exporter::handlers::router;
use az_health_exporter::metrics::HealthMetrics;
use az_health_exporter::monitor::HealthMonitor;
use az_health_exporter::provider::{ProviderClient, ResourceHealthClient, TestDataClient};
use az_health_exporter::state::AppState;
use az_health_exporter::informative_name;

/// Time given to open connections after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(level: LogLevel) -> anyhow::Result<()> {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    debug!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Resolves when SIGINT or SIGTERM is received.
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.log_level)?;

    let overrides = args.overrides();

    if args.check_config {
        let env = EnvConfig::from_env().context("invalid environment")?;
        match Config::resolve(env, &overrides) {
            Ok(config) => {
                println!(
                    "✅ Configuration is valid ({} resources)",
                    config.resources.len()
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Err(e) = commands::run(command, &overrides, EnvConfig::from_env) {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting {}", informative_name());

    let env = EnvConfig::from_env().context("invalid environment")?;
    let config = Config::resolve(env, &overrides).context("failed to load configuration")?;

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics =
        Arc::new(HealthMetrics::new(&registry).context("failed to register health metrics")?);
    debug!("All metrics registered successfully");

    let provider: Arc<dyn ProviderClient> = match &args.test_data_file {
        Some(path) => {
            info!("Serving statuses from test data file {}", path.display());
            Arc::new(TestDataClient::from_file(path).map_err(anyhow::Error::msg)?)
        }
        None => {
            let credentials = config.require_credentials()?.clone();
            Arc::new(
                ResourceHealthClient::new(
                    credentials,
                    config.endpoints.clone(),
                    config.request_timeout,
                )
                .context("failed to create Azure Resource Health client")?,
            )
        }
    };

    let monitor = Arc::new(HealthMonitor::new(
        config.descriptors(),
        provider,
        metrics,
        config.monitor_settings(),
    ));

    // Start the polling engine
    let cancel = CancellationToken::new();
    let monitor_task = {
        let monitor = monitor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = monitor.start_monitoring(cancel).await {
                error!("Health monitor failed to start: {}", e);
            }
        })
    };

    let state = Arc::new(AppState::new(registry, monitor));
    let app = router(state);
    let addr = SocketAddr::new(args.bind, args.port);

    if args.enable_tls {
        let (Some(cert), Some(key)) = (&args.tls_cert, &args.tls_key) else {
            bail!("--enable-tls requires --tls-cert and --tls-key");
        };
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .context("failed to load TLS certificate or key")?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("az-health-exporter listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .context("server error")?;
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("az-health-exporter listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
    }

    // Stop the polling engine and wait for the cycle in flight
    cancel.cancel();
    if let Err(e) = monitor_task.await {
        error!("Health monitor task failed: {}", e);
    }

    info!("az-health-exporter stopped gracefully");
    Ok(())
}
