use clap::Parser;
use pulse_monitor::alerting::EvaluationService;
use pulse_monitor::db::DatabaseStore;
use pulse_monitor::http_server::create_router;
use pulse_monitor::metrics::MetricsService;
use pulse_monitor::monitoring::{HttpProber, Scheduler};
use pulse_monitor::server::ServerConfig;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM.");
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?;

    init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting pulse monitor.");

    // --- Database Setup ---
    let mut opt = ConnectOptions::new(config.database_url.to_owned());
    opt.max_connections(config.db_max_connections);
    let db = match Database::connect(opt).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to create database connection.");
            return Err(e.into());
        }
    };
    let store = Arc::new(DatabaseStore::new(db));

    // --- Pipeline ---
    let prober = Arc::new(HttpProber::new()?);
    let evaluator = Arc::new(EvaluationService::new(store.clone(), store.clone()));
    let scheduler = Scheduler::new(
        store.clone(),
        store.clone(),
        store.clone(),
        prober,
        evaluator,
        config.max_concurrent_probes,
    );
    let metrics = Arc::new(MetricsService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = tokio::spawn(scheduler.run(config.tick_interval(), shutdown_rx.clone()));

    // --- HTTP Server ---
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(address = %config.listen_addr, "Metrics API listening.");
    let mut http_shutdown = shutdown_rx;
    let server = axum::serve(listener, create_router(metrics)).with_graceful_shutdown(async move {
        let _ = http_shutdown.wait_for(|stop| *stop).await;
    });
    let server_task = tokio::spawn(async move { server.await });

    shutdown_signal().await;
    info!("Shutdown signal received. Finishing in-flight work.");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task ended abnormally.");
    }
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server error."),
        Err(e) => error!(error = %e, "HTTP server task ended abnormally."),
    }

    info!("Shutdown complete.");
    Ok(())
}
