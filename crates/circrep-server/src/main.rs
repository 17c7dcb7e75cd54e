mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use circrep_engine::{default_exporters, EngineConfig, JobEngine};
use circrep_telemetry::SoapTelemetryClient;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(circrep_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let client = SoapTelemetryClient::new(&config)?;
    let engine = JobEngine::new(
        client,
        EngineConfig::from(config.as_ref()),
        default_exporters(config.report_font_path.as_deref()),
    );

    let _scheduler =
        scheduler::build_scheduler(Arc::clone(engine.store()), Arc::clone(&config)).await?;

    let app = build_app(AppState {
        engine,
        max_upload_bytes: config.max_upload_bytes,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        env = %config.env,
        telemetry_url = %config.telemetry_url,
        "circrep-server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
