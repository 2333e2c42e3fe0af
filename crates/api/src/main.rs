use std::sync::Arc;

use tenantgate_api::app::{build_app, services::build_services};
use tenantgate_infra::AppConfig;
use tenantgate_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let format = config.log_format.parse::<LogFormat>().unwrap_or_default();
    tenantgate_observability::init(format);

    let services = Arc::new(build_services(&config).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
