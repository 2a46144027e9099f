use anyhow::Context as _;

use ewallet_api::{app::build_app, context::AppContext};
use ewallet_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ewallet_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let ctx = AppContext::from_config(&config).await?;
    let app = build_app(ctx);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
