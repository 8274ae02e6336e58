use std::sync::Arc;

use anyhow::Context;

use licensehub_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    licensehub_observability::init();

    let config = AppConfig::from_env()?;
    let services = Arc::new(licensehub_api::app::services::build_services(&config).await?);
    let app = licensehub_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
