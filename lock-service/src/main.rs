use lock_service::{config::LockServiceConfig, services::init_metrics, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LockServiceConfig::from_env()?;

    service_core::observability::init_tracing(
        &config.service_name,
        &config.app.log_level,
        config.app.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!("Starting {}", config.service_name);

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
