//! Application startup and lifecycle management.

use crate::adapters::{avior::AviorAdapter, raspberry::RaspberryAdapter, retry::RetryPolicy, Adapters};
use crate::config::LockServiceConfig;
use crate::services::{JwtAuthenticator, LockStore, PgStore};
use crate::{build_router, AppState};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Application container for managing server lifecycle.
pub struct Application {
    listener: TcpListener,
    state: AppState,
    allowed_origins: Vec<String>,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: LockServiceConfig) -> Result<Self, AppError> {
        let store = PgStore::connect(
            config.database.url.expose_secret(),
            config.database.max_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to Postgres: {}", e);
            AppError::DatabaseError(e)
        })?;

        store.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            AppError::DatabaseError(e)
        })?;

        let client = reqwest::Client::builder().build().map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            AppError::InternalError(e.into())
        })?;

        let raspberry = RaspberryAdapter::new(
            client.clone(),
            config.raspberry.api_key.clone(),
            RetryPolicy::device_local()
                .with_attempt_timeout(config.raspberry.timeout)
                .with_retry_delay(config.raspberry.retry_delay),
        );
        let avior = AviorAdapter::new(client, &config.mobikey.base_url, config.mobikey.timeout)
            .map_err(AppError::ConfigError)?;

        let state = AppState::new(
            Arc::new(store),
            Arc::new(JwtAuthenticator::new(&config.auth.jwt_secret)),
            Adapters::new(raspberry, avior),
            config.audit.write_timeout,
        );

        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %config.service_name,
            "Lock service listening on port {}",
            port
        );

        Ok(Self {
            listener,
            state,
            allowed_origins: config.allowed_origins,
        })
    }

    /// Serve until SIGINT or SIGTERM, then drain and close the pool.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let store: Arc<dyn LockStore> = self.state.store.clone();
        let router = build_router(self.state, &self.allowed_origins);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        store.close().await;
        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
