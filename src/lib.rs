pub mod config;
pub mod db;
pub mod errors;
pub mod export;
pub mod generator;
pub mod logging;
pub mod mailer;
pub mod models;
pub mod server;
pub mod service;

use crate::config::{AppConfig, StoreBackend};
use crate::db::{Database, DocumentStore, ReportStore};
use crate::mailer::{MailTransport, SpoolMailer};
use crate::service::ReportService;
use std::sync::Arc;
use tracing::info;

/// Opens the configured store and mail outbox and wires them into a service.
pub fn build_service(config: &AppConfig) -> anyhow::Result<ReportService> {
    let store_path = config.store_path();
    let store: Arc<dyn ReportStore> = match config.store {
        StoreBackend::Sqlite => Arc::new(Database::new(&store_path)?),
        StoreBackend::Document => Arc::new(DocumentStore::open(&store_path)?),
    };
    info!(backend = ?config.store, path = %store_path.display(), "report store opened");

    let mailer: Arc<dyn MailTransport> = Arc::new(SpoolMailer::new(config.outbox_dir.clone()));
    Ok(ReportService::new(store, mailer, config.service_settings()))
}

/// Serves the HTTP API until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.socket_address()?;
    let service = Arc::new(build_service(&config)?);
    info!(
        row_count = service.settings().row_count,
        preview_rows = service.settings().preview_rows,
        strict_metrics = service.settings().strict_metrics,
        "report service ready"
    );

    let router = server::build_router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "custom reports server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
