pub mod calculations;
pub mod config;
pub mod dates;
pub mod db;
pub mod email_service;
pub mod generators;
pub mod logging;
pub mod mail;
pub mod models;
pub mod pdf;
pub mod server;
pub mod stats;
pub mod status;
pub mod templates;
pub mod transfer;
pub mod validation;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;

pub use config::AppConfig;
pub use db::{DbState, StoreError};
pub use models::{AppData, AppSettings, Client, Company, Invoice, InvoiceItem, InvoiceStatus, Product};

/// Opens the store, persists overdue statuses, then serves the proxy
/// endpoints until a shutdown signal arrives.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;

    let db = DbState::open(&config.db_path)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    let changed = db
        .mark_overdue_invoices(dates::today())
        .await
        .context("overdue sweep failed")?;
    tracing::info!(
        db = %config.db_path.display(),
        overdue_marked = changed.len(),
        version = models::APP_VERSION,
        "store ready"
    );

    let state = server::AppState::new(Arc::new(mail::SmtpRelay));
    server::serve(addr, state).await.context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}
