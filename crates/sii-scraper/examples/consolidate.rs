//! Consolidate the rolling 12-month registry window for one RUT.
//!
//! ```bash
//! SII_RUT=12.345.678-9 SII_CLAVE=secret cargo run --example consolidate
//! ```

use anyhow::Context;
use sii_codes::CodeSetRegistry;
use sii_core::{PortalConfig, ProgressReporter, ProgressSink, Rut};
use sii_scraper::Operations;
use sii_session::SessionManager;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let rut = Rut::new(std::env::var("SII_RUT").context("SII_RUT not set")?)?;
    let clave = std::env::var("SII_CLAVE").context("SII_CLAVE not set")?;

    let manager = Arc::new(SessionManager::new(PortalConfig::default()));
    let operations = Operations::new(manager.clone(), CodeSetRegistry::with_defaults());

    let sink: ProgressSink = Arc::new(|event| println!("[{:?}] {}", event.level, event.text));
    let report = operations
        .consolidated_report(rut, &clave, ProgressReporter::new(sink))
        .await?;

    println!(
        "{} periodos, {} con error",
        report.periods.len(),
        report.error_count()
    );
    for entry in &report.periods {
        match (&entry.rows, &entry.error) {
            (Some(rows), _) => println!("  {} -> {} tipos de documento", entry.period, rows.len()),
            (_, Some(error)) => println!("  {} -> error: {error}", entry.period),
            _ => {}
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    manager.shutdown().await;
    Ok(())
}
