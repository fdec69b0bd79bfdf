//! Drive the declaration-proposal flow for one RUT and print the result.
//!
//! ```bash
//! SII_RUT=12.345.678-9 SII_CLAVE=secret cargo run --example declare
//! ```

use anyhow::Context;
use sii_codes::CodeSetRegistry;
use sii_core::{PortalConfig, ProgressReporter, ProgressSink, Rut};
use sii_scraper::{NavigationOutcome, Operations};
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
    let progress = ProgressReporter::new(sink);

    let outcome = operations
        .declare_proposal(rut, &clave, None, progress)
        .await?;

    match outcome {
        NavigationOutcome::Extracted(result) => {
            println!("periodo {}:", result.period);
            for (code, value) in &result.values {
                println!("  codigo {code}: {value}");
            }
            println!(
                "pago requerido: {} (monto {})",
                result.payment_required, result.amount_due
            );
        }
        NavigationOutcome::NoPendingPeriod => println!("sin periodos pendientes"),
        NavigationOutcome::Failed { step, screenshot } => {
            println!("fallo en paso {}", step.name());
            if let Some(path) = screenshot {
                println!("captura: {}", path.display());
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
