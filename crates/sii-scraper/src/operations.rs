//! Operations facade: the boundary the external HTTP/WebSocket layer
//! calls into.
//!
//! Every operation acquires (or reuses) the tenant's session, takes the
//! per-key operation lock so concurrent calls for the same RUT queue
//! instead of racing on one page handle, and maps failures onto the
//! workspace error taxonomy. Progress lines flow through the optional
//! [`ProgressReporter`].

use crate::consolidate::{Consolidator, PageRegistryFetch};
use crate::error::Result;
use crate::folder::{TaxFolderGenerator, TaxFolderRequest};
use crate::nav::{NavigationOutcome, Navigator};
use crate::rcv::RegistryScraper;
use crate::submit::SubmissionDriver;
use chrono::Utc;
use sii_codes::CodeSetRegistry;
use sii_core::{
    ConsolidatedReport, PendingInvoiceSummary, Period, ProgressReporter, Receipt, RegistryRow, Rut,
};
use sii_session::SessionManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Code set driving the declaration-proposal flow.
const PROPOSAL_SET: &str = "declaration-proposal";

/// The operation surface over one session manager.
pub struct Operations {
    manager: Arc<SessionManager>,
    codes: CodeSetRegistry,
}

impl Operations {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>, codes: CodeSetRegistry) -> Self {
        Self { manager, codes }
    }

    /// The session manager operations run against.
    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Navigate the declaration flow and extract the form.
    ///
    /// The returned [`NavigationOutcome`] is the soft-failure boundary:
    /// `Err` here means the session itself is unusable.
    ///
    /// # Errors
    /// Session acquisition/authentication failures and unknown code sets.
    pub async fn declare_proposal(
        &self,
        rut: Rut,
        clave: &str,
        period: Option<Period>,
        progress: ProgressReporter,
    ) -> Result<NavigationOutcome> {
        let code_set = self.codes.get(PROPOSAL_SET)?;
        let session = self.manager.acquire(rut, clave).await?;
        let _ops = session.lock_ops().await;
        progress.info("sesion lista");

        let navigator = Navigator::new(
            session.engine(),
            session.page(),
            self.manager.config(),
            &code_set,
            &progress,
        );
        Ok(navigator.run(period).await)
    }

    /// Scrape the registry summary for a period (current month if none).
    ///
    /// # Errors
    /// Session failures and registry navigation/scrape failures.
    pub async fn registry_summary(
        &self,
        rut: Rut,
        clave: &str,
        period: Option<Period>,
        progress: ProgressReporter,
    ) -> Result<Vec<RegistryRow>> {
        let period = period.unwrap_or_else(|| Period::from_date(Utc::now().date_naive()));
        let session = self.manager.acquire(rut, clave).await?;
        let _ops = session.lock_ops().await;
        progress.info("sesion lista");

        let scraper = RegistryScraper::new(session.page(), self.manager.config(), &progress);
        scraper.fetch_summary(period).await
    }

    /// Summarize registry entries pending acknowledgment.
    ///
    /// # Errors
    /// Session failures and registry navigation failures.
    pub async fn pending_invoices(
        &self,
        rut: Rut,
        clave: &str,
        progress: ProgressReporter,
    ) -> Result<PendingInvoiceSummary> {
        let session = self.manager.acquire(rut, clave).await?;
        let _ops = session.lock_ops().await;
        progress.info("sesion lista");

        let scraper = RegistryScraper::new(session.page(), self.manager.config(), &progress);
        scraper.open().await?;
        scraper.fetch_pending().await
    }

    /// Consolidate the rolling 12-month registry window.
    ///
    /// Per-period failures are recorded inside the report; `Err` is
    /// reserved for a session that could not be established at all.
    ///
    /// # Errors
    /// Session acquisition/authentication failures.
    pub async fn consolidated_report(
        &self,
        rut: Rut,
        clave: &str,
        progress: ProgressReporter,
    ) -> Result<ConsolidatedReport> {
        let session = self.manager.acquire(rut.clone(), clave).await?;
        let _ops = session.lock_ops().await;
        progress.info("sesion lista, iniciando consolidacion de 12 meses");

        let scraper = RegistryScraper::new(session.page(), self.manager.config(), &progress);
        let mut fetcher = PageRegistryFetch::new(scraper);

        Ok(Consolidator::consolidate(
            &rut,
            &mut fetcher,
            Utc::now().date_naive(),
            &progress,
        )
        .await)
    }

    /// Submit the declaration currently loaded in the tenant's session.
    ///
    /// # Errors
    /// Session failures and a missing submit control.
    pub async fn submit_declaration(
        &self,
        rut: Rut,
        clave: &str,
        payment_method: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<Receipt> {
        let session = self.manager.acquire(rut, clave).await?;
        let _ops = session.lock_ops().await;

        let driver = SubmissionDriver::new(session.page(), self.manager.config(), &progress);
        driver.submit(payment_method).await
    }

    /// Generate the carpeta tributaria PDF into `output_dir`.
    ///
    /// # Errors
    /// Session failures, wizard failures, and a download that never lands.
    pub async fn tax_folder(
        &self,
        rut: Rut,
        clave: &str,
        request: TaxFolderRequest,
        output_dir: &Path,
        progress: ProgressReporter,
    ) -> Result<PathBuf> {
        let session = self.manager.acquire(rut, clave).await?;
        let _ops = session.lock_ops().await;

        let generator = TaxFolderGenerator::new(session.page(), self.manager.config(), &progress);
        generator.generate(&request, output_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sii_core::PortalConfig;

    #[test]
    fn test_operations_wiring() {
        let manager = Arc::new(SessionManager::new(PortalConfig::default()));
        let operations = Operations::new(manager, CodeSetRegistry::with_defaults());

        // The proposal flow's code set must exist in the default registry.
        assert!(operations.codes.get(PROPOSAL_SET).is_ok());
        assert!(operations
            .manager()
            .config()
            .proposal_url
            .contains("propuestaf29ui"));
    }
}
