//! Declaration submission and receipt capture.
//!
//! The least-exercised flow: payment-method selection in particular is
//! best-effort and an incomplete selection never fails the submission.
//! The caller gets whatever receipt identifier was found, or the
//! not-detected sentinel when the confirmation marker stayed away.

use crate::error::{Result, ScraperError};
use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use sii_browser::{dom, poll};
use sii_core::{PortalConfig, ProgressReporter, Receipt};
use tracing::{info, warn};

/// Captions of the final submit control.
const SUBMIT_CAPTIONS: &[&str] = &["Enviar Declaración", "Presentar Declaración", "Enviar"];

/// Terms that appear once the portal confirmed the submission.
const CONFIRMATION_TERMS: &[&str] = &["Folio", "Comprobante de Declaración"];

/// Drives the final submit step on a page already holding the form.
pub struct SubmissionDriver<'a> {
    page: &'a Page,
    config: &'a PortalConfig,
    progress: &'a ProgressReporter,
}

impl<'a> SubmissionDriver<'a> {
    #[must_use]
    pub fn new(page: &'a Page, config: &'a PortalConfig, progress: &'a ProgressReporter) -> Self {
        Self {
            page,
            config,
            progress,
        }
    }

    /// Submit the declaration and scrape the confirmation receipt.
    ///
    /// # Errors
    /// Returns error only when the submit control itself is missing; a
    /// confirmation that never appears yields [`Receipt::not_detected`].
    pub async fn submit(&self, payment_method: Option<&str>) -> Result<Receipt> {
        if let Some(method) = payment_method {
            self.try_select_payment_method(method).await;
        }

        if !dom::click_visible_button(self.page, SUBMIT_CAPTIONS).await? {
            return Err(ScraperError::Browser(
                sii_browser::BrowserError::SelectorNotFound("submit control".to_string()),
            ));
        }
        self.progress.info("declaracion enviada, esperando folio");

        let confirmed =
            poll::wait_for_visible_text(self.page, CONFIRMATION_TERMS, self.config.form_timeout())
                .await;

        if !confirmed {
            warn!("confirmation marker never appeared");
            self.progress.warn("folio no detectado");
            dom::capture_diagnostic(self.page, &self.config.artifact_dir, "submit_no_folio")
                .await;
            return Ok(Receipt::not_detected());
        }

        let text = dom::visible_text(self.page).await?;
        let receipt = match parse_folio(&text) {
            Some((folio, banner)) => {
                info!(folio = %folio, "submission confirmed");
                self.progress.info(format!("folio obtenido: {folio}"));
                Receipt {
                    folio,
                    confirmed_at: chrono::Utc::now(),
                    raw_banner: banner,
                }
            }
            None => {
                warn!("confirmation text present but no folio number found");
                Receipt::not_detected()
            }
        };

        Ok(receipt)
    }

    /// Best-effort payment-method selection. The selection widget varies
    /// per bank agreement and is incomplete in practice; failure here is
    /// logged and swallowed.
    async fn try_select_payment_method(&self, method: &str) {
        for selector in ["#medioPago", "select[name*='pago']", "select[id*='pago']"] {
            match dom::select_option_by_label(self.page, selector, method).await {
                Ok(true) => {
                    self.progress.info(format!("medio de pago seleccionado: {method}"));
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "payment-method selection errored");
                    return;
                }
            }
        }
        warn!(method, "payment-method selector not found, continuing without selection");
    }
}

/// Extract the folio number and its banner line from confirmation text.
fn parse_folio(text: &str) -> Option<(String, String)> {
    static FOLIO_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)folio[^0-9]{0,20}([0-9]{4,})").expect("valid regex"));

    let caps = FOLIO_RE.captures(text)?;
    let folio = caps[1].to_string();

    let banner = text
        .lines()
        .find(|line| line.to_lowercase().contains("folio"))
        .unwrap_or("")
        .trim()
        .to_string();

    Some((folio, banner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_folio_from_banner() {
        let text = "Comprobante de Declaración\nFolio N° 7654321\nFecha 07/08/2026";
        let (folio, banner) = parse_folio(text).expect("folio present");
        assert_eq!(folio, "7654321");
        assert!(banner.contains("Folio"));
    }

    #[test]
    fn test_parse_folio_with_colon() {
        let text = "Su declaración fue recibida. Folio: 123456";
        let (folio, _) = parse_folio(text).expect("folio present");
        assert_eq!(folio, "123456");
    }

    #[test]
    fn test_parse_folio_absent() {
        assert!(parse_folio("Declaración recibida, sin número").is_none());
        // Too short to be a folio
        assert!(parse_folio("Folio 12").is_none());
    }
}
