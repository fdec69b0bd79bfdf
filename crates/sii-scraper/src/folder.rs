//! Carpeta tributaria (tax folder) PDF generation.
//!
//! Drives the portal's folder-generation wizard and captures the produced
//! PDF into a working directory. Retention of the artifact is the
//! caller's responsibility.

use crate::error::{Result, ScraperError};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use sii_browser::{dom, poll};
use sii_core::{PortalConfig, ProgressReporter, Rut};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Destination data for the generated folder.
#[derive(Debug, Clone)]
pub struct TaxFolderRequest {
    /// RUT of the folder's recipient
    pub dest_rut: Rut,
    /// Recipient e-mail, entered twice as the form demands
    pub dest_email: String,
    /// Receiving institution label; the wizard's generic option when None
    pub dest_institution: Option<String>,
}

/// Drives the folder wizard on one session's page.
pub struct TaxFolderGenerator<'a> {
    page: &'a Page,
    config: &'a PortalConfig,
    progress: &'a ProgressReporter,
}

impl<'a> TaxFolderGenerator<'a> {
    #[must_use]
    pub fn new(page: &'a Page, config: &'a PortalConfig, progress: &'a ProgressReporter) -> Self {
        Self {
            page,
            config,
            progress,
        }
    }

    /// Generate the folder PDF into `output_dir`, returning its path.
    ///
    /// # Errors
    /// Returns error if the wizard cannot be driven or the download never
    /// lands in the directory within the bounded wait.
    pub async fn generate(
        &self,
        request: &TaxFolderRequest,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        self.page
            .goto(self.config.folder_url.as_str())
            .await
            .map_err(|e| sii_browser::BrowserError::Navigation(e.to_string()))?;

        self.progress.info("iniciando generacion de carpeta");
        dom::click_visible_button(self.page, &["Continuar"]).await?;

        self.fill_destination(request).await?;

        // The wizard disables Continuar until its own validation ran;
        // force-enable like the portal's own retry path does.
        let forced = dom::eval_json::<bool>(
            self.page,
            dom::with_frame_walk(
                "for (const doc of collectDocs()) {
                    const button = Array.from(doc.querySelectorAll('button'))
                        .find(el => (el.innerText || '').includes('Continuar'));
                    if (button) { button.disabled = false; button.click(); return true; }
                }
                return false;",
            ),
        )
        .await?;
        if !forced {
            return Err(ScraperError::Browser(
                sii_browser::BrowserError::SelectorNotFound("wizard Continuar".to_string()),
            ));
        }

        // Confirmation modal.
        if poll::wait_for_visible_text(self.page, &["Aceptar"], self.config.probe_timeout()).await
        {
            dom::click_visible_button(self.page, &["Aceptar"]).await?;
        }

        self.allow_downloads_into(output_dir).await?;

        let started = SystemTime::now();
        let clicked = dom::click_visible_button(
            self.page,
            &["Ver PDF Generado", "Generar Carpeta", "PDF"],
        )
        .await?;
        if !clicked {
            // The generation button can take a while to materialize.
            let page = self.page;
            let appeared = poll::poll_until(
                poll::POLL_INTERVAL,
                self.config.form_timeout(),
                || async move {
                    dom::click_visible_button(
                        page,
                        &["Ver PDF Generado", "Generar Carpeta", "PDF"],
                    )
                    .await
                    .unwrap_or(false)
                },
            )
            .await;
            if !appeared {
                return Err(ScraperError::Browser(
                    sii_browser::BrowserError::SelectorNotFound(
                        "folder download button".to_string(),
                    ),
                ));
            }
        }

        self.progress.info("descargando carpeta tributaria");
        let downloaded = poll::poll_until(
            poll::POLL_INTERVAL,
            self.config.form_timeout(),
            || async move { find_new_pdf(output_dir, started).is_some() },
        )
        .await;

        if !downloaded {
            dom::capture_diagnostic(self.page, &self.config.artifact_dir, "folder_no_download")
                .await;
            return Err(ScraperError::DocumentNotProduced(format!(
                "no PDF appeared under {}",
                output_dir.display()
            )));
        }

        let path = find_new_pdf(output_dir, started)
            .ok_or_else(|| ScraperError::DocumentNotProduced("download vanished".to_string()))?;

        info!(path = %path.display(), "tax folder generated");
        self.progress.info(format!("carpeta generada: {}", path.display()));
        Ok(path)
    }

    /// Fill the destination form, waiting out the RUT autocomplete.
    async fn fill_destination(&self, request: &TaxFolderRequest) -> Result<()> {
        let rut_selector = "input[placeholder*='12.345.678-9']";
        poll::wait_for_selector(self.page, rut_selector, self.config.form_timeout()).await?;

        dom::set_input_value(self.page, rut_selector, request.dest_rut.as_str()).await?;

        // The wizard autocompletes the recipient name from the RUT; wait
        // until it did before touching the rest of the form.
        let page = self.page;
        let autocompleted = poll::poll_until(
            poll::POLL_INTERVAL,
            self.config.probe_timeout(),
            || async move {
                dom::eval_json::<bool>(
                    page,
                    dom::with_frame_walk(
                        "for (const doc of collectDocs()) {
                            const input = doc.querySelector(\"input[placeholder*='Ingresa Nombre']\");
                            if (input && input.value !== '') return true;
                        }
                        return false;",
                    ),
                )
                .await
                .unwrap_or(false)
            },
        )
        .await;
        if !autocompleted {
            debug!("recipient name did not autocomplete, continuing anyway");
        }

        dom::set_input_value(
            self.page,
            "input[placeholder*='Ingrese correo']",
            &request.dest_email,
        )
        .await?;
        dom::set_input_value(
            self.page,
            "input[placeholder*='Repite el correo']",
            &request.dest_email,
        )
        .await?;

        if let Some(institution) = &request.dest_institution {
            dom::select_option_by_label(self.page, "select", institution).await?;
        } else {
            // First non-placeholder option
            dom::eval_json::<bool>(
                self.page,
                dom::with_frame_walk(
                    "for (const doc of collectDocs()) {
                        const select = doc.querySelector('select');
                        if (select && select.options.length > 1) {
                            select.selectedIndex = 1;
                            select.dispatchEvent(new Event('change', { bubbles: true }));
                            return true;
                        }
                    }
                    return false;",
                ),
            )
            .await?;
        }

        // Authorization checkbox is the last one on the form.
        dom::eval_json::<bool>(
            self.page,
            dom::with_frame_walk(
                "for (const doc of collectDocs()) {
                    const boxes = doc.querySelectorAll('input[type=\"checkbox\"]');
                    if (boxes.length > 0) { boxes[boxes.length - 1].click(); return true; }
                }
                return false;",
            ),
        )
        .await?;

        Ok(())
    }

    /// Route downloads of this page into the output directory.
    async fn allow_downloads_into(&self, dir: &Path) -> Result<()> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(sii_browser::BrowserError::Chromium)?;

        self.page
            .execute(params)
            .await
            .map_err(|e| sii_browser::BrowserError::Chromium(e.to_string()))?;

        Ok(())
    }
}

/// A PDF that appeared in `dir` at or after `since`, newest first.
fn find_new_pdf(dir: &Path, since: SystemTime) -> Option<PathBuf> {
    let mut candidates: Vec<(SystemTime, PathBuf)> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pdf") {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            (modified >= since).then_some((modified, path))
        })
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().map(|(_, path)| path).next()
}
