//! Navigation orchestrator for the declaration flow.
//!
//! A state machine over a best-effort UI, not a guaranteed protocol: the
//! portal injects or skips modals depending on account state, so every
//! optional step is probed with a short bounded wait and absence simply
//! advances the machine. Any unexpected failure is converted into
//! [`NavigationOutcome::Failed`] with a diagnostic screenshot — no
//! exception crosses this boundary.

use crate::extract::FieldExtractor;
use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use sii_browser::{dom, poll, BrowserEngine};
use sii_codes::CodeSet;
use sii_core::{ExtractionResult, Period, PortalConfig, ProgressReporter};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Steps of the declaration flow, in machine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStep {
    Home,
    DeclarationsTab,
    F29Section,
    PeriodRow,
    ActivityModal,
    FormLoaded,
    ProposalAccepted,
    AssistantsSkipped,
    AdditionalInfoConfirmed,
    AttentionModalClosed,
    FullFormLoaded,
    DataScrolled,
    Extracted,
}

impl NavStep {
    /// Stable name used in progress lines and screenshot tags.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::DeclarationsTab => "declarations-tab",
            Self::F29Section => "f29-section",
            Self::PeriodRow => "period-row",
            Self::ActivityModal => "activity-modal",
            Self::FormLoaded => "form-loaded",
            Self::ProposalAccepted => "proposal-accepted",
            Self::AssistantsSkipped => "assistants-skipped",
            Self::AdditionalInfoConfirmed => "additional-info",
            Self::AttentionModalClosed => "attention-modal",
            Self::FullFormLoaded => "full-form",
            Self::DataScrolled => "data-scrolled",
            Self::Extracted => "extracted",
        }
    }
}

/// Result of one navigation run. Callers check the variant; nothing at
/// this boundary is signaled through `Err`.
#[derive(Debug)]
pub enum NavigationOutcome {
    /// The form was reached and extracted.
    Extracted(ExtractionResult),
    /// No row carried a pending marker: nothing to do, not a failure.
    NoPendingPeriod,
    /// A step failed; a diagnostic screenshot was captured when possible.
    Failed {
        step: NavStep,
        screenshot: Option<PathBuf>,
    },
}

impl NavigationOutcome {
    /// Whether the run produced data.
    #[must_use]
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }
}

/// Row text snapshot used for period selection.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct RowText {
    pub index: usize,
    pub text: String,
}

/// Marker the portal places on not-yet-declared periods.
const PENDING_MARKER: &str = "Pendiente";

/// Terms known to be present once the full form actually rendered.
const FORM_READY_TERMS: &[&str] = &["Débito Fiscal", "IVA determinado", "Total a pagar", "[91]"];

/// Drives the declaration flow on one session's page.
pub struct Navigator<'a> {
    engine: &'a BrowserEngine,
    page: &'a Page,
    config: &'a PortalConfig,
    codes: &'a CodeSet,
    progress: &'a ProgressReporter,
}

impl<'a> Navigator<'a> {
    #[must_use]
    pub fn new(
        engine: &'a BrowserEngine,
        page: &'a Page,
        config: &'a PortalConfig,
        codes: &'a CodeSet,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            engine,
            page,
            config,
            codes,
            progress,
        }
    }

    /// Run the machine to extraction.
    ///
    /// Failures are absorbed into [`NavigationOutcome::Failed`]; the only
    /// panics-to-errors conversion the caller needs is checking the
    /// returned variant.
    pub async fn run(&self, period: Option<Period>) -> NavigationOutcome {
        let mut step = NavStep::Home;

        match self.drive(period, &mut step).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(step = step.name(), error = %e, "navigation failed");
                self.progress
                    .error(format!("navegacion fallida en paso {}", step.name()));
                let screenshot = dom::capture_diagnostic(
                    self.page,
                    &self.config.artifact_dir,
                    &format!("nav_{}", step.name()),
                )
                .await;
                NavigationOutcome::Failed { step, screenshot }
            }
        }
    }

    async fn drive(
        &self,
        period: Option<Period>,
        step: &mut NavStep,
    ) -> sii_browser::Result<NavigationOutcome> {
        let probe_budget = self.config.probe_timeout();

        // Home. The session lands here after login; re-navigate in case a
        // previous operation moved the page elsewhere.
        *step = NavStep::Home;
        self.page
            .goto(self.config.home_url.as_str())
            .await
            .map_err(|e| sii_browser::BrowserError::Navigation(e.to_string()))?;
        poll::wait_for_visible_text(self.page, &["Responsabilidades Tributarias"], probe_budget)
            .await;
        self.progress.info("portal home cargado");

        // Declarations tab and F29 section are both optional hops: some
        // account states land directly on the proposal app.
        *step = NavStep::DeclarationsTab;
        if dom::click_visible_button(self.page, &["Declaraciones"]).await? {
            debug!("declarations tab clicked");
        }

        *step = NavStep::F29Section;
        self.page
            .goto(self.config.proposal_url.as_str())
            .await
            .map_err(|e| sii_browser::BrowserError::Navigation(e.to_string()))?;
        poll::wait_for_visible_text(
            self.page,
            &[PENDING_MARKER, "Periodo", "Propuesta"],
            self.config.form_timeout(),
        )
        .await;

        // Period row.
        *step = NavStep::PeriodRow;
        let rows = self.list_rows().await?;
        let Some(selected) = select_pending_row(&rows, period) else {
            info!("no pending period row found");
            self.progress.info("sin periodos pendientes");
            return Ok(NavigationOutcome::NoPendingPeriod);
        };

        let row = &rows[selected];
        let period_label = period
            .map(|p| p.label())
            .or_else(|| parse_period_from_text(&row.text).map(|p| p.label()))
            .unwrap_or_else(|| "desconocido".to_string());
        self.progress
            .info(format!("periodo pendiente localizado: {period_label}"));

        if !self.click_row_action(row.index).await? {
            return Err(sii_browser::BrowserError::SelectorNotFound(format!(
                "action control in period row {}",
                row.index
            )));
        }

        // First-time activity selection only appears for some periods.
        *step = NavStep::ActivityModal;
        if poll::wait_for_visible_text(self.page, &["actividad económica"], probe_budget).await {
            dom::click_element(self.page, "input[type=radio]").await?;
            dom::click_visible_button(self.page, &["Continuar"]).await?;
            debug!("activity modal handled");
        }

        *step = NavStep::FormLoaded;
        poll::wait_for_visible_text(
            self.page,
            &["Propuesta", "Formulario 29"],
            self.config.form_timeout(),
        )
        .await;
        self.progress.info("formulario inicial cargado");

        // Optional modal ladder. Each probe is bounded and absence just
        // advances the machine.
        *step = NavStep::ProposalAccepted;
        if dom::click_visible_button(self.page, &["Aceptar Propuesta", "Aceptar"]).await? {
            debug!("proposal accepted");
        }

        *step = NavStep::AssistantsSkipped;
        if dom::click_visible_button(
            self.page,
            &["Continuar sin asistente", "No utilizar asistente", "Continuar"],
        )
        .await?
        {
            debug!("calculation assistants skipped");
        }

        *step = NavStep::AdditionalInfoConfirmed;
        if dom::click_visible_button(self.page, &["Confirmar"]).await? {
            debug!("additional info confirmed");
        }

        *step = NavStep::AttentionModalClosed;
        if poll::wait_for_visible_text(self.page, &["Atención"], probe_budget).await {
            dom::click_visible_button(self.page, &["Cerrar", "Entendido", "Aceptar"]).await?;
            debug!("attention modal closed");
        }

        // The form may render in this page, a frame, or a fresh tab; do
        // not guess — wait until some frame of some page carries known
        // terms, under one cumulative budget.
        *step = NavStep::FullFormLoaded;
        let pages = self.all_pages().await;
        let ready = poll::poll_until(poll::POLL_INTERVAL, self.config.form_timeout(), || {
            let pages = &pages;
            async move {
                for page in pages.iter() {
                    if dom::text_present(page, FORM_READY_TERMS).await.unwrap_or(false) {
                        return true;
                    }
                }
                false
            }
        })
        .await;
        if !ready {
            return Err(sii_browser::BrowserError::timeout(
                "declaration form content",
                self.config.form_timeout(),
            ));
        }
        self.progress.info("formulario completo cargado");

        *step = NavStep::DataScrolled;
        for page in &pages {
            dom::scroll_to_bottom(page).await.ok();
        }

        *step = NavStep::Extracted;
        let page_refs: Vec<&Page> = pages.iter().collect();
        let (values, missing) =
            FieldExtractor::extract_set(&page_refs, self.codes, self.progress).await;

        let source_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let total_due = self.codes.total_due_code.as_deref().unwrap_or("91");
        let result =
            ExtractionResult::new(period_label, source_url, values, missing, total_due);

        self.progress.info(format!(
            "extraccion completa: pago requerido = {}",
            result.payment_required
        ));
        Ok(NavigationOutcome::Extracted(result))
    }

    /// Snapshot the text of every table row across frames.
    async fn list_rows(&self) -> sii_browser::Result<Vec<RowText>> {
        let body = "
            let index = 0;
            const rows = [];
            for (const doc of collectDocs()) {
                for (const row of Array.from(doc.querySelectorAll('tr'))) {
                    rows.push({
                        index: index,
                        text: (row.innerText || '').replace(/\\s+/g, ' ').trim(),
                    });
                    index += 1;
                }
            }
            return rows;";
        dom::eval_json(self.page, dom::with_frame_walk(body)).await
    }

    /// Click the action control inside the row at the snapshot index, or
    /// the row itself when it carries no control.
    async fn click_row_action(&self, index: usize) -> sii_browser::Result<bool> {
        let body = format!(
            "const target = {index};
            let index = 0;
            for (const doc of collectDocs()) {{
                for (const row of Array.from(doc.querySelectorAll('tr'))) {{
                    if (index === target) {{
                        const control = Array.from(row.querySelectorAll('button, a'))
                            .find(el => el.offsetParent !== null);
                        (control || row).click();
                        return true;
                    }}
                    index += 1;
                }}
            }}
            return false;"
        );
        dom::eval_json(self.page, dom::with_frame_walk(&body)).await
    }

    /// The session page plus any tab the flow opened.
    async fn all_pages(&self) -> Vec<Page> {
        match self.engine.pages().await {
            Ok(pages) if !pages.is_empty() => pages,
            _ => vec![self.page.clone()],
        }
    }
}

/// Select the row to declare: an explicit period must match the row text
/// AND carry the pending marker; otherwise the first pending row is the
/// most urgent open obligation.
pub(crate) fn select_pending_row(rows: &[RowText], period: Option<Period>) -> Option<usize> {
    rows.iter()
        .filter(|row| row.text.contains(PENDING_MARKER))
        .find(|row| match period {
            Some(period) => row_matches_period(&row.text, period),
            None => true,
        })
        .map(|row| row.index)
}

/// Spanish month names as the portal prints them.
const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn row_matches_period(text: &str, period: Period) -> bool {
    let lower = text.to_lowercase();
    let year = period.year.to_string();

    let by_name = MONTH_NAMES
        .get(period.month as usize - 1)
        .is_some_and(|name| lower.contains(name) && lower.contains(&year));
    let by_numeric = lower.contains(&format!("{:02}/{year}", period.month))
        || lower.contains(&format!("{year}-{:02}", period.month));

    by_name || by_numeric
}

/// Best-effort period parse from a row's text (`"Julio 2025 Pendiente"`,
/// `"07/2025"`).
pub(crate) fn parse_period_from_text(text: &str) -> Option<Period> {
    static NAME_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\s+(\d{4})",
        )
        .expect("valid regex")
    });
    static NUMERIC_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{4})\b").expect("valid regex"));

    if let Some(caps) = NAME_RE.captures(text) {
        let name = caps[1].to_lowercase();
        let month = MONTH_NAMES.iter().position(|m| *m == name)? as u32 + 1;
        let year: i32 = caps[2].parse().ok()?;
        return Period::new(year, month).ok();
    }

    if let Some(caps) = NUMERIC_RE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return Period::new(year, month).ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, text: &str) -> RowText {
        RowText {
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_select_first_pending_row_without_period() {
        let rows = vec![
            row(0, "Periodo Estado Accion"),
            row(1, "Junio 2025 Declarada"),
            row(2, "Julio 2025 Pendiente Declarar"),
            row(3, "Agosto 2025 Pendiente Declarar"),
        ];

        assert_eq!(select_pending_row(&rows, None), Some(2));
    }

    #[test]
    fn test_select_explicit_period_requires_pending_marker() {
        let rows = vec![
            row(0, "Junio 2025 Declarada"),
            row(1, "Julio 2025 Pendiente Declarar"),
        ];

        let june = Period::new(2025, 6).expect("valid period");
        let july = Period::new(2025, 7).expect("valid period");

        // June exists but is already declared: no match.
        assert_eq!(select_pending_row(&rows, Some(june)), None);
        assert_eq!(select_pending_row(&rows, Some(july)), Some(1));
    }

    #[test]
    fn test_select_no_rows_is_none() {
        assert_eq!(select_pending_row(&[], None), None);

        let rows = vec![row(0, "Junio 2025 Declarada")];
        assert_eq!(select_pending_row(&rows, None), None);
    }

    #[test]
    fn test_row_matches_numeric_period() {
        let period = Period::new(2025, 7).expect("valid period");
        assert!(row_matches_period("07/2025 Pendiente", period));
        assert!(row_matches_period("2025-07 Pendiente", period));
        assert!(!row_matches_period("06/2025 Pendiente", period));
    }

    #[test]
    fn test_parse_period_from_text() {
        assert_eq!(
            parse_period_from_text("Julio 2025 Pendiente"),
            Some(Period::new(2025, 7).expect("valid"))
        );
        assert_eq!(
            parse_period_from_text("periodo 12/2024 vencido"),
            Some(Period::new(2024, 12).expect("valid"))
        );
        assert_eq!(parse_period_from_text("sin periodo"), None);
    }

    #[test]
    fn test_step_names_are_stable() {
        assert_eq!(NavStep::Home.name(), "home");
        assert_eq!(NavStep::ActivityModal.name(), "activity-modal");
        assert_eq!(NavStep::FullFormLoaded.name(), "full-form");
    }

    #[test]
    fn test_outcome_is_extracted() {
        assert!(!NavigationOutcome::NoPendingPeriod.is_extracted());
        assert!(!NavigationOutcome::Failed {
            step: NavStep::Home,
            screenshot: None
        }
        .is_extracted());
    }
}
