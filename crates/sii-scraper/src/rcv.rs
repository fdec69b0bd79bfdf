//! Purchase/sale registry (RCV) scraping.
//!
//! Distinct from tax-code extraction: this is a generic row-to-record
//! scrape of the registry's summary table, driven by the period selects
//! of the RCV single-page app.

use crate::error::{Result, ScraperError};
use chromiumoxide::Page;
use scraper::{Html, Selector};
use sii_browser::{dom, poll};
use sii_core::{parse_amount, Period, PendingInvoiceSummary, PortalConfig, ProgressReporter, RegistryRow};
use tracing::{debug, info};

/// Month select of the RCV app; the year lives in a sibling select.
const MONTH_SELECT: &str = "#periodoMes";

/// Scrapes the registry app on one session's page.
pub struct RegistryScraper<'a> {
    page: &'a Page,
    config: &'a PortalConfig,
    progress: &'a ProgressReporter,
}

impl<'a> RegistryScraper<'a> {
    #[must_use]
    pub fn new(page: &'a Page, config: &'a PortalConfig, progress: &'a ProgressReporter) -> Self {
        Self {
            page,
            config,
            progress,
        }
    }

    /// Navigate to the registry app and wait for its period controls.
    ///
    /// # Errors
    /// Returns error if navigation fails or the controls never appear.
    pub async fn open(&self) -> Result<()> {
        self.page
            .goto(self.config.registry_url.as_str())
            .await
            .map_err(|e| sii_browser::BrowserError::Navigation(e.to_string()))?;

        poll::wait_for_selector(self.page, MONTH_SELECT, self.config.form_timeout()).await?;
        debug!("registry app loaded");
        Ok(())
    }

    /// Select a period and run the query. Assumes [`open`](Self::open) ran
    /// on this page already (consolidation reuses the app across periods).
    ///
    /// # Errors
    /// Returns error if the period controls are missing or the result
    /// table never renders.
    pub async fn select_period(&self, period: Period) -> Result<()> {
        if !self.apply_period_selects(period).await? {
            return Err(ScraperError::Browser(
                sii_browser::BrowserError::SelectorNotFound(format!(
                    "period selects for {period}"
                )),
            ));
        }

        if !dom::click_visible_button(self.page, &["Consultar"]).await? {
            return Err(ScraperError::Browser(
                sii_browser::BrowserError::SelectorNotFound("Consultar button".to_string()),
            ));
        }

        let page = self.page;
        let rendered = poll::poll_until(
            poll::POLL_INTERVAL,
            self.config.form_timeout(),
            || async move {
                dom::element_exists(page, "table tbody tr")
                    .await
                    .unwrap_or(false)
            },
        )
        .await;

        if !rendered {
            return Err(ScraperError::Browser(sii_browser::BrowserError::timeout(
                format!("registry table for {period}"),
                self.config.form_timeout(),
            )));
        }

        self.progress.info(format!("periodo {period} consultado"));
        Ok(())
    }

    /// Scrape the summary table currently rendered.
    ///
    /// # Errors
    /// Returns error if the page content cannot be read.
    pub async fn scrape_rows(&self) -> Result<Vec<RegistryRow>> {
        let html = self
            .page
            .content()
            .await
            .map_err(|e| sii_browser::BrowserError::Chromium(e.to_string()))?;

        Ok(parse_registry_table(&html))
    }

    /// Full flow for one period: open, select, scrape.
    ///
    /// # Errors
    /// Returns error if any stage fails.
    pub async fn fetch_summary(&self, period: Period) -> Result<Vec<RegistryRow>> {
        self.open().await?;
        self.select_period(period).await?;
        let rows = self.scrape_rows().await?;
        info!(period = %period, rows = rows.len(), "registry summary extracted");
        Ok(rows)
    }

    /// Summarize registry entries not yet acknowledged by the taxpayer.
    ///
    /// The pending tab is optional UI: when absent the summary is empty,
    /// not an error.
    ///
    /// # Errors
    /// Returns error if the page content cannot be read.
    pub async fn fetch_pending(&self) -> Result<PendingInvoiceSummary> {
        let opened =
            dom::click_visible_button(self.page, &["Pendientes", "Pendientes de Aceptación"])
                .await?;

        if !opened {
            debug!("no pending tab in registry app");
            return Ok(PendingInvoiceSummary::from_rows(Vec::new()));
        }

        let page = self.page;
        poll::poll_until(poll::POLL_INTERVAL, self.config.probe_timeout(), || async move {
            dom::element_exists(page, "table tbody tr")
                .await
                .unwrap_or(false)
        })
        .await;

        let rows = self.scrape_rows().await?;
        let summary = PendingInvoiceSummary::from_rows(rows);

        if summary.count > 0 {
            self.progress.warn(format!(
                "{} documentos pendientes de aceptacion, IVA recuperable {}",
                summary.count, summary.recoverable_tax_total
            ));
        }

        Ok(summary)
    }

    /// Set the month and year selects for a period, firing the change
    /// events the SPA listens on. The year select has no stable id, so it
    /// is located as the sibling select offering the year as an option.
    async fn apply_period_selects(&self, period: Period) -> Result<bool> {
        let month_js = dom::js_string(&format!("{:02}", period.month));
        let year_js = dom::js_string(&period.year.to_string());

        let body = format!(
            "const month = {month_js};
            const year = {year_js};
            for (const doc of collectDocs()) {{
                const monthSelect = doc.querySelector('{MONTH_SELECT}');
                if (!monthSelect) continue;

                const selects = Array.from(doc.querySelectorAll('select'));
                const yearSelect = selects.find(sel =>
                    Array.from(sel.options).some(opt => opt.label.trim() === year));
                if (yearSelect) {{
                    const option = Array.from(yearSelect.options)
                        .find(opt => opt.label.trim() === year);
                    yearSelect.value = option.value;
                    yearSelect.dispatchEvent(new Event('change', {{ bubbles: true }}));
                }}

                const monthOption = Array.from(monthSelect.options)
                    .find(opt => opt.value === month || opt.value === String(Number(month)));
                if (!monthOption) return false;
                monthSelect.value = monthOption.value;
                monthSelect.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }}
            return false;"
        );

        Ok(dom::eval_json(self.page, dom::with_frame_walk(&body)).await?)
    }
}

/// Parse the registry summary table: one record per row with at least six
/// cells, amounts through the canonical cleanup rule.
#[must_use]
pub fn parse_registry_table(html: &str) -> Vec<RegistryRow> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("table tbody tr").expect("valid selector");
    let cell_selector = Selector::parse("td").expect("valid selector");

    let mut rows = Vec::new();

    for row in document.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() < 6 {
            continue;
        }

        let amount = |index: usize| {
            cells
                .get(index)
                .and_then(|text| parse_amount(text))
                .unwrap_or(0)
        };

        rows.push(RegistryRow {
            doc_type: cells[0].clone(),
            doc_count: amount(1),
            exempt_amount: amount(2),
            net_amount: amount(3),
            recoverable_tax: amount(4),
            total_amount: cells
                .last()
                .and_then(|text| parse_amount(text))
                .unwrap_or(0),
        });
    }

    rows
}
