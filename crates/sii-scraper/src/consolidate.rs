//! Rolling 12-month registry consolidation.
//!
//! Re-selects each period in the same session (no re-login) and merges
//! the per-period results. A failed period is recorded and never aborts
//! the loop; each period is attempted exactly once per run — this is the
//! one place idempotent retry is deliberately not performed.

use crate::error::Result;
use crate::rcv::RegistryScraper;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sii_core::{ConsolidatedReport, Period, PeriodEntry, ProgressReporter, RegistryRow, Rut};
use tracing::{info, warn};

/// Number of periods in the rolling window.
pub const WINDOW_LEN: usize = 12;

/// Seam for fetching one period's registry rows, so the loop's semantics
/// are testable without a browser.
#[async_trait]
pub trait RegistryFetch {
    /// Fetch the registry summary for one period.
    async fn fetch(&mut self, period: Period) -> Result<Vec<RegistryRow>>;
}

/// Browser-backed fetcher: drives the registry app on a live page.
pub struct PageRegistryFetch<'a> {
    scraper: RegistryScraper<'a>,
    opened: bool,
}

impl<'a> PageRegistryFetch<'a> {
    #[must_use]
    pub fn new(scraper: RegistryScraper<'a>) -> Self {
        Self {
            scraper,
            opened: false,
        }
    }
}

#[async_trait]
impl RegistryFetch for PageRegistryFetch<'_> {
    async fn fetch(&mut self, period: Period) -> Result<Vec<RegistryRow>> {
        if !self.opened {
            self.scraper.open().await?;
            self.opened = true;
        }
        self.scraper.select_period(period).await?;
        self.scraper.scrape_rows().await
    }
}

/// Runs the 12-period loop over any fetcher.
pub struct Consolidator;

impl Consolidator {
    /// Consolidate the 12 calendar periods ending at `anchor`.
    ///
    /// Always returns a report with exactly [`WINDOW_LEN`] entries, in
    /// chronological order; entries carry either rows or an error.
    pub async fn consolidate<F>(
        rut: &Rut,
        fetcher: &mut F,
        anchor: NaiveDate,
        progress: &ProgressReporter,
    ) -> ConsolidatedReport
    where
        F: RegistryFetch + Send,
    {
        let periods = Period::window_ending(anchor, WINDOW_LEN);
        let mut entries = Vec::with_capacity(periods.len());

        for (position, period) in periods.iter().enumerate() {
            progress.info(format!(
                "({}/{}) procesando periodo {period}",
                position + 1,
                periods.len()
            ));

            match fetcher.fetch(*period).await {
                Ok(rows) => {
                    info!(period = %period, rows = rows.len(), "period consolidated");
                    entries.push(PeriodEntry::rows(*period, rows));
                }
                Err(e) => {
                    warn!(period = %period, error = %e, "period failed, continuing");
                    progress.warn(format!("periodo {period} fallido: {e}"));
                    entries.push(PeriodEntry::error(*period, e.to_string()));
                }
            }
        }

        ConsolidatedReport {
            rut: rut.to_string(),
            extracted_at: Utc::now(),
            periods: entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;

    struct ScriptedFetch {
        /// 0-based positions (chronological) that fail
        failing: Vec<usize>,
        calls: Vec<Period>,
    }

    #[async_trait]
    impl RegistryFetch for ScriptedFetch {
        async fn fetch(&mut self, period: Period) -> Result<Vec<RegistryRow>> {
            let position = self.calls.len();
            self.calls.push(period);

            if self.failing.contains(&position) {
                Err(ScraperError::Parse(format!("scripted failure at {period}")))
            } else {
                Ok(vec![RegistryRow {
                    doc_type: "Factura Electronica".to_string(),
                    doc_count: 1,
                    exempt_amount: 0,
                    net_amount: 1000,
                    recoverable_tax: 190,
                    total_amount: 1190,
                }])
            }
        }
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date")
    }

    fn rut() -> Rut {
        Rut::new("12.345.678-9").expect("valid RUT")
    }

    #[tokio::test]
    async fn test_consolidator_never_aborts_early() {
        let mut fetcher = ScriptedFetch {
            failing: vec![3, 7],
            calls: Vec::new(),
        };

        let report = Consolidator::consolidate(
            &rut(),
            &mut fetcher,
            anchor(),
            &ProgressReporter::disabled(),
        )
        .await;

        // Exactly 12 entries, all periods attempted exactly once.
        assert_eq!(report.periods.len(), 12);
        assert_eq!(fetcher.calls.len(), 12);
        assert_eq!(report.error_count(), 2);

        assert!(report.periods[3].is_error());
        assert!(report.periods[7].is_error());
        for (position, entry) in report.periods.iter().enumerate() {
            if position != 3 && position != 7 {
                assert!(entry.rows.is_some(), "entry {position} should carry rows");
            }
        }
    }

    #[tokio::test]
    async fn test_window_is_chronological_with_year_rollover() {
        let mut fetcher = ScriptedFetch {
            failing: vec![],
            calls: Vec::new(),
        };

        let report = Consolidator::consolidate(
            &rut(),
            &mut fetcher,
            anchor(),
            &ProgressReporter::disabled(),
        )
        .await;

        let labels: Vec<&str> = report
            .periods
            .iter()
            .map(|entry| entry.period.as_str())
            .collect();

        assert_eq!(labels.first(), Some(&"2025-02"));
        assert_eq!(labels.last(), Some(&"2026-01"));
        assert!(labels.contains(&"2025-12"));
    }

    #[tokio::test]
    async fn test_all_periods_failing_still_returns_full_report() {
        let mut fetcher = ScriptedFetch {
            failing: (0..12).collect(),
            calls: Vec::new(),
        };

        let report = Consolidator::consolidate(
            &rut(),
            &mut fetcher,
            anchor(),
            &ProgressReporter::disabled(),
        )
        .await;

        assert_eq!(report.periods.len(), 12);
        assert_eq!(report.error_count(), 12);
    }
}
