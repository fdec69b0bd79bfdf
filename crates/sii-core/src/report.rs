//! Report records returned by the scraping operations.
//!
//! These are plain data: created fresh per run, immutable once returned,
//! and serialized as-is across the API boundary.

use crate::types::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Folio value used when the confirmation marker never appeared.
pub const FOLIO_NOT_DETECTED: &str = "NOT_DETECTED";

/// Values extracted from a declaration form, keyed by tax code.
///
/// Codes that could not be located resolve to `0` and are listed in
/// `missing` so the gap is visible to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Period label (`YYYY-MM`) the form belongs to
    pub period: String,
    /// URL of the page the values were read from
    pub source_url: String,
    /// Tax code -> extracted integer value
    pub values: BTreeMap<String, i64>,
    /// Codes that resolved to the not-found sentinel
    pub missing: Vec<String>,
    /// Whether the designated total-due code carries a positive amount
    pub payment_required: bool,
    /// Amount at the designated total-due code
    pub amount_due: i64,
}

impl ExtractionResult {
    /// Assemble a result, deriving `payment_required` and `amount_due`
    /// from the designated total-due code.
    #[must_use]
    pub fn new(
        period: String,
        source_url: String,
        values: BTreeMap<String, i64>,
        missing: Vec<String>,
        total_due_code: &str,
    ) -> Self {
        let amount_due = values.get(total_due_code).copied().unwrap_or(0);
        Self {
            period,
            source_url,
            values,
            missing,
            payment_required: amount_due > 0,
            amount_due,
        }
    }

    /// Value at a code, `0` when absent.
    #[must_use]
    pub fn value(&self, code: &str) -> i64 {
        self.values.get(code).copied().unwrap_or(0)
    }
}

/// One row of the purchase/sale registry summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRow {
    /// Document type as shown in the first column
    pub doc_type: String,
    /// Number of documents of this type
    pub doc_count: i64,
    /// Exempt amount
    pub exempt_amount: i64,
    /// Net amount
    pub net_amount: i64,
    /// Recoverable tax (IVA) amount
    pub recoverable_tax: i64,
    /// Total amount (last column)
    pub total_amount: i64,
}

/// Registry entries not yet acknowledged by the taxpayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvoiceSummary {
    /// Number of pending entries
    pub count: usize,
    /// Sum of recoverable tax across pending entries
    pub recoverable_tax_total: i64,
    /// The itemized pending rows
    pub items: Vec<RegistryRow>,
}

impl PendingInvoiceSummary {
    /// Summarize a set of pending registry rows.
    #[must_use]
    pub fn from_rows(items: Vec<RegistryRow>) -> Self {
        let recoverable_tax_total = items.iter().map(|row| row.recoverable_tax).sum();
        Self {
            count: items.len(),
            recoverable_tax_total,
            items,
        }
    }
}

/// One period's entry in a consolidated report: rows on success, an error
/// string on failure, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodEntry {
    /// Period label (`YYYY-MM`)
    pub period: String,
    /// Registry rows, present when the period scraped cleanly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RegistryRow>>,
    /// Error description, present when the period failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PeriodEntry {
    /// A successful period entry.
    #[must_use]
    pub fn rows(period: Period, rows: Vec<RegistryRow>) -> Self {
        Self {
            period: period.label(),
            rows: Some(rows),
            error: None,
        }
    }

    /// A failed period entry.
    #[must_use]
    pub fn error(period: Period, error: impl Into<String>) -> Self {
        Self {
            period: period.label(),
            rows: None,
            error: Some(error.into()),
        }
    }

    /// Whether this entry carries an error instead of data.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Rolling 12-month registry report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    /// Tenant key the report belongs to
    pub rut: String,
    /// When the extraction ran
    pub extracted_at: DateTime<Utc>,
    /// One entry per attempted period, in chronological order
    pub periods: Vec<PeriodEntry>,
}

impl ConsolidatedReport {
    /// Number of periods that failed.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.periods.iter().filter(|entry| entry.is_error()).count()
    }
}

/// Confirmation receipt scraped after submitting a declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Folio/receipt identifier, or [`FOLIO_NOT_DETECTED`]
    pub folio: String,
    /// When the confirmation was observed
    pub confirmed_at: DateTime<Utc>,
    /// Raw confirmation banner text, for post-mortems
    pub raw_banner: String,
}

impl Receipt {
    /// Receipt for a submission whose confirmation marker never appeared.
    #[must_use]
    pub fn not_detected() -> Self {
        Self {
            folio: FOLIO_NOT_DETECTED.to_string(),
            confirmed_at: Utc::now(),
            raw_banner: String::new(),
        }
    }

    /// Whether a folio was actually observed.
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.folio != FOLIO_NOT_DETECTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs
            .iter()
            .map(|(code, value)| ((*code).to_string(), *value))
            .collect()
    }

    #[test]
    fn test_payment_required_when_total_positive() {
        let result = ExtractionResult::new(
            "2025-07".to_string(),
            "https://www4.sii.cl/rfiInternet/".to_string(),
            values(&[("91", 15_000), ("538", 120_000)]),
            vec![],
            "91",
        );

        assert!(result.payment_required);
        assert_eq!(result.amount_due, 15_000);
    }

    #[test]
    fn test_payment_not_required_when_total_zero() {
        let result = ExtractionResult::new(
            "2025-07".to_string(),
            String::new(),
            values(&[("91", 0)]),
            vec![],
            "91",
        );

        assert!(!result.payment_required);
        assert_eq!(result.amount_due, 0);
    }

    #[test]
    fn test_payment_not_required_when_total_missing() {
        let result = ExtractionResult::new(
            "2025-07".to_string(),
            String::new(),
            values(&[("538", 100)]),
            vec!["91".to_string()],
            "91",
        );

        assert!(!result.payment_required);
        assert_eq!(result.value("91"), 0);
    }

    #[test]
    fn test_pending_invoice_summary_totals() {
        let row = |tax| RegistryRow {
            doc_type: "Factura Electronica".to_string(),
            doc_count: 1,
            exempt_amount: 0,
            net_amount: 100,
            recoverable_tax: tax,
            total_amount: 100 + tax,
        };

        let summary = PendingInvoiceSummary::from_rows(vec![row(19_000), row(3_800)]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.recoverable_tax_total, 22_800);
    }

    #[test]
    fn test_period_entry_serialization_omits_absent_side() {
        let period = Period::new(2025, 3).expect("valid period");

        let ok = PeriodEntry::rows(period, vec![]);
        let json = serde_json::to_string(&ok).expect("serialize");
        assert!(!json.contains("error"));

        let failed = PeriodEntry::error(period, "timeout");
        let json = serde_json::to_string(&failed).expect("serialize");
        assert!(!json.contains("rows"));
        assert!(json.contains("timeout"));
    }

    #[test]
    fn test_receipt_not_detected() {
        let receipt = Receipt::not_detected();
        assert!(!receipt.is_detected());
        assert_eq!(receipt.folio, FOLIO_NOT_DETECTED);
    }
}
