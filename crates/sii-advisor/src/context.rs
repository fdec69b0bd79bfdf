//! The structured record handed to the advisory endpoint.

use serde::{Deserialize, Serialize};
use sii_core::{ExtractionResult, PendingInvoiceSummary};
use std::collections::BTreeMap;

/// Everything the advisor sees about one extraction run.
///
/// Scoped per tenant key and replaced on every new run; never persisted
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryContext {
    /// Tenant key the data belongs to
    pub rut: String,
    /// Period label (`YYYY-MM`)
    pub period: String,
    /// Tax code -> extracted value
    pub values: BTreeMap<String, i64>,
    /// Codes that resolved to the not-found sentinel
    pub missing: Vec<String>,
    /// Whether the declaration requires a payment
    pub payment_required: bool,
    /// Amount due at the designated total code
    pub amount_due: i64,
    /// Registry entries pending acknowledgment, when scraped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_invoices: Option<PendingInvoiceSummary>,
}

impl AdvisoryContext {
    /// Assemble the context from an extraction run and the optional
    /// pending-invoice summary.
    #[must_use]
    pub fn new(
        rut: impl Into<String>,
        extraction: &ExtractionResult,
        pending_invoices: Option<PendingInvoiceSummary>,
    ) -> Self {
        Self {
            rut: rut.into(),
            period: extraction.period.clone(),
            values: extraction.values.clone(),
            missing: extraction.missing.clone(),
            payment_required: extraction.payment_required,
            amount_due: extraction.amount_due,
            pending_invoices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sii_core::RegistryRow;

    fn extraction() -> ExtractionResult {
        let values: BTreeMap<String, i64> =
            [("91".to_string(), 15_000), ("538".to_string(), 120_000)]
                .into_iter()
                .collect();
        ExtractionResult::new(
            "2025-07".to_string(),
            "https://www4.sii.cl/rfiInternet/".to_string(),
            values,
            vec!["504".to_string()],
            "91",
        )
    }

    #[test]
    fn test_context_mirrors_extraction() {
        let context = AdvisoryContext::new("123456789", &extraction(), None);

        assert_eq!(context.period, "2025-07");
        assert_eq!(context.values.get("91"), Some(&15_000));
        assert!(context.payment_required);
        assert_eq!(context.missing, vec!["504".to_string()]);
    }

    #[test]
    fn test_context_serialization_omits_absent_pending() {
        let context = AdvisoryContext::new("123456789", &extraction(), None);
        let json = serde_json::to_string(&context).expect("serialize");
        assert!(!json.contains("pending_invoices"));

        let pending = PendingInvoiceSummary::from_rows(vec![RegistryRow {
            doc_type: "Factura Electronica".to_string(),
            doc_count: 1,
            exempt_amount: 0,
            net_amount: 100_000,
            recoverable_tax: 19_000,
            total_amount: 119_000,
        }]);
        let context = AdvisoryContext::new("123456789", &extraction(), Some(pending));
        let json = serde_json::to_string(&context).expect("serialize");
        assert!(json.contains("pending_invoices"));
        assert!(json.contains("19000"));
    }
}
