//! Shared domain types for the SII automation suite.
//!
//! Defines the tenant key ([`Rut`]), tax periods, the canonical
//! currency-cleanup rule, progress events, portal configuration, and the
//! report records produced by the scraper and consumed by the advisory
//! layer and the external API.

pub mod config;
pub mod error;
pub mod progress;
pub mod report;
pub mod types;

pub use config::PortalConfig;
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use progress::{ProgressEvent, ProgressLevel, ProgressReporter, ProgressSink};
pub use report::{
    ConsolidatedReport, ExtractionResult, PendingInvoiceSummary, PeriodEntry, Receipt, RegistryRow,
};
pub use types::{clean_amount, parse_amount, Period, Rut};
