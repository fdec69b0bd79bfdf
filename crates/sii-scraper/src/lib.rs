//! Navigation and extraction engine for the SII tax portal.
//!
//! The hard part of this workspace: drive the portal's modal-laden
//! declaration flow to the data-bearing form ([`nav`]), locate numeric
//! fields identified only by ambiguous on-screen labels ([`extract`]),
//! scrape the purchase/sale registry ([`rcv`]), consolidate a rolling
//! 12-month window ([`consolidate`]), submit declarations ([`submit`]),
//! and generate the carpeta tributaria PDF ([`folder`]). The
//! [`operations`] facade is what the external API layer calls.
//!
//! Navigation failure is a value, not an exception: see
//! [`nav::NavigationOutcome`].

pub mod consolidate;
pub mod error;
pub mod extract;
pub mod folder;
pub mod nav;
pub mod operations;
pub mod rcv;
pub mod submit;

pub use consolidate::{Consolidator, RegistryFetch};
pub use error::{Result, ScraperError};
pub use extract::FieldExtractor;
pub use folder::{TaxFolderGenerator, TaxFolderRequest};
pub use nav::{NavStep, NavigationOutcome, Navigator};
pub use operations::Operations;
pub use rcv::RegistryScraper;
pub use submit::SubmissionDriver;
