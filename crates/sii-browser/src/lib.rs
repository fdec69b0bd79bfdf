//! Browser automation engine for the SII single-page applications.
//!
//! Wraps chromiumoxide with the primitives the navigation layer needs:
//! bounded condition polling instead of fixed sleeps, optional-element
//! probing where absence is data rather than an error, frame-aware DOM
//! queries (the portal relocates content into iframes unpredictably), and
//! diagnostic screenshots for post-mortems.

pub mod dom;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod poll;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use poll::{poll_until, probe, wait_for_selector, wait_for_visible_text, Probe};
