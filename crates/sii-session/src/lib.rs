//! Authenticated browser sessions, one per tenant key (RUT).
//!
//! The [`SessionManager`] owns the registry enforcing the single-session-
//! per-key invariant; the [`auth`] module drives the portal's credential
//! page. All access goes through `acquire`/`release` — nothing else holds
//! the registry.

pub mod auth;
pub mod error;
pub mod manager;

pub use error::{Result, SessionError};
pub use manager::{Session, SessionManager};
