//! Advisory layer: turns extraction results into tax advice.
//!
//! A thin client for an OpenAI-compatible chat-completions endpoint. The
//! core hands over a plain structured record ([`AdvisoryContext`]) and
//! gets back free text; how that text is produced is not this crate's
//! business.

pub mod client;
pub mod context;
pub mod error;

pub use client::{AdvisorClient, Message, Role};
pub use context::AdvisoryContext;
pub use error::{AdvisorError, Result};
