//! Condition-based bounded polling.
//!
//! Every wait in the navigation layer goes through these helpers: a
//! predicate polled at a short interval up to a hard budget. A hung portal
//! page therefore degrades to a `false`/`Absent`/timeout return instead of
//! an indefinite stall.

use crate::dom;
use crate::error::{BrowserError, Result};
use chromiumoxide::Page;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Default spacing between predicate checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of probing for an optional UI element.
///
/// Absence is a normal answer, not an error: optional modals simply do
/// not exist for some account states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Present,
    Absent,
}

impl Probe {
    #[must_use]
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Poll `predicate` every `interval` until it returns `true` or `budget`
/// elapses. Returns whether the predicate ever held.
pub async fn poll_until<F, Fut>(interval: Duration, budget: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + budget;
    loop {
        if predicate().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(interval).await;
    }
}

/// Probe for a selector with a short bounded wait.
///
/// # Errors
/// Returns error only on evaluation failure; a missing element is
/// [`Probe::Absent`].
pub async fn probe(page: &Page, selector: &str, budget: Duration) -> Result<Probe> {
    let found = poll_until(POLL_INTERVAL, budget, || async move {
        dom::element_exists(page, selector).await.unwrap_or(false)
    })
    .await;

    Ok(if found { Probe::Present } else { Probe::Absent })
}

/// Wait for a selector to appear, erroring on timeout.
///
/// # Errors
/// Returns [`BrowserError::Timeout`] when the budget elapses first.
pub async fn wait_for_selector(page: &Page, selector: &str, budget: Duration) -> Result<()> {
    if probe(page, selector, budget).await?.is_present() {
        Ok(())
    } else {
        Err(BrowserError::timeout(format!("selector {selector}"), budget))
    }
}

/// Wait until any frame's visible text contains one of the needles.
///
/// Used before extraction to avoid reading a stale or empty form: the
/// orchestrator does not guess which frame carries the data, it waits for
/// known-present terms to show up somewhere.
pub async fn wait_for_visible_text(page: &Page, needles: &[&str], budget: Duration) -> bool {
    poll_until(POLL_INTERVAL, budget, || async move {
        dom::text_present(page, needles).await.unwrap_or(false)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_poll_until_immediate_success() {
        let start = Instant::now();
        let hit = poll_until(POLL_INTERVAL, Duration::from_secs(5), || async { true }).await;
        assert!(hit);
        // No interval sleep when the first check succeeds
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_poll_until_eventual_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let hit = poll_until(Duration::from_millis(10), Duration::from_secs(5), || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;

        assert!(hit);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_poll_until_respects_budget() {
        let start = Instant::now();
        let hit = poll_until(
            Duration::from_millis(10),
            Duration::from_millis(80),
            || async { false },
        )
        .await;

        assert!(!hit);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_probe_presence() {
        assert!(Probe::Present.is_present());
        assert!(!Probe::Absent.is_present());
    }
}
