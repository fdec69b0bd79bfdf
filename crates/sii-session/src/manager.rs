//! Session registry: one authenticated browser per tenant key.

use crate::auth;
use crate::error::{Result, SessionError};
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use sii_browser::BrowserEngine;
use sii_core::{PortalConfig, Rut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A live, authenticated browser session for one tenant key.
pub struct Session {
    rut: Rut,
    engine: Arc<BrowserEngine>,
    page: Page,
    created_at: DateTime<Utc>,
    /// Serializes operations within this tenant key: the page handle does
    /// not support concurrent navigation.
    op_lock: Mutex<()>,
}

impl Session {
    /// The tenant key this session belongs to.
    #[must_use]
    pub fn rut(&self) -> &Rut {
        &self.rut
    }

    /// The live page handle. Collaborators hold no state of their own;
    /// they operate purely on this handle.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The engine owning this session's browser.
    #[must_use]
    pub fn engine(&self) -> &Arc<BrowserEngine> {
        &self.engine
    }

    /// When the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Take the per-key operation lock. A second concurrent call for the
    /// same tenant queues behind the first.
    pub async fn lock_ops(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().await
    }

    /// Whether the underlying browser still responds.
    pub async fn is_healthy(&self) -> bool {
        if !self.engine.is_open().await {
            return false;
        }
        self.page.url().await.is_ok()
    }

    /// Close the underlying browser. Idempotent.
    pub async fn close(&self) {
        self.engine.close().await;
    }
}

type Slot = Arc<Mutex<Option<Arc<Session>>>>;

/// Registry of sessions keyed by RUT.
///
/// Creation for one key happens under that key's slot lock, so two
/// concurrent `acquire` calls for the same tenant never race-create two
/// browsers, while unrelated tenants proceed in parallel.
pub struct SessionManager {
    config: PortalConfig,
    slots: Mutex<HashMap<Rut, Slot>>,
}

impl SessionManager {
    /// Create a manager with the given portal configuration.
    #[must_use]
    pub fn new(config: PortalConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The portal configuration sessions are created with.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Return the existing live session for the key, or create and
    /// authenticate a new one.
    ///
    /// # Errors
    /// Propagates authentication and browser failures; a failed creation
    /// leaves no session registered for the key.
    pub async fn acquire(&self, rut: Rut, clave: &str) -> Result<Arc<Session>> {
        let slot = self.slot_for(&rut).await;
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.is_healthy().await {
                debug!(rut = %rut, "reusing live session");
                return Ok(session.clone());
            }
            warn!(rut = %rut, "discarding dead session");
            session.close().await;
            *guard = None;
        }

        info!(rut = %rut, "creating new session");
        let engine = Arc::new(BrowserEngine::new().await?);
        let page = engine.new_page().await?;

        match auth::authenticate(&page, &self.config, &rut, clave).await {
            Ok(()) => {
                let session = Arc::new(Session {
                    rut: rut.clone(),
                    engine,
                    page,
                    created_at: Utc::now(),
                    op_lock: Mutex::new(()),
                });
                *guard = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                // No half-open session may stay registered.
                engine.close().await;
                Err(e)
            }
        }
    }

    /// Close and discard the session for a key. Idempotent; a subsequent
    /// `acquire` starts fresh with a new login.
    pub async fn release(&self, rut: &Rut) {
        let slot = { self.slots.lock().await.remove(rut) };

        if let Some(slot) = slot {
            let session = slot.lock().await.take();
            if let Some(session) = session {
                info!(rut = %rut, "releasing session");
                session.close().await;
            }
        }
    }

    /// Close every session. Called once at process shutdown.
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = { self.slots.lock().await.drain().map(|(_, s)| s).collect() };

        for slot in slots {
            if let Some(session) = slot.lock().await.take() {
                session.close().await;
            }
        }
        info!("session manager shut down");
    }

    /// Number of registered tenant keys (live or pending creation).
    pub async fn registered_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Get or insert the slot for a key. Short critical section: slow
    /// session creation happens under the slot lock, not this map lock.
    async fn slot_for(&self, rut: &Rut) -> Slot {
        self.slots
            .lock()
            .await
            .entry(rut.clone())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rut() -> Rut {
        Rut::new("11.111.111-1").expect("valid RUT")
    }

    #[tokio::test]
    async fn test_release_unknown_key_is_noop() {
        let manager = SessionManager::new(PortalConfig::default());
        // Must not panic or block
        manager.release(&test_rut()).await;
        assert_eq!(manager.registered_count().await, 0);
    }

    #[tokio::test]
    async fn test_slot_reused_per_key() {
        let manager = SessionManager::new(PortalConfig::default());
        let rut = test_rut();

        let slot_a = manager.slot_for(&rut).await;
        let slot_b = manager.slot_for(&rut).await;
        assert!(Arc::ptr_eq(&slot_a, &slot_b));

        let other = Rut::new("22.222.222-2").expect("valid RUT");
        let slot_c = manager.slot_for(&other).await;
        assert!(!Arc::ptr_eq(&slot_a, &slot_c));

        assert_eq!(manager.registered_count().await, 2);
    }

    #[tokio::test]
    async fn test_shutdown_with_no_sessions() {
        let manager = SessionManager::new(PortalConfig::default());
        manager.slot_for(&test_rut()).await;
        manager.shutdown().await;
        assert_eq!(manager.registered_count().await, 0);
    }
}
