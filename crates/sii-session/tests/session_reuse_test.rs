use sii_core::{PortalConfig, Rut};
use sii_session::SessionManager;
use std::sync::Arc;

fn credentials_from_env() -> Option<(Rut, String)> {
    let rut = std::env::var("SII_RUT").ok()?;
    let clave = std::env::var("SII_CLAVE").ok()?;
    Some((Rut::new(rut).expect("valid RUT"), clave))
}

#[tokio::test]
#[ignore = "Requires Chrome browser and real portal credentials (SII_RUT/SII_CLAVE)"]
async fn test_session_reused_then_fresh_after_release() {
    let Some((rut, clave)) = credentials_from_env() else {
        panic!("set SII_RUT and SII_CLAVE to run this test");
    };

    let manager = SessionManager::new(PortalConfig::default());

    // Two sequential acquires return the same underlying session: no
    // second login is performed.
    let first = manager.acquire(rut.clone(), &clave).await.expect("acquire");
    let second = manager.acquire(rut.clone(), &clave).await.expect("acquire");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.created_at(), second.created_at());

    // After release, acquire performs a fresh login on a new browser.
    manager.release(&rut).await;
    let third = manager.acquire(rut.clone(), &clave).await.expect("acquire");
    assert!(!Arc::ptr_eq(&first, &third));

    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "Requires Chrome browser and real portal credentials (SII_RUT/SII_CLAVE)"]
async fn test_concurrent_acquire_same_key_creates_one_browser() {
    let Some((rut, clave)) = credentials_from_env() else {
        panic!("set SII_RUT and SII_CLAVE to run this test");
    };

    let manager = Arc::new(SessionManager::new(PortalConfig::default()));

    let a = {
        let manager = manager.clone();
        let rut = rut.clone();
        let clave = clave.clone();
        tokio::spawn(async move { manager.acquire(rut, &clave).await })
    };
    let b = {
        let manager = manager.clone();
        let rut = rut.clone();
        let clave = clave.clone();
        tokio::spawn(async move { manager.acquire(rut, &clave).await })
    };

    let a = a.await.expect("join").expect("acquire");
    let b = b.await.expect("join").expect("acquire");

    // The per-key slot lock serializes creation: both tasks see the same
    // session object.
    assert!(Arc::ptr_eq(&a, &b));

    manager.shutdown().await;
}
