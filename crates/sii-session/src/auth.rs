//! Login drive against the portal's credential page.
//!
//! The only fixed contract here is the login form's field identifiers
//! (`#rutcntr`, `#clave`, `#bt_ingresar`). Success is implicit in the
//! post-condition that the page left the credential URL.

use crate::error::{Result, SessionError};
use chromiumoxide::Page;
use sii_browser::{dom, poll, BrowserError};
use sii_core::{PortalConfig, Rut};
use tracing::{debug, info};

/// Marker kept in the URL while the credential form is showing.
const LOGIN_URL_MARKER: &str = "IngresoRutClave";

/// Phrases the portal shows when it rejects credentials.
const REJECTION_MARKERS: &[&str] = &[
    "Clave incorrecta",
    "clave no es v",
    "RUT o clave incorrecta",
    "Usuario bloqueado",
];

/// Authenticate the page against the portal.
///
/// Fills the identity field with the normalized RUT (separators already
/// stripped by [`Rut`]), the secret verbatim, submits, and waits for the
/// page to leave the credential URL. Does not retry: the caller decides
/// whether a failure is worth a fresh attempt.
///
/// # Errors
/// [`SessionError::Authentication`] when the portal rejects the
/// credentials, [`SessionError::AuthenticationTimeout`] when the post-login
/// page never settles within the configured budget.
pub async fn authenticate(
    page: &Page,
    config: &PortalConfig,
    rut: &Rut,
    clave: &str,
) -> Result<()> {
    debug!(rut = %rut, "navigating to login page");

    page.goto(config.login_url.as_str())
        .await
        .map_err(|e| BrowserError::Navigation(e.to_string()))?;

    poll::wait_for_selector(page, "#rutcntr", config.login_timeout()).await?;

    if !dom::set_input_value(page, "#rutcntr", rut.as_str()).await? {
        return Err(SessionError::Authentication {
            reason: "login form is missing the RUT field".to_string(),
        });
    }
    if !dom::set_input_value(page, "#clave", clave).await? {
        return Err(SessionError::Authentication {
            reason: "login form is missing the secret field".to_string(),
        });
    }

    dom::click_element(page, "#bt_ingresar").await?;

    let settled = poll::poll_until(
        poll::POLL_INTERVAL,
        config.login_timeout(),
        || async move {
            match page.url().await {
                Ok(Some(url)) => !url.contains(LOGIN_URL_MARKER),
                _ => false,
            }
        },
    )
    .await;

    if !settled {
        // Still on the credential form: distinguish a rejection banner
        // from a page that simply never settled.
        if dom::text_present(page, REJECTION_MARKERS).await.unwrap_or(false) {
            return Err(SessionError::Authentication {
                reason: "portal rejected the credentials".to_string(),
            });
        }
        return Err(SessionError::AuthenticationTimeout {
            seconds: config.login_timeout_secs,
        });
    }

    info!(rut = %rut, "authenticated against portal");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_marker_matches_default_config() {
        let config = PortalConfig::default();
        assert!(config.login_url.contains(LOGIN_URL_MARKER));
    }

    #[test]
    fn test_rejection_markers_are_nonempty() {
        assert!(!REJECTION_MARKERS.is_empty());
        assert!(REJECTION_MARKERS.iter().all(|marker| !marker.is_empty()));
    }
}
