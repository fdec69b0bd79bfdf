//! Portal endpoint and timeout configuration.
//!
//! The SII endpoints are versionless and change without notice, so they
//! live in configuration rather than in the navigation code. `Default`
//! carries the production URLs; deployments can override via TOML.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Portal endpoints and wait budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Credential page
    pub login_url: String,
    /// Authenticated home (Mi SII)
    pub home_url: String,
    /// F29 proposal SPA
    pub proposal_url: String,
    /// Final declaration form (rfiInternet)
    pub form_url: String,
    /// Purchase/sale registry SPA
    pub registry_url: String,
    /// Carpeta tributaria generation flow
    pub folder_url: String,

    /// Seconds to wait for an optional element before treating it as absent
    pub probe_timeout_secs: u64,
    /// Seconds to wait for the final form to carry known content
    pub form_timeout_secs: u64,
    /// Seconds to wait for the post-login page
    pub login_timeout_secs: u64,

    /// Directory for diagnostic screenshots and generated documents
    pub artifact_dir: PathBuf,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url:
                "https://zeusr.sii.cl/AUT2000/InicioAutenticacion/IngresoRutClave.html?https://misiir.sii.cl/cgi_misii/siihome.cgi"
                    .to_string(),
            home_url: "https://misiir.sii.cl/cgi_misii/siihome.cgi".to_string(),
            proposal_url: "https://www4.sii.cl/propuestaf29ui/#/".to_string(),
            form_url:
                "https://www4.sii.cl/rfiInternet/?origen=PROPUESTA&accionPpta=PPTA-F29-COMPLETA"
                    .to_string(),
            registry_url: "https://www4.sii.cl/consdcvinternetui/#/index".to_string(),
            folder_url: "https://www2.sii.cl/carpetatributaria/generarcteregular".to_string(),
            probe_timeout_secs: 5,
            form_timeout_secs: 30,
            login_timeout_secs: 20,
            artifact_dir: PathBuf::from("artifacts"),
        }
    }
}

impl PortalConfig {
    /// Parse a config from a TOML string.
    ///
    /// # Errors
    /// Returns error if the TOML does not parse or a value is invalid.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable, or invalid.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Bounded wait for optional-element probes.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Bounded wait for the data-bearing form.
    #[must_use]
    pub fn form_timeout(&self) -> Duration {
        Duration::from_secs(self.form_timeout_secs)
    }

    /// Bounded wait for the post-login page.
    #[must_use]
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("login_url", &self.login_url),
            ("home_url", &self.home_url),
            ("proposal_url", &self.proposal_url),
            ("form_url", &self.form_url),
            ("registry_url", &self.registry_url),
            ("folder_url", &self.folder_url),
        ] {
            if !value.starts_with("http") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("'{value}' is not an http(s) URL"),
                });
            }
        }

        if self.form_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "form_timeout_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PortalConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.login_url.contains("sii.cl"));
        assert_eq!(config.form_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = PortalConfig::from_toml_str(
            r#"
            probe_timeout_secs = 2
            registry_url = "https://staging.sii.cl/consdcvinternetui/#/index"
            "#,
        )
        .expect("parse config");

        assert_eq!(config.probe_timeout_secs, 2);
        assert!(config.registry_url.contains("staging"));
        // Untouched values keep their defaults
        assert!(config.login_url.contains("zeusr.sii.cl"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = PortalConfig::from_toml_str(r#"login_url = "not-a-url""#);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "login_url"
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PortalConfig::load("/nonexistent/portal.toml");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("portal.toml");
        std::fs::write(&path, "form_timeout_secs = 10\n").expect("write config");

        let config = PortalConfig::load(&path).expect("load config");
        assert_eq!(config.form_timeout(), Duration::from_secs(10));
    }
}
