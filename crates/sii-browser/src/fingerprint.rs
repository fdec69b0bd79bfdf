use rand::Rng;

/// Browser fingerprint presented to the portal.
///
/// The portal serves a desktop layout; extraction selectors assume it, so
/// profiles stay within common desktop viewports.
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// The profile the extraction selectors were verified against.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            viewport_width: 1366,
            viewport_height: 768,
        }
    }

    /// Pick a randomized desktop profile.
    #[must_use]
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ];
        let viewports = [(1366, 768), (1440, 900), (1536, 864)];

        let ua = user_agents[rng.gen_range(0..user_agents.len())];
        let (width, height) = viewports[rng.gen_range(0..viewports.len())];

        Self {
            user_agent: ua.to_string(),
            viewport_width: width,
            viewport_height: height,
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fingerprint() {
        let config = FingerprintConfig::standard();
        assert_eq!(config.viewport_width, 1366);
        assert!(config.user_agent.contains("Chrome"));
    }

    #[test]
    fn test_randomized_is_desktop_sized() {
        for _ in 0..10 {
            let config = FingerprintConfig::randomized();
            assert!(config.viewport_width >= 1366);
            assert!(config.viewport_height >= 768);
            assert!(!config.user_agent.is_empty());
        }
    }
}
