//! Configuration for the OAuth subsystem.

use std::time::Duration;

use crate::provider::{ProviderConfig, builtin};
use crate::state::{DEFAULT_STATE_TTL, DEFAULT_SWEEP_INTERVAL};

/// HTTP and flow defaults.
pub mod defaults {
    use std::time::Duration;

    /// Redirect base used when none is configured.
    pub const REDIRECT_BASE_URL: &str = "http://localhost:8000/oauth/callback";

    /// Timeout for token, refresh and revoke calls.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// User agent sent to providers.
    pub const USER_AGENT: &str = concat!("mail-oauth/", env!("CARGO_PKG_VERSION"));
}

/// Subsystem configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base redirect URI; the provider key is appended as a path segment.
    pub redirect_base_url: String,

    /// Providers in the order they should be offered.
    pub providers: Vec<ProviderConfig>,

    /// Request timeout for provider calls.
    pub request_timeout: Duration,

    /// Connection timeout for provider calls.
    pub connect_timeout: Duration,

    /// How long an issued state stays valid.
    pub state_ttl: Duration,

    /// How often expired states are swept.
    pub sweep_interval: Duration,
}

impl Config {
    /// Create a configuration with the given redirect base and providers.
    #[must_use]
    pub fn new(redirect_base_url: impl Into<String>, providers: Vec<ProviderConfig>) -> Self {
        Self {
            redirect_base_url: redirect_base_url.into(),
            providers,
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            state_ttl: DEFAULT_STATE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Create a test configuration whose provider endpoints live on a mock server.
    ///
    /// - `sample`: credentials `abc`/`xyz`, revocation supported
    /// - `outlook`: credentials set, no revocation endpoint
    /// - `unconfigured`: no credentials
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let providers = vec![
            ProviderConfig::new(
                "sample",
                "Sample",
                format!("{base_url}/sample/authorize"),
                format!("{base_url}/sample/token"),
            )
            .with_revocation_url(format!("{base_url}/sample/revoke"))
            .with_scopes(&["mail.read", "mail.send"])
            .with_credentials("abc", "xyz")
            .with_extra_param("access_type", "offline"),
            ProviderConfig::new(
                "outlook",
                "Outlook",
                format!("{base_url}/outlook/authorize"),
                format!("{base_url}/outlook/token"),
            )
            .with_scopes(&["offline_access", "IMAP.AccessAsUser.All"])
            .with_credentials("outlook-id", "outlook-secret"),
            ProviderConfig::new(
                "unconfigured",
                "Unconfigured",
                format!("{base_url}/unconfigured/authorize"),
                format!("{base_url}/unconfigured/token"),
            ),
        ];

        Self {
            redirect_base_url: "https://app.example.com/oauth/callback".to_string(),
            providers,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            state_ttl: DEFAULT_STATE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Providers without credentials are still registered so they can be listed;
    /// they are reported as unavailable.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable is not a valid number.
    pub fn from_env() -> anyhow::Result<Self> {
        let redirect_base_url = env_or("OAUTH_REDIRECT_BASE_URL", defaults::REDIRECT_BASE_URL);

        let providers = vec![
            builtin::gmail(env_or("GMAIL_CLIENT_ID", ""), env_or("GMAIL_CLIENT_SECRET", "")),
            builtin::outlook(env_or("OUTLOOK_CLIENT_ID", ""), env_or("OUTLOOK_CLIENT_SECRET", "")),
            builtin::yahoo(env_or("YAHOO_CLIENT_ID", ""), env_or("YAHOO_CLIENT_SECRET", "")),
        ];

        let mut config = Self::new(redirect_base_url, providers);
        if let Some(secs) = env_secs("OAUTH_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = secs;
        }
        if let Some(secs) = env_secs("OAUTH_STATE_TTL_SECS")? {
            config.state_ttl = secs;
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            defaults::REDIRECT_BASE_URL,
            vec![builtin::gmail("", ""), builtin::outlook("", ""), builtin::yahoo("", "")],
        )
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs(name: &str) -> anyhow::Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{name} must be a number of seconds: {e}"))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_has_builtin_providers() {
        let config = Config::default();
        let keys: Vec<_> = config.providers.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["gmail", "outlook", "yahoo"]);
        assert!(config.providers.iter().all(|p| !p.has_credentials()));
    }

    #[test]
    fn test_for_testing_points_at_mock_server() {
        let config = Config::for_testing("http://127.0.0.1:9999/");
        assert_eq!(config.providers[0].token_url, "http://127.0.0.1:9999/sample/token");
        assert!(config.providers[0].has_credentials());
        assert!(!config.providers[2].has_credentials());
    }
}
