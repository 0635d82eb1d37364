//! Provider configuration and the built-in provider catalog.
//!
//! The authorization-code and refresh grants are identical across providers, so
//! a provider is a flat record. The places where providers actually diverge
//! (revocation support, extra authorization parameters, scope syntax) are plain
//! data on that record.

/// Immutable configuration for one identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Registry key, also the last path segment of the redirect URI.
    pub key: String,
    /// Human-readable name.
    pub display_name: String,
    pub authorization_url: String,
    pub token_url: String,
    /// `None` when the provider has no revocation endpoint (tokens just expire).
    pub revocation_url: Option<String>,
    /// Space-delimited scopes.
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    /// Extra authorization-request parameters, in order.
    pub extra_params: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Create a provider with no scopes, credentials or extras.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        authorization_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            authorization_url: authorization_url.into(),
            token_url: token_url.into(),
            revocation_url: None,
            scope: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            extra_params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_revocation_url(mut self, url: impl Into<String>) -> Self {
        self.revocation_url = Some(url.into());
        self
    }

    /// Set the scopes; joined with single spaces.
    #[must_use]
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scope = scopes.join(" ");
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    #[must_use]
    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    /// True when both client id and secret are non-blank.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    #[must_use]
    pub const fn supports_revocation(&self) -> bool {
        self.revocation_url.is_some()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("revocation_url", &self.revocation_url)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

/// Built-in provider definitions.
pub mod builtin {
    use super::ProviderConfig;

    pub const GMAIL: &str = "gmail";
    pub const OUTLOOK: &str = "outlook";
    pub const YAHOO: &str = "yahoo";

    /// Google. Needs `access_type=offline` plus `prompt=consent` to hand out a
    /// refresh token on every consent.
    #[must_use]
    pub fn gmail(client_id: impl Into<String>, client_secret: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(
            GMAIL,
            "Gmail",
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
        )
        .with_revocation_url("https://oauth2.googleapis.com/revoke")
        .with_scopes(&[
            "https://mail.google.com/",
            "https://www.googleapis.com/auth/userinfo.email",
        ])
        .with_credentials(client_id, client_secret)
        .with_extra_param("access_type", "offline")
        .with_extra_param("prompt", "consent")
    }

    /// Microsoft identity platform v2. No revocation endpoint; refresh tokens
    /// come from the `offline_access` scope.
    #[must_use]
    pub fn outlook(client_id: impl Into<String>, client_secret: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(
            OUTLOOK,
            "Outlook",
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            "https://login.microsoftonline.com/common/oauth2/v2.0/token",
        )
        .with_scopes(&[
            "https://outlook.office.com/IMAP.AccessAsUser.All",
            "https://outlook.office.com/SMTP.Send",
            "offline_access",
            "openid",
            "email",
        ])
        .with_credentials(client_id, client_secret)
        .with_extra_param("response_mode", "query")
    }

    /// Yahoo. No revocation endpoint.
    #[must_use]
    pub fn yahoo(client_id: impl Into<String>, client_secret: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(
            YAHOO,
            "Yahoo Mail",
            "https://api.login.yahoo.com/oauth2/request_auth",
            "https://api.login.yahoo.com/oauth2/get_token",
        )
        .with_scopes(&["mail-w", "openid"])
        .with_credentials(client_id, client_secret)
    }
}
