//! Error types for the OAuth subsystem.
//!
//! Uses `thiserror` for structured error handling. Every variant carries enough
//! context (kind, provider, diagnostic) for the caller to decide between a retry
//! affordance and an operator-facing alert.

/// Errors from authorization, token exchange, refresh and revocation.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    /// The provider key is not present in the registry.
    #[error("Unknown OAuth provider: {provider}")]
    UnknownProvider {
        /// Requested provider key
        provider: String,
    },

    /// The provider is known but has no client id or secret configured.
    #[error("OAuth provider '{provider}' is missing client credentials")]
    MissingCredentials {
        /// Provider key
        provider: String,
    },

    /// The state token is unknown, already consumed, or past its TTL.
    #[error("Invalid or expired OAuth state")]
    InvalidOrExpiredState,

    /// The provider rejected the request (non-2xx, or a 2xx without an access token).
    #[error("Token request to '{provider}' failed ({status}): {message}")]
    TokenExchange {
        /// Provider key
        provider: String,
        /// HTTP status returned by the provider
        status: u16,
        /// Provider-supplied diagnostic text
        message: String,
    },

    /// Network-level failure (DNS, connect, TLS, timeout, body read).
    #[error("Transport error talking to '{provider}': {source}")]
    Transport {
        /// Provider key
        provider: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The provider does not support the requested operation.
    #[error("OAuth provider '{provider}' does not support {operation}")]
    NotSupported {
        /// Provider key
        provider: String,
        /// Operation name (e.g. "token revocation")
        operation: &'static str,
    },

    /// A configured endpoint URL could not be parsed.
    #[error("Invalid endpoint configured for '{provider}': {source}")]
    InvalidEndpoint {
        /// Provider key
        provider: String,
        /// URL parse failure
        #[source]
        source: url::ParseError,
    },
}

impl OAuthError {
    /// Create an unknown provider error.
    #[must_use]
    pub fn unknown_provider(provider: impl Into<String>) -> Self {
        Self::UnknownProvider { provider: provider.into() }
    }

    /// Create a missing credentials error.
    #[must_use]
    pub fn missing_credentials(provider: impl Into<String>) -> Self {
        Self::MissingCredentials { provider: provider.into() }
    }

    /// Create a token exchange error.
    #[must_use]
    pub fn token_exchange(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::TokenExchange { provider: provider.into(), status, message: message.into() }
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport { provider: provider.into(), source }
    }

    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::NotSupported { provider: provider.into(), operation }
    }

    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::MissingCredentials { .. } => "missing_credentials",
            Self::InvalidOrExpiredState => "invalid_or_expired_state",
            Self::TokenExchange { .. } => "token_exchange",
            Self::Transport { .. } => "transport",
            Self::NotSupported { .. } => "not_supported",
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
        }
    }

    /// Provider key the error relates to, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::UnknownProvider { provider }
            | Self::MissingCredentials { provider }
            | Self::TokenExchange { provider, .. }
            | Self::Transport { provider, .. }
            | Self::NotSupported { provider, .. }
            | Self::InvalidEndpoint { provider, .. } => Some(provider),
            Self::InvalidOrExpiredState => None,
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// Only transport failures qualify. For an initial code exchange the caller
    /// should restart the whole flow instead, since codes are single-use.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns true if the user has to go through the authorization flow again.
    #[must_use]
    pub const fn requires_new_flow(&self) -> bool {
        matches!(self, Self::InvalidOrExpiredState | Self::TokenExchange { .. })
    }
}

/// Result type alias for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(OAuthError::unknown_provider("x").kind(), "unknown_provider");
        assert_eq!(OAuthError::missing_credentials("x").kind(), "missing_credentials");
        assert_eq!(OAuthError::InvalidOrExpiredState.kind(), "invalid_or_expired_state");
        assert_eq!(OAuthError::token_exchange("x", 400, "bad").kind(), "token_exchange");
        assert_eq!(OAuthError::not_supported("x", "token revocation").kind(), "not_supported");
    }

    #[test]
    fn test_error_provider() {
        assert_eq!(OAuthError::token_exchange("gmail", 400, "bad").provider(), Some("gmail"));
        assert_eq!(OAuthError::InvalidOrExpiredState.provider(), None);
    }

    #[test]
    fn test_retry_classification() {
        assert!(!OAuthError::token_exchange("gmail", 400, "invalid_grant").is_retryable());
        assert!(!OAuthError::InvalidOrExpiredState.is_retryable());
        assert!(!OAuthError::missing_credentials("gmail").is_retryable());

        assert!(OAuthError::InvalidOrExpiredState.requires_new_flow());
        assert!(OAuthError::token_exchange("gmail", 400, "invalid_grant").requires_new_flow());
        assert!(!OAuthError::unknown_provider("nope").requires_new_flow());
    }

    #[test]
    fn test_error_messages_include_context() {
        let err = OAuthError::token_exchange("outlook", 401, "AADSTS70008: code expired");
        let msg = err.to_string();
        assert!(msg.contains("outlook"));
        assert!(msg.contains("401"));
        assert!(msg.contains("AADSTS70008"));

        let err = OAuthError::not_supported("yahoo", "token revocation");
        assert!(err.to_string().contains("token revocation"));
    }
}
