//! Token endpoint client.
//!
//! Translates code exchange, refresh and revocation into each provider's
//! form-encoded HTTP contract and normalizes the responses:
//! - Non-2xx responses become `TokenExchange` with the provider's diagnostic
//! - 2xx responses without an access token are treated the same way
//! - Network failures become `Transport` and are never retried here

use std::sync::Arc;

use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{Config, defaults};
use crate::error::{OAuthError, OAuthResult};
use crate::provider::ProviderConfig;
use crate::registry::ProviderRegistry;

/// Maximum length of a raw body snippet carried in an error.
const ERROR_SNIPPET_LEN: usize = 240;

/// Token type assumed when the provider omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Normalized result of a code exchange or refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResult {
    pub access_token: String,

    /// `None` means the provider did not issue a new refresh token. On a
    /// refresh this is normal; the caller keeps the one it already has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds, if the provider reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    pub token_type: String,

    /// Granted scopes, space-delimited.
    pub scope: String,
}

impl TokenResult {
    /// True when the response carried a new refresh token.
    #[must_use]
    pub const fn has_new_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// The refresh token the caller should store after this call: the new one
    /// if issued, otherwise `previous`.
    #[must_use]
    pub fn refresh_token_or<'a>(&'a self, previous: &'a str) -> &'a str {
        self.refresh_token.as_deref().unwrap_or(previous)
    }
}

impl std::fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint response as providers send it.
#[derive(Debug, Default, Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Accept `expires_in` as a number or a numeric string.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// HTTP client for provider token, refresh and revocation endpoints.
#[derive(Clone)]
pub struct TokenExchanger {
    client: Client,
    registry: Arc<ProviderRegistry>,
}

impl TokenExchanger {
    /// Create an exchanger with timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config, registry: Arc<ProviderRegistry>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(defaults::USER_AGENT)
            .build()?;

        Ok(Self::with_client(client, registry))
    }

    /// Create an exchanger around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, registry: Arc<ProviderRegistry>) -> Self {
        Self { client, registry }
    }

    /// The registry this exchanger resolves providers from.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `code_verifier` must be the unchanged PKCE verifier when the
    /// authorization URL carried a challenge.
    pub async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> OAuthResult<TokenResult> {
        let config = self.registry.get_configured(provider)?;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let (status, body) = self.post_form(config, &config.token_url, &form).await?;
        let result = parse_token_response(config, status, &body)?;

        tracing::info!(
            provider = %provider,
            pkce = code_verifier.is_some(),
            has_refresh_token = result.has_new_refresh_token(),
            "Exchanged authorization code"
        );
        Ok(result)
    }

    /// Obtain a new access token with a refresh token.
    ///
    /// If the provider does not rotate the refresh token, the result's
    /// `refresh_token` is `None`.
    pub async fn refresh_token(&self, provider: &str, refresh_token: &str) -> OAuthResult<TokenResult> {
        let config = self.registry.get_configured(provider)?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let (status, body) = self.post_form(config, &config.token_url, &form).await?;
        let result = parse_token_response(config, status, &body)?;

        tracing::info!(
            provider = %provider,
            rotated = result.has_new_refresh_token(),
            "Refreshed access token"
        );
        Ok(result)
    }

    /// Revoke a token at the provider.
    ///
    /// Providers without a revocation endpoint yield `NotSupported`.
    pub async fn revoke_token(&self, provider: &str, token: &str) -> OAuthResult<()> {
        let config = self.registry.get_configured(provider)?;

        let Some(revocation_url) = config.revocation_url.as_deref() else {
            return Err(OAuthError::not_supported(provider, "token revocation"));
        };

        let form = [
            ("token", token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let (status, body) = self.post_form(config, revocation_url, &form).await?;
        if !status.is_success() {
            let message = provider_error_message(&body);
            tracing::warn!(provider = %provider, status = status.as_u16(), "Token revocation rejected");
            return Err(OAuthError::token_exchange(provider, status.as_u16(), message));
        }

        tracing::info!(provider = %provider, "Revoked token");
        Ok(())
    }

    /// POST a form and read the whole body. Only transport failures error here.
    async fn post_form(
        &self,
        provider: &ProviderConfig,
        url: &str,
        form: &[(&str, &str)],
    ) -> OAuthResult<(StatusCode, String)> {
        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = %provider.key, error = %e, "Provider request failed");
                OAuthError::transport(&provider.key, e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| OAuthError::transport(&provider.key, e))?;

        Ok((status, body))
    }
}

impl std::fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchanger").field("providers", &self.registry.list()).finish()
    }
}

/// Turn a token endpoint response into a `TokenResult` or a `TokenExchange` error.
fn parse_token_response(provider: &ProviderConfig, status: StatusCode, body: &str) -> OAuthResult<TokenResult> {
    if !status.is_success() {
        let message = provider_error_message(body);
        tracing::warn!(
            provider = %provider.key,
            status = status.as_u16(),
            message = %message,
            "Token endpoint rejected request"
        );
        return Err(OAuthError::token_exchange(&provider.key, status.as_u16(), message));
    }

    let raw: RawTokenResponse = serde_json::from_str(body).map_err(|e| {
        OAuthError::token_exchange(&provider.key, status.as_u16(), format!("token response was not valid JSON: {e}"))
    })?;

    let Some(access_token) = non_empty(raw.access_token) else {
        return Err(OAuthError::token_exchange(
            &provider.key,
            status.as_u16(),
            "token response did not include an access_token",
        ));
    };

    Ok(TokenResult {
        access_token,
        refresh_token: non_empty(raw.refresh_token),
        expires_in: raw.expires_in,
        token_type: non_empty(raw.token_type).unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        // RFC 6749 §5.1: an omitted scope means the requested scope was granted.
        scope: non_empty(raw.scope).unwrap_or_else(|| provider.scope.clone()),
    })
}

/// Extract the most useful diagnostic from a provider error body.
///
/// Understands `{"error": "...", "error_description": "..."}` (RFC 6749) and
/// `{"error": {"message": "..."}}`; falls back to a trimmed body snippet.
fn provider_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let code = value.get("error").and_then(|e| e.as_str()).filter(|s| !s.is_empty());
        let description =
            value.get("error_description").and_then(|d| d.as_str()).filter(|s| !s.is_empty());
        let nested = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .filter(|s| !s.is_empty());

        match (code, description, nested) {
            (Some(code), Some(description), _) => return format!("{code}: {description}"),
            (None, Some(description), _) => return description.to_string(),
            (Some(code), None, _) => return code.to_string(),
            (None, None, Some(message)) => return message.to_string(),
            (None, None, None) => {}
        }
    }

    let snippet: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if snippet.is_empty() {
        return "empty response body".to_string();
    }
    snippet.chars().take(ERROR_SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig::new("sample", "Sample", "https://a", "https://t")
            .with_scopes(&["mail.read"])
            .with_credentials("abc", "xyz")
    }

    #[test]
    fn test_parse_full_response() {
        let body = r#"{"access_token":"AT1","refresh_token":"RT1","expires_in":3600,"token_type":"Bearer","scope":"mail.read mail.send"}"#;
        let result = parse_token_response(&provider(), StatusCode::OK, body).unwrap();
        assert_eq!(result.access_token, "AT1");
        assert_eq!(result.refresh_token.as_deref(), Some("RT1"));
        assert_eq!(result.expires_in, Some(3600));
        assert_eq!(result.scope, "mail.read mail.send");
    }

    #[test]
    fn test_parse_defaults_token_type_and_scope() {
        let body = r#"{"access_token":"AT2","expires_in":"3599"}"#;
        let result = parse_token_response(&provider(), StatusCode::OK, body).unwrap();
        assert_eq!(result.token_type, "Bearer");
        assert_eq!(result.scope, "mail.read");
        assert_eq!(result.expires_in, Some(3599));
        assert_eq!(result.refresh_token, None);
    }

    #[test]
    fn test_parse_empty_refresh_token_is_absent() {
        let body = r#"{"access_token":"AT2","refresh_token":""}"#;
        let result = parse_token_response(&provider(), StatusCode::OK, body).unwrap();
        assert!(!result.has_new_refresh_token());
        assert_eq!(result.refresh_token_or("RT-old"), "RT-old");
    }

    #[test]
    fn test_parse_missing_access_token_is_exchange_error() {
        let err = parse_token_response(&provider(), StatusCode::OK, r#"{"token_type":"Bearer"}"#)
            .unwrap_err();
        match err {
            OAuthError::TokenExchange { status, message, .. } => {
                assert_eq!(status, 200);
                assert!(message.contains("access_token"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_json_success_is_exchange_error() {
        let err = parse_token_response(&provider(), StatusCode::OK, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchange { status: 200, .. }));
    }

    #[test]
    fn test_provider_error_message_shapes() {
        assert_eq!(
            provider_error_message(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#),
            "invalid_grant: Bad Request"
        );
        assert_eq!(provider_error_message(r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(
            provider_error_message(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#),
            "Invalid Credentials"
        );
        assert_eq!(provider_error_message("  Service\n  Unavailable "), "Service Unavailable");
        assert_eq!(provider_error_message(""), "empty response body");
    }

    #[test]
    fn test_provider_error_message_truncates() {
        let body = "x".repeat(1000);
        assert_eq!(provider_error_message(&body).len(), ERROR_SNIPPET_LEN);
    }

    #[test]
    fn test_token_result_debug_redacts_tokens() {
        let result = TokenResult {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            expires_in: Some(3600),
            token_type: "Bearer".into(),
            scope: "mail.read".into(),
        };
        let debug = format!("{result:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("3600"));
    }
}
