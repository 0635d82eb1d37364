//! Public entry point composing registry, state store, PKCE and token exchange.
//!
//! Per authorization attempt the only transition is `ISSUED -> REDEEMED`: the
//! state is deleted on first inspection whatever the outcome, so there is no
//! way to retry a callback with the same state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::Config;
use crate::error::{OAuthError, OAuthResult};
use crate::exchange::{TokenExchanger, TokenResult};
use crate::pkce::{CHALLENGE_METHOD, PkceChallenge};
use crate::registry::ProviderRegistry;
use crate::state::{self, InMemoryStateStore, StateStore, StateValidation};

/// Optional inputs to `build_authorization_url`.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    /// Use this state instead of issuing one. The caller then owns its validation.
    pub state: Option<String>,
    /// S256 code challenge. The verifier stays with the caller.
    pub pkce_challenge: Option<String>,
}

impl AuthorizationOptions {
    /// Options carrying the challenge half of `pkce`.
    #[must_use]
    pub fn with_pkce(pkce: &PkceChallenge) -> Self {
        Self { state: None, pkce_challenge: Some(pkce.code_challenge.clone()) }
    }
}

/// An authorization URL together with the state embedded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

/// How `revoke` treats providers without a revocation endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevokeMode {
    /// Treat "cannot revoke" as a no-op success; the token simply expires.
    #[default]
    Lenient,
    /// Surface `NotSupported` to the caller.
    Strict,
}

/// OAuth2 orchestrator.
pub struct OAuth2Handler {
    registry: Arc<ProviderRegistry>,
    states: Arc<dyn StateStore>,
    exchanger: TokenExchanger,
    redirect_base_url: String,
    sweeper: Option<JoinHandle<()>>,
}

impl OAuth2Handler {
    /// Create a handler with an in-memory state store on the system clock.
    ///
    /// When called inside a Tokio runtime the handler also starts sweeping
    /// expired states every `config.sweep_interval`; the task stops when the
    /// handler is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let states = Arc::new(InMemoryStateStore::with_clock(
            Arc::new(crate::clock::SystemClock),
            config.state_ttl,
        ));
        Self::with_state_store(config, states)
    }

    /// Create a handler around a caller-provided state store.
    ///
    /// The store is swept in the background as in [`OAuth2Handler::new`].
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn with_state_store(config: &Config, states: Arc<dyn StateStore>) -> anyhow::Result<Self> {
        let registry = Arc::new(ProviderRegistry::new(config.providers.iter().cloned()));
        let exchanger = TokenExchanger::new(config, Arc::clone(&registry))?;
        let sweeper = Self::spawn_state_sweeper(&states, config.sweep_interval);

        Ok(Self {
            registry,
            states,
            exchanger,
            redirect_base_url: config.redirect_base_url.trim_end_matches('/').to_string(),
            sweeper,
        })
    }

    /// Start sweeping `states`, if there is a runtime to run the task on.
    fn spawn_state_sweeper(states: &Arc<dyn StateStore>, every: Duration) -> Option<JoinHandle<()>> {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("No Tokio runtime, expired OAuth states will not be swept");
            return None;
        }
        Some(state::spawn_sweeper(Arc::clone(states), every))
    }

    /// Whether expired states are being swept in the background.
    #[must_use]
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Provider registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// State store.
    #[must_use]
    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.states
    }

    /// Redirect URI registered with `provider`.
    #[must_use]
    pub fn redirect_uri(&self, provider: &str) -> String {
        format!("{}/{}", self.redirect_base_url, provider)
    }

    /// Build the URL to send the user to for consent.
    pub async fn build_authorization_url(
        &self,
        provider: &str,
        options: AuthorizationOptions,
    ) -> OAuthResult<AuthorizationRequest> {
        let config = self.registry.get_configured(provider)?;

        let mut url = Url::parse(&config.authorization_url).map_err(|source| {
            OAuthError::InvalidEndpoint { provider: provider.to_string(), source }
        })?;

        let state = match options.state {
            Some(state) => state,
            None => self.states.generate_state(provider).await,
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", &self.redirect_uri(provider))
                .append_pair("response_type", "code")
                .append_pair("scope", &config.scope)
                .append_pair("state", &state);

            for (name, value) in &config.extra_params {
                query.append_pair(name, value);
            }

            if let Some(challenge) = &options.pkce_challenge {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", CHALLENGE_METHOD);
            }
        }

        tracing::info!(
            provider = %provider,
            pkce = options.pkce_challenge.is_some(),
            "Built authorization URL"
        );
        Ok(AuthorizationRequest { url, state })
    }

    /// Finish the flow after the provider redirects back with `code` and `state`.
    ///
    /// The state is consumed before the exchange starts, so a failed exchange
    /// cannot be retried with the same state.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> OAuthResult<TokenResult> {
        let provider = self.consume_state(state).await?;
        self.exchange_code(&provider, code, code_verifier).await
    }

    /// Finish the flow for a callback received on `provider`'s redirect URI.
    ///
    /// A state issued for another provider is rejected without contacting any
    /// token endpoint, and stays consumed.
    pub async fn complete_callback(
        &self,
        provider: &str,
        state: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> OAuthResult<TokenResult> {
        let issued_for = self.consume_state(state).await?;
        if issued_for != provider {
            tracing::warn!(
                provider = %provider,
                issued_for = %issued_for,
                "OAuth callback arrived for a different provider than its state"
            );
            return Err(OAuthError::InvalidOrExpiredState);
        }
        self.exchange_code(&issued_for, code, code_verifier).await
    }

    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> OAuthResult<TokenResult> {
        let redirect_uri = self.redirect_uri(provider);
        self.exchanger.exchange_code(provider, code, &redirect_uri, code_verifier).await
    }

    /// Consume a state, returning the provider it was issued for.
    pub async fn consume_state(&self, state: &str) -> OAuthResult<String> {
        match self.states.validate_state(state).await {
            StateValidation::Valid { provider } => Ok(provider),
            outcome @ (StateValidation::Expired | StateValidation::Unknown) => {
                tracing::warn!(outcome = ?outcome, "Rejected OAuth callback state");
                Err(OAuthError::InvalidOrExpiredState)
            }
        }
    }

    /// Get a new access token.
    pub async fn refresh(&self, provider: &str, refresh_token: &str) -> OAuthResult<TokenResult> {
        self.exchanger.refresh_token(provider, refresh_token).await
    }

    /// Revoke a token.
    pub async fn revoke(&self, provider: &str, token: &str, mode: RevokeMode) -> OAuthResult<()> {
        match self.exchanger.revoke_token(provider, token).await {
            Err(OAuthError::NotSupported { .. }) if mode == RevokeMode::Lenient => {
                tracing::debug!(provider = %provider, "Revocation not supported, token will expire");
                Ok(())
            }
            other => other,
        }
    }

    /// Whether `provider` can be offered to users.
    #[must_use]
    pub fn is_provider_available(&self, provider: &str) -> bool {
        self.registry.is_configured(provider)
    }

    /// Configured providers in registration order.
    #[must_use]
    pub fn available_providers(&self) -> Vec<&str> {
        self.registry.configured()
    }
}

impl Drop for OAuth2Handler {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl std::fmt::Debug for OAuth2Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Handler")
            .field("providers", &self.registry.list())
            .field("redirect_base_url", &self.redirect_base_url)
            .field("sweeping", &self.is_sweeping())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::DEFAULT_STATE_TTL;

    fn handler() -> OAuth2Handler {
        OAuth2Handler::new(&Config::for_testing("http://127.0.0.1:1")).unwrap()
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
    }

    #[tokio::test]
    async fn test_authorization_url_parameters() {
        let handler = handler();
        let request = handler.build_authorization_url("sample", AuthorizationOptions::default()).await.unwrap();

        let params = query(&request.url);
        let names: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["client_id", "redirect_uri", "response_type", "scope", "state", "access_type"]
        );
        assert!(params.contains(&("client_id".into(), "abc".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "https://app.example.com/oauth/callback/sample".into()
        )));
        assert!(params.contains(&("scope".into(), "mail.read mail.send".into())));
        assert!(params.contains(&("state".into(), request.state.clone())));
        assert_eq!(handler.state_store().len().await, 1);
    }

    #[tokio::test]
    async fn test_authorization_url_with_pkce() {
        let handler = handler();
        let pkce = PkceChallenge::generate();
        let request = handler
            .build_authorization_url("sample", AuthorizationOptions::with_pkce(&pkce))
            .await
            .unwrap();

        let params = query(&request.url);
        assert!(params.contains(&("code_challenge".into(), pkce.code_challenge)));
        assert!(params.contains(&("code_challenge_method".into(), "S256".into())));
        assert!(!params.iter().any(|(k, _)| k == "code_verifier"));
    }

    #[tokio::test]
    async fn test_supplied_state_is_not_stored() {
        let handler = handler();
        let options = AuthorizationOptions { state: Some("caller-state".into()), pkce_challenge: None };
        let request = handler.build_authorization_url("sample", options).await.unwrap();

        assert_eq!(request.state, "caller-state");
        assert!(handler.state_store().is_empty().await);
    }

    #[tokio::test]
    async fn test_authorization_url_errors() {
        let handler = handler();
        let err = handler.build_authorization_url("aol", AuthorizationOptions::default()).await.unwrap_err();
        assert!(matches!(err, OAuthError::UnknownProvider { .. }));

        let err = handler
            .build_authorization_url("unconfigured", AuthorizationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::MissingCredentials { .. }));
        assert!(handler.state_store().is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_state_rejected_before_exchange() {
        let clock = Arc::new(ManualClock::default());
        let states = Arc::new(InMemoryStateStore::with_clock(clock.clone(), DEFAULT_STATE_TTL));
        let handler =
            OAuth2Handler::with_state_store(&Config::for_testing("http://127.0.0.1:1"), states).unwrap();

        let request = handler.build_authorization_url("sample", AuthorizationOptions::default()).await.unwrap();
        clock.advance(chrono::Duration::hours(2));

        let err = handler.complete_authorization(&request.state, "code", None).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidOrExpiredState));
    }

    #[tokio::test]
    async fn test_callback_for_other_provider_rejected() {
        let handler = handler();
        let request = handler.build_authorization_url("outlook", AuthorizationOptions::default()).await.unwrap();

        // 127.0.0.1:1 refuses connections, so reaching the exchange would be a Transport error.
        let err = handler.complete_callback("sample", &request.state, "code", None).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidOrExpiredState));

        let err = handler.complete_callback("outlook", &request.state, "code", None).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidOrExpiredState));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_sweeps_abandoned_states() {
        let clock = Arc::new(ManualClock::default());
        let states = Arc::new(InMemoryStateStore::with_clock(clock.clone(), DEFAULT_STATE_TTL));
        let config = Config::for_testing("http://127.0.0.1:1");
        let handler = OAuth2Handler::with_state_store(&config, states.clone()).unwrap();
        assert!(handler.is_sweeping());

        for _ in 0..3 {
            handler.build_authorization_url("sample", AuthorizationOptions::default()).await.unwrap();
        }
        clock.advance(chrono::Duration::hours(2));
        let fresh = handler.build_authorization_url("sample", AuthorizationOptions::default()).await.unwrap();

        tokio::time::advance(config.sweep_interval).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(states.len().await, 1);
        assert_eq!(handler.consume_state(&fresh.state).await.unwrap(), "sample");
    }

    #[tokio::test]
    async fn test_strict_revoke_surfaces_not_supported() {
        let handler = handler();
        let err = handler.revoke("outlook", "AT1", RevokeMode::Strict).await.unwrap_err();
        assert!(matches!(err, OAuthError::NotSupported { .. }));
        assert!(handler.revoke("outlook", "AT1", RevokeMode::Lenient).await.is_ok());
    }

    #[test]
    fn test_provider_availability() {
        let handler = handler();
        assert!(!handler.is_sweeping());
        assert!(handler.is_provider_available("sample"));
        assert!(!handler.is_provider_available("unconfigured"));
        assert!(!handler.is_provider_available("aol"));
        assert_eq!(handler.available_providers(), vec!["sample", "outlook"]);
    }
}
