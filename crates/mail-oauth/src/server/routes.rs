//! Route handlers.
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /oauth/providers` | provider list with availability |
//! | `GET /oauth/{provider}/authorize` | authorization URL + state |
//! | `GET /oauth/callback/{provider}` | complete the flow |
//! | `POST /oauth/{provider}/refresh` | refresh an access token |
//! | `POST /oauth/{provider}/revoke` | revoke a token |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::OAuthError;
use crate::handler::{AuthorizationOptions, OAuth2Handler, RevokeMode};

/// Build the router.
pub fn create_router(handler: Arc<OAuth2Handler>) -> Router {
    Router::new()
        .route("/oauth/providers", get(handle_list_providers))
        .route("/oauth/{provider}/authorize", get(handle_authorize))
        .route("/oauth/callback/{provider}", get(handle_callback))
        .route("/oauth/{provider}/refresh", post(handle_refresh))
        .route("/oauth/{provider}/revoke", post(handle_revoke))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error, message: message.into() })).into_response()
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownProvider { .. } => StatusCode::NOT_FOUND,
            Self::MissingCredentials { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidOrExpiredState => StatusCode::BAD_REQUEST,
            Self::TokenExchange { .. } => StatusCode::BAD_GATEWAY,
            Self::Transport { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::InvalidEndpoint { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.kind(), self.to_string())
    }
}

// ─── Providers ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ProviderInfo<'a> {
    key: &'a str,
    name: &'a str,
    available: bool,
}

/// `GET /oauth/providers`
async fn handle_list_providers(State(handler): State<Arc<OAuth2Handler>>) -> Response {
    let providers: Vec<ProviderInfo<'_>> = handler
        .registry()
        .iter()
        .map(|p| ProviderInfo { key: &p.key, name: &p.display_name, available: p.has_credentials() })
        .collect();

    Json(providers).into_response()
}

// ─── Authorization ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub code_challenge: Option<String>,
}

/// `GET /oauth/{provider}/authorize`
///
/// Returns `{url, state}`. The caller redirects the user to `url`.
async fn handle_authorize(
    State(handler): State<Arc<OAuth2Handler>>,
    Path(provider): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let options = AuthorizationOptions {
        state: None,
        pkce_challenge: query.code_challenge.filter(|c| !c.is_empty()),
    };

    match handler.build_authorization_url(&provider, options).await {
        Ok(request) => Json(request).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub code_verifier: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /oauth/callback/{provider}`
async fn handle_callback(
    State(handler): State<Arc<OAuth2Handler>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        // Burn the state so the denied attempt cannot be replayed.
        if let Some(state) = query.state.as_deref() {
            if let Err(e) = handler.consume_state(state).await {
                tracing::debug!(provider = %provider, error = %e, "Denied callback carried no live state");
            }
        }
        tracing::info!(provider = %provider, error = %error, "Provider returned authorization error");
        let message = query.error_description.unwrap_or_else(|| error.clone());
        return error_response(StatusCode::BAD_REQUEST, "access_denied", message);
    }

    let (Some(code), Some(state)) = (query.code, query.state) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request", "code and state are required");
    };

    match handler.complete_callback(&provider, &state, &code, query.code_verifier.as_deref()).await {
        Ok(tokens) => {
            tracing::info!(provider = %provider, "Completed OAuth authorization");
            Json(tokens).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// ─── Refresh / Revoke ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /oauth/{provider}/refresh`
async fn handle_refresh(
    State(handler): State<Arc<OAuth2Handler>>,
    Path(provider): Path<String>,
    Json(req): Json<RefreshRequest>,
) -> Response {
    match handler.refresh(&provider, &req.refresh_token).await {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    /// Fail instead of no-op when the provider cannot revoke.
    #[serde(default)]
    pub strict: bool,
}

/// `POST /oauth/{provider}/revoke`
async fn handle_revoke(
    State(handler): State<Arc<OAuth2Handler>>,
    Path(provider): Path<String>,
    Json(req): Json<RevokeRequest>,
) -> Response {
    let mode = if req.strict { RevokeMode::Strict } else { RevokeMode::Lenient };

    match handler.revoke(&provider, &req.token, mode).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
