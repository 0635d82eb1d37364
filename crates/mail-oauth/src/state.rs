//! Single-use, time-bounded CSRF state tokens.
//!
//! A state is issued when an authorization URL is built and consumed when the
//! provider redirects back. Consumption always deletes the entry, so a second
//! validation with the same token is invalid no matter how the first one went.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};

/// State lifetime: 1 hour.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(3600);
/// Sweep interval: 1 hour.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Random bytes behind a state token.
const STATE_BYTES: usize = 32;

/// A pending authorization attempt.
#[derive(Debug, Clone)]
pub struct OAuthState {
    pub provider: String,
    pub issued_at: DateTime<Utc>,
}

/// Outcome of consuming a state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValidation {
    /// Fresh and now consumed.
    Valid {
        /// Provider the state was issued for
        provider: String,
    },
    /// Known but older than the TTL. Consumed as well.
    Expired,
    /// Never issued, already consumed, or swept.
    Unknown,
}

impl StateValidation {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Provider key, present only when valid.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Valid { provider } => Some(provider),
            Self::Expired | Self::Unknown => None,
        }
    }
}

/// Storage for CSRF state tokens.
///
/// Implementations must serialize all mutations so that a token can be
/// consumed exactly once under concurrent callers.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Issue a new random state bound to `provider`.
    async fn generate_state(&self, provider: &str) -> String;

    /// Look up and remove a state.
    async fn validate_state(&self, token: &str) -> StateValidation;

    /// Remove every state older than the TTL. Returns how many were removed.
    async fn sweep_expired(&self) -> usize;

    /// Number of outstanding states.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Generate a URL-safe random state token.
fn generate_token() -> String {
    let mut random = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut random);
    URL_SAFE_NO_PAD.encode(random)
}

/// In-memory state store following the `OAuthStore` pattern: one map behind
/// one lock.
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, OAuthState>>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl InMemoryStateStore {
    /// Store on the system clock with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DEFAULT_STATE_TTL)
    }

    /// Store with an explicit clock and TTL.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn is_expired(&self, state: &OAuthState, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(state.issued_at) > self.ttl
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn generate_state(&self, provider: &str) -> String {
        let token = generate_token();
        let state = OAuthState { provider: provider.to_owned(), issued_at: self.clock.now() };

        self.states.write().await.insert(token.clone(), state);
        tracing::debug!(provider = %provider, "Issued OAuth state");

        token
    }

    async fn validate_state(&self, token: &str) -> StateValidation {
        let Some(state) = self.states.write().await.remove(token) else {
            return StateValidation::Unknown;
        };

        if self.is_expired(&state, self.clock.now()) {
            tracing::debug!(provider = %state.provider, "Rejected expired OAuth state");
            return StateValidation::Expired;
        }

        StateValidation::Valid { provider: state.provider }
    }

    async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, state| !self.is_expired(state, now));
        before - states.len()
    }

    async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Start a background task that sweeps expired states every `every`.
///
/// The first sweep runs immediately.
pub fn spawn_sweeper(store: Arc<dyn StateStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.sweep_expired().await;
            if removed > 0 {
                tracing::debug!(count = removed, "Cleaned up expired OAuth states");
            }
        }
    })
}
