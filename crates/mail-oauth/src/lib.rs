//! Multi-provider OAuth2 for email connections
//!
//! Generates authorization URLs, issues and validates single-use CSRF state,
//! exchanges authorization codes, refreshes and revokes tokens, and supports
//! PKCE, across providers with different endpoints, scopes and revocation
//! support.
//!
//! # Features
//!
//! - **Provider registry**: Gmail, Outlook and Yahoo built in, any RFC 6749 provider configurable
//! - **Single-use state**: one-hour TTL, consumed on first inspection, swept in the background
//! - **PKCE**: S256 challenges per RFC 7636
//! - **Normalized errors**: one error type across heterogeneous provider responses
//!
//! Token persistence is the caller's job.
//!
//! # Example
//!
//! ```no_run
//! use mail_oauth::{AuthorizationOptions, Config, OAuth2Handler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     // Inside the runtime, so expired states are swept until `handler` is dropped.
//!     let handler = OAuth2Handler::new(&config)?;
//!
//!     let request = handler.build_authorization_url("gmail", AuthorizationOptions::default()).await?;
//!     println!("Visit {}", request.url);
//!
//!     // ...after the provider redirects back with `code` and `state`:
//!     let tokens = handler.complete_authorization(&request.state, "code-from-callback", None).await?;
//!     println!("expires in {:?}s", tokens.expires_in);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod pkce;
pub mod provider;
pub mod registry;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::{OAuthError, OAuthResult};
pub use exchange::{TokenExchanger, TokenResult};
pub use handler::{AuthorizationOptions, AuthorizationRequest, OAuth2Handler, RevokeMode};
pub use pkce::PkceChallenge;
pub use provider::ProviderConfig;
pub use registry::ProviderRegistry;
pub use state::{InMemoryStateStore, StateStore, StateValidation};
