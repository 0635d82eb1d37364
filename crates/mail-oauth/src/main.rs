//! mail-oauth - Entry Point
//!
//! Runs the OAuth HTTP surface or performs one-off token operations.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mail_oauth::{AuthorizationOptions, Config, OAuth2Handler, PkceChallenge, RevokeMode, server};

#[derive(Parser, Debug)]
#[command(name = "mail-oauth")]
#[command(about = "OAuth2 authorization and token lifecycle for email providers")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the OAuth HTTP endpoints
    Serve {
        /// HTTP server port
        #[arg(long, default_value = "8000", env = "PORT")]
        port: u16,
    },
    /// List providers and whether they are configured
    Providers,
    /// Print an authorization URL for a provider
    AuthorizeUrl {
        provider: String,
        /// Include a PKCE challenge and print the verifier
        #[arg(long)]
        pkce: bool,
    },
    /// Exchange a refresh token for a new access token
    Refresh { provider: String, refresh_token: String },
    /// Revoke a token
    Revoke {
        provider: String,
        token: String,
        /// Fail if the provider has no revocation endpoint
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let config = Config::from_env()?;
    let handler = Arc::new(OAuth2Handler::new(&config)?);

    match cli.command {
        Command::Serve { port } => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting mail-oauth server");
            server::run_http(handler, port).await?;
        }
        Command::Providers => {
            for provider in handler.registry().iter() {
                let status = if provider.has_credentials() { "configured" } else { "missing credentials" };
                println!("{:<10} {:<12} {}", provider.key, provider.display_name, status);
            }
        }
        Command::AuthorizeUrl { provider, pkce } => {
            let challenge = pkce.then(PkceChallenge::generate);
            let options = challenge.as_ref().map(AuthorizationOptions::with_pkce).unwrap_or_default();

            let request = handler.build_authorization_url(&provider, options).await?;
            println!("url:           {}", request.url);
            println!("state:         {}", request.state);
            if let Some(challenge) = challenge {
                println!("code_verifier: {}", challenge.code_verifier);
            }
        }
        Command::Refresh { provider, refresh_token } => {
            let tokens = handler.refresh(&provider, &refresh_token).await?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            if !tokens.has_new_refresh_token() {
                eprintln!("note: no new refresh token issued; keep the existing one");
            }
        }
        Command::Revoke { provider, token, strict } => {
            let mode = if strict { RevokeMode::Strict } else { RevokeMode::Lenient };
            handler.revoke(&provider, &token, mode).await?;
            println!("revoked");
        }
    }

    Ok(())
}
