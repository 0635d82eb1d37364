//! PKCE (Proof Key for Code Exchange) generation and verification.
//!
//! Implements the S256 method per RFC 7636. The verifier stays with the caller
//! across the redirect; only the challenge goes into the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind a code verifier (43 base64url chars).
const VERIFIER_BYTES: usize = 32;

/// The only challenge method this crate emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// A PKCE verifier/challenge pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// High-entropy secret presented at token exchange.
    pub code_verifier: String,
    /// `BASE64URL(SHA256(code_verifier))`, sent with the authorization request.
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut random = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut random);

        let code_verifier = URL_SAFE_NO_PAD.encode(random);
        let code_challenge = challenge_for(&code_verifier);

        Self { code_verifier, code_challenge }
    }

    /// Challenge method name, always `S256`.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

/// Generate a fresh verifier/challenge pair.
#[must_use]
pub fn generate_challenge() -> PkceChallenge {
    PkceChallenge::generate()
}

/// Compute the S256 challenge for a verifier.
#[must_use]
pub fn challenge_for(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verify a PKCE S256 code challenge.
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    challenge_for(code_verifier) == code_challenge
}
