//! Read-only catalog of configured providers.

use std::collections::HashMap;

use crate::error::{OAuthError, OAuthResult};
use crate::provider::ProviderConfig;

/// Provider lookup by key, preserving registration order.
///
/// Built once at startup and never mutated, so it can be shared behind an
/// `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
    by_key: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Build a registry. A repeated key replaces the earlier config in place.
    #[must_use]
    pub fn new(providers: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let mut registry = Self::default();
        for provider in providers {
            registry.insert(provider);
        }
        registry
    }

    fn insert(&mut self, provider: ProviderConfig) {
        if let Some(&idx) = self.by_key.get(&provider.key) {
            self.providers[idx] = provider;
        } else {
            self.by_key.insert(provider.key.clone(), self.providers.len());
            self.providers.push(provider);
        }
    }

    /// Look up a provider.
    pub fn get(&self, key: &str) -> OAuthResult<&ProviderConfig> {
        self.by_key
            .get(key)
            .map(|&idx| &self.providers[idx])
            .ok_or_else(|| OAuthError::unknown_provider(key))
    }

    /// Look up a provider that has client credentials.
    pub fn get_configured(&self, key: &str) -> OAuthResult<&ProviderConfig> {
        let provider = self.get(key)?;
        if !provider.has_credentials() {
            return Err(OAuthError::missing_credentials(key));
        }
        Ok(provider)
    }

    /// True only if the provider exists and has both client id and secret.
    #[must_use]
    pub fn is_configured(&self, key: &str) -> bool {
        self.get(key).is_ok_and(ProviderConfig::has_credentials)
    }

    /// All provider keys in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.key.as_str()).collect()
    }

    /// Keys of providers that can actually be offered to users.
    #[must_use]
    pub fn configured(&self) -> Vec<&str> {
        self.providers.iter().filter(|p| p.has_credentials()).map(|p| p.key.as_str()).collect()
    }

    /// Iterate over all provider configs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
