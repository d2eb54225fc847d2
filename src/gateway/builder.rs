//! Gateway construction.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheConfig, CacheStore};
use crate::classify::{Classifier, ClassifierConfig};
use crate::config::{Config, DispatchConfig, ProviderConfig};
use crate::providers::{BackendAdapter, HealthPolicy, ProviderRegistry};
use crate::routing::{ProviderSelector, ScoringWeights};
use crate::{BifrostError, Result};

use super::Bifrost;

/// Builder for a [`Bifrost`] gateway.
///
/// Providers can be registered two ways:
/// - [`provider`](Self::provider) pairs declared attributes with an
///   adapter directly;
/// - [`config`](Self::config) loads declared attributes from a [`Config`]
///   and [`adapter`](Self::adapter) supplies the matching adapters, paired
///   by id at [`build`](Self::build) time.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use bifrost::{Bifrost, ProviderConfig, BackendAdapter};
/// # fn adapter() -> Arc<dyn BackendAdapter> { unimplemented!() }
/// # fn provider_config() -> ProviderConfig { unimplemented!() }
/// # fn main() -> bifrost::Result<()> {
/// let gateway = Bifrost::builder()
///     .provider(provider_config(), adapter())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct BifrostBuilder {
    direct: Vec<(ProviderConfig, Arc<dyn BackendAdapter>)>,
    declared: Vec<ProviderConfig>,
    adapters: Vec<Arc<dyn BackendAdapter>>,
    cache: CacheConfig,
    scoring: ScoringWeights,
    health: HealthPolicy,
    classifier: ClassifierConfig,
    dispatch: DispatchConfig,
}

impl Default for BifrostBuilder {
    fn default() -> Self {
        Self {
            direct: Vec::new(),
            declared: Vec::new(),
            adapters: Vec::new(),
            cache: CacheConfig::default(),
            scoring: ScoringWeights::default(),
            health: HealthPolicy::default(),
            classifier: ClassifierConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl BifrostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a loaded [`Config`]: cache, scoring, health, classifier, and
    /// dispatch sections replace the builder's current values, and the
    /// config's provider entries are queued for pairing with adapters
    /// supplied via [`adapter`](Self::adapter).
    pub fn config(mut self, config: Config) -> Self {
        self.cache = config.cache;
        self.scoring = config.scoring;
        self.health = config.health;
        self.classifier = config.classifier;
        self.dispatch = config.dispatch;
        self.declared.extend(config.providers);
        self
    }

    /// Register a provider: declared attributes plus the adapter that
    /// serves it.
    pub fn provider(mut self, config: ProviderConfig, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.direct.push((config, adapter));
        self
    }

    /// Supply an adapter for a provider declared in the [`Config`] passed
    /// to [`config`](Self::config). Paired by `adapter.id()` at build time.
    pub fn adapter(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn scoring(mut self, weights: ScoringWeights) -> Self {
        self.scoring = weights;
        self
    }

    pub fn health(mut self, policy: HealthPolicy) -> Self {
        self.health = policy;
        self
    }

    pub fn classifier(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Timeout for a single dispatch attempt.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.attempt_timeout = timeout;
        self
    }

    /// Overall per-request deadline bounding the whole fallback cascade.
    pub fn request_deadline(mut self, deadline: Duration) -> Self {
        self.dispatch.request_deadline = deadline;
        self
    }

    /// Validate the configuration and construct the gateway.
    pub fn build(self) -> Result<Bifrost> {
        self.scoring.validate()?;

        let mut adapters = self.adapters;
        let mut registry = ProviderRegistry::new(self.health);

        for (config, adapter) in self.direct {
            if adapter.id() != config.id {
                return Err(BifrostError::Configuration(format!(
                    "adapter id '{}' does not match provider config id '{}'",
                    adapter.id(),
                    config.id
                )));
            }
            registry.register(config, adapter)?;
        }

        for config in self.declared {
            let position = adapters.iter().position(|a| a.id() == config.id);
            let Some(position) = position else {
                return Err(BifrostError::Configuration(format!(
                    "no adapter registered for configured provider '{}'",
                    config.id
                )));
            };
            registry.register(config, adapters.swap_remove(position))?;
        }

        if let Some(orphan) = adapters.first() {
            return Err(BifrostError::Configuration(format!(
                "adapter '{}' matches no configured provider",
                orphan.id()
            )));
        }

        if registry.is_empty() {
            return Err(BifrostError::NoProvider);
        }

        Ok(Bifrost::from_parts(
            Classifier::new(self.classifier),
            Arc::new(CacheStore::new(self.cache)),
            Arc::new(registry),
            ProviderSelector::new(self.scoring),
            self.dispatch,
        ))
    }
}
