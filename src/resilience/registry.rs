//! One circuit breaker per dependency name.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{BreakerConfig, CoreConfig};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::store::StoreHandle;

/// Lazily-populated map of breakers, shared by every caller in the process.
///
/// Breakers for different dependencies never contend with each other.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: BreakerConfig,
    overrides: BTreeMap<String, BreakerConfig>,
    store: StoreHandle,
}

impl BreakerRegistry {
    pub fn new(config: &CoreConfig, store: StoreHandle) -> Self {
        let overrides = config
            .dependencies
            .iter()
            .filter_map(|(name, dep)| dep.breaker.clone().map(|b| (name.clone(), b)))
            .collect();

        Self {
            breakers: DashMap::new(),
            defaults: config.breaker.clone(),
            overrides,
            store,
        }
    }

    /// The breaker for `dependency`, created on first use.
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return existing.clone();
        }

        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                tracing::debug!(dependency = %dependency, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(
                    dependency,
                    self.config_for(dependency).clone(),
                    self.store.clone(),
                ))
            })
            .clone()
    }

    /// The breaker for `dependency`, only if it already exists.
    pub fn find(&self, dependency: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(dependency).map(|b| b.clone())
    }

    /// Whether `dependency` has a configured override.
    pub fn is_configured(&self, dependency: &str) -> bool {
        self.overrides.contains_key(dependency)
    }

    pub fn config_for(&self, dependency: &str) -> &BreakerConfig {
        self.overrides.get(dependency).unwrap_or(&self.defaults)
    }

    /// Snapshots of every live breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
