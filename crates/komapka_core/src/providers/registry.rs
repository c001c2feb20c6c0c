//! In-process activity provider registry.

use crate::model::entity::Entity;
use crate::providers::ActivityProvider;
use crate::search::normalize::normalize;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Provider registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRegistryError {
    InvalidProviderId(String),
    DuplicateProviderId(String),
    ProviderNotFound(String),
}

impl Display for ProviderRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProviderId(value) => write!(f, "provider id is invalid: {value}"),
            Self::DuplicateProviderId(value) => {
                write!(f, "provider id already registered: {value}")
            }
            Self::ProviderNotFound(value) => write!(f, "provider not found: {value}"),
        }
    }
}

impl Error for ProviderRegistryError {}

/// Registered activity providers, keyed by id.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ActivityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the GoOut and KudyZNudy stand-ins.
    pub fn with_canned_providers() -> Self {
        let mut registry = Self::new();
        let canned: [Arc<dyn ActivityProvider>; 2] = [
            Arc::new(crate::providers::GoOutProvider::new()),
            Arc::new(crate::providers::KudyZNudyProvider::new()),
        ];
        for provider in canned {
            if let Err(err) = registry.register(provider) {
                warn!("event=provider_register module=providers status=error error={}", err);
            }
        }
        registry
    }

    /// Registers one provider.
    pub fn register(
        &mut self,
        provider: Arc<dyn ActivityProvider>,
    ) -> Result<(), ProviderRegistryError> {
        let provider_id = provider.provider_id().trim().to_string();
        if !is_valid_provider_id(&provider_id) {
            return Err(ProviderRegistryError::InvalidProviderId(provider_id));
        }
        if self.providers.contains_key(provider_id.as_str()) {
            return Err(ProviderRegistryError::DuplicateProviderId(provider_id));
        }

        self.providers.insert(provider_id, provider);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns sorted provider ids.
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ActivityProvider>> {
        self.providers.get(provider_id.trim()).cloned()
    }

    /// Fetches from one provider by id.
    pub async fn fetch_from(
        &self,
        provider_id: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Entity>, ProviderRegistryError> {
        let provider = self
            .get(provider_id)
            .ok_or_else(|| ProviderRegistryError::ProviderNotFound(provider_id.trim().to_string()))?;
        match provider.fetch_nearby(latitude, longitude, radius_km).await {
            Ok(entities) => Ok(entities),
            Err(err) => {
                warn!(
                    "event=provider_fetch module=providers status=error provider={} error={}",
                    provider.provider_id(),
                    err
                );
                Ok(Vec::new())
            }
        }
    }

    /// Merges every provider's results in id order, keeping only entities
    /// of `category` when given.
    pub async fn fetch_all_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        category: Option<&str>,
    ) -> Vec<Entity> {
        let wanted = category
            .map(|value| normalize(value.trim()))
            .filter(|value| !value.is_empty());

        let mut merged = Vec::new();
        let mut failures = 0usize;
        for (provider_id, provider) in &self.providers {
            match provider.fetch_nearby(latitude, longitude, radius_km).await {
                Ok(entities) => merged.extend(entities),
                Err(err) => {
                    failures += 1;
                    warn!(
                        "event=provider_fetch module=providers status=error provider={} error={}",
                        provider_id, err
                    );
                }
            }
        }

        if let Some(wanted) = wanted {
            merged.retain(|entity| {
                entity
                    .category
                    .iter()
                    .flatten()
                    .any(|category| normalize(category) == wanted)
            });
        }

        info!(
            "event=provider_fetch_all module=providers status=ok providers={} failures={} results={}",
            self.providers.len(),
            failures,
            merged.len()
        );
        merged
    }
}

fn is_valid_provider_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{ProviderRegistry, ProviderRegistryError};
    use crate::model::entity::Entity;
    use crate::providers::{ActivityProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MockProvider {
        provider_id: String,
        fail: bool,
    }

    impl MockProvider {
        fn new(provider_id: &str) -> Self {
            Self {
                provider_id: provider_id.to_string(),
                fail: false,
            }
        }

        fn failing(provider_id: &str) -> Self {
            Self {
                provider_id: provider_id.to_string(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ActivityProvider for MockProvider {
        fn provider_id(&self) -> &str {
            &self.provider_id
        }

        async fn fetch_nearby(
            &self,
            latitude: f64,
            longitude: f64,
            _radius_km: f64,
        ) -> Result<Vec<Entity>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Unavailable {
                    provider_id: self.provider_id.clone(),
                    message: "offline".to_string(),
                });
            }
            Ok(vec![Entity::with_id(self.provider_id.clone(), "Trh")
                .at(latitude, longitude)
                .in_category("Gastronomie")])
        }
    }

    #[test]
    fn rejects_invalid_or_duplicate_provider_id() {
        let mut registry = ProviderRegistry::new();
        let invalid = registry.register(Arc::new(MockProvider::new("Go Out")));
        assert!(matches!(
            invalid,
            Err(ProviderRegistryError::InvalidProviderId(_))
        ));
        let blank = registry.register(Arc::new(MockProvider::new("   ")));
        assert!(matches!(
            blank,
            Err(ProviderRegistryError::InvalidProviderId(_))
        ));

        registry
            .register(Arc::new(MockProvider::new("farmers_market")))
            .expect("first provider should register");
        let duplicate = registry.register(Arc::new(MockProvider::new(" farmers_market ")));
        assert!(matches!(
            duplicate,
            Err(ProviderRegistryError::DuplicateProviderId(_))
        ));
        assert!(registry.get("  farmers_market  ").is_some());
    }

    #[tokio::test]
    async fn failing_provider_contributes_nothing() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("markets")))
            .expect("provider should register");
        registry
            .register(Arc::new(MockProvider::failing("offline")))
            .expect("provider should register");

        let merged = registry.fetch_all_nearby(50.0, 14.0, 10.0, None).await;
        assert_eq!(merged.len(), 1);

        let single = registry
            .fetch_from("offline", 50.0, 14.0, 10.0)
            .await
            .expect("known provider should not error");
        assert!(single.is_empty());
        let missing = registry.fetch_from("unknown", 50.0, 14.0, 10.0).await;
        assert!(matches!(
            missing,
            Err(ProviderRegistryError::ProviderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn canned_registry_filters_by_category() {
        let registry = ProviderRegistry::with_canned_providers();
        assert_eq!(registry.provider_ids(), vec!["goout", "kudyznudy"]);

        let all = registry.fetch_all_nearby(50.0, 14.0, 10.0, None).await;
        assert_eq!(all.len(), 4);
        let sport = registry.fetch_all_nearby(50.0, 14.0, 10.0, Some("Sport")).await;
        assert_eq!(sport.len(), 1);
        assert_eq!(sport[0].id.as_deref(), Some("kzn2"));
        let blank = registry.fetch_all_nearby(50.0, 14.0, 10.0, Some("  ")).await;
        assert_eq!(blank.len(), 4);
    }
}
