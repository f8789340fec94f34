use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Dataset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Disabled providers are known but cannot be queried yet.
    pub enabled: bool,
}

impl Provider {
    fn builtin(
        id: &str,
        name: &str,
        description: &str,
        color: &str,
        website: &str,
        enabled: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            logo_url: None,
            color: color.to_string(),
            website: Some(website.to_string()),
            enabled,
        }
    }
}

/// Catalogue of upstream data providers plus a per-provider dataset count.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
    dataset_counts: BTreeMap<String, usize>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self::new(vec![
            Provider::builtin(
                "ine",
                "INE",
                "Spanish National Statistics Institute",
                "blue",
                "https://www.ine.es",
                true,
            ),
            Provider::builtin(
                "eurostat",
                "Eurostat",
                "European Statistical Office",
                "indigo",
                "https://ec.europa.eu/eurostat",
                false,
            ),
            Provider::builtin(
                "worldbank",
                "World Bank",
                "World Bank Open Data",
                "green",
                "https://data.worldbank.org",
                false,
            ),
        ])
    }

    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers,
            dataset_counts: BTreeMap::new(),
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|provider| provider.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|provider| provider.id == id)
    }

    pub fn is_queryable(&self, id: &str) -> bool {
        self.get(id).map(|provider| provider.enabled).unwrap_or(false)
    }

    /// Provider that datasets without an explicit `provider` field belong to.
    pub fn default_provider(&self) -> Option<&Provider> {
        self.enabled_providers().next()
    }

    pub fn provider_for(&self, dataset: &Dataset) -> Option<&Provider> {
        match dataset.provider.as_deref() {
            Some(id) => self.get(id),
            None => self.default_provider(),
        }
    }

    pub fn datasets_for<'a>(&self, id: &str, datasets: &'a [Dataset]) -> Vec<&'a Dataset> {
        datasets
            .iter()
            .filter(|dataset| {
                self.provider_for(dataset)
                    .map(|provider| provider.id == id)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn dataset_count(&self, id: &str) -> Option<usize> {
        self.dataset_counts.get(id).copied()
    }

    /// Returns `false` when `id` is not a known provider.
    pub fn set_dataset_count(&mut self, id: &str, count: usize) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.dataset_counts.insert(id.to_string(), count);
        true
    }

    /// Recounts datasets per provider from a listing snapshot.
    pub fn annotate_counts(&mut self, datasets: &[Dataset]) {
        let mut counts = BTreeMap::new();
        for dataset in datasets {
            if let Some(provider) = self.provider_for(dataset) {
                *counts.entry(provider.id.clone()).or_insert(0) += 1;
            }
        }
        self.dataset_counts = counts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ine_is_enabled_by_default() {
        let registry = ProviderRegistry::builtin();
        let enabled: Vec<_> = registry.enabled_providers().map(|p| p.id.as_str()).collect();
        assert_eq!(enabled, vec!["ine"]);
        assert!(registry.get("eurostat").is_some());
        assert!(!registry.is_queryable("eurostat"));
        assert!(!registry.is_queryable("unknown"));
    }

    #[test]
    fn unknown_provider_count_is_rejected() {
        let mut registry = ProviderRegistry::builtin();
        assert!(!registry.set_dataset_count("imf", 3));
        assert!(registry.set_dataset_count("worldbank", 3));
        assert_eq!(registry.dataset_count("worldbank"), Some(3));
        assert_eq!(registry.dataset_count("imf"), None);
    }
}
