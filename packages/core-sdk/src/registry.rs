use std::sync::Arc;

use reqwest::Url;

use crate::error::{RegistryError, StorageError, ValidationError};
use crate::models::{Provider, ProviderSummary};
use crate::store::RecordStore;
use crate::token::resolve_token;

/**
 * \brief Check a provider against the validity predicate.
 * \details model and url must be non-blank, url must be an absolute http(s) URL and the
 *          token must resolve to a non-empty secret.
 */
pub fn validate(provider: &Provider) -> Result<(), ValidationError> {
    if provider.model.trim().is_empty() {
        return Err(ValidationError::new("provide a model name"));
    }
    if provider.url.trim().is_empty() {
        return Err(ValidationError::new("provide the endpoint URL"));
    }
    match Url::parse(provider.url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(ValidationError::new(
                "endpoint URL must be an absolute http(s) URL",
            ))
        }
    }
    if provider.token.trim().is_empty() {
        return Err(ValidationError::new("provide a token"));
    }
    if resolve_token(&provider.token).trim().is_empty() {
        return Err(ValidationError::new(
            "token references an environment variable that is not set",
        ));
    }
    Ok(())
}

pub fn is_valid(provider: &Provider) -> bool {
    validate(provider).is_ok()
}

/**
 * \brief Provider configurations keyed by model, backed by a whole-document store.
 */
#[derive(Clone)]
pub struct ProviderRegistry {
    store: Arc<dyn RecordStore<Provider>>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn RecordStore<Provider>>) -> Self {
        Self { store }
    }

    /**
     * \brief Valid providers in stored order, tokens stripped.
     */
    pub fn list_valid_providers(&self) -> Result<Vec<ProviderSummary>, StorageError> {
        Ok(self
            .store
            .load()?
            .iter()
            .filter(|p| is_valid(p))
            .map(Provider::summary)
            .collect())
    }

    /**
     * \brief Add or replace the provider for `model`.
     * \details The store is left untouched when validation fails. A replaced entry moves
     *          to the end of the sequence.
     */
    pub fn add_provider(
        &self,
        model: &str,
        url: &str,
        token: &str,
    ) -> Result<ProviderSummary, RegistryError> {
        let candidate = Provider {
            model: model.trim().to_string(),
            url: url.trim().to_string(),
            token: token.trim().to_string(),
        };
        validate(&candidate)?;

        let mut providers = self.store.load()?;
        providers.retain(|p| p.model != candidate.model);
        let summary = candidate.summary();
        providers.push(candidate);
        self.store.save(&providers)?;
        Ok(summary)
    }

    /**
     * \brief Raw lookup in the unfiltered store; the result may be invalid.
     */
    pub fn find(&self, model: &str) -> Result<Option<Provider>, StorageError> {
        Ok(self.store.load()?.into_iter().find(|p| p.model == model))
    }
}
