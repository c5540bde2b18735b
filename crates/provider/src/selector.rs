use crate::client::Credential;
use genrelay_core::store::ConfigStore;

/// Chooses which credential a request attempt should use: the fallback
/// credential first when the model is in the fallback set, then a
/// round-robin walk of the primary pool bounded by the retry budget.
///
/// Pure selection lives here; the call-and-retry loop that decides *when*
/// to ask for the next candidate belongs to the dispatcher.
pub struct KeySelector<'a> {
    store: &'a dyn ConfigStore,
}

impl<'a> KeySelector<'a> {
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Self { store }
    }

    /// Returns the fallback credential if `model` is in the fallback-trigger
    /// set and a fallback credential is configured.
    pub async fn pick_fallback_if_applicable(&self, model: &str) -> Option<Credential> {
        let fallback_models = self.store.get_fallback_model_set().await;
        if !fallback_models.contains(model) {
            return None;
        }
        let key = self.store.get_fallback_key().await?;
        Some(Credential { id: "fallback".to_string(), api_key: key, base_url: None })
    }

    /// Advance the rotation cursor and return the next primary-pool
    /// credential not already present in `tried`. Returns `None` once every
    /// credential in the pool has been tried.
    pub async fn pick_from_pool(&self, tried: &[String]) -> Option<Credential> {
        let pool = self.store.get_primary_pool().await;
        if pool.is_empty() {
            return None;
        }

        for _ in 0..pool.len() {
            let idx = self.store.rotate_cursor_atomic(pool.len());
            let candidate = &pool[idx];
            if !tried.contains(&candidate.id) {
                return Some(Credential {
                    id: candidate.id.clone(),
                    api_key: candidate.key.clone(),
                    base_url: None,
                });
            }
        }
        None
    }

    pub async fn retry_budget(&self) -> u32 {
        self.store.get_retry_budget().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genrelay_core::store::{Credential as StoredCredential, InMemoryConfigStore};

    #[tokio::test]
    async fn pool_selection_skips_already_tried() {
        let store = InMemoryConfigStore::new();
        store
            .add_primary_entries(vec![
                StoredCredential { id: "a".into(), key: "ka".into() },
                StoredCredential { id: "b".into(), key: "kb".into() },
            ])
            .await;
        let selector = KeySelector::new(&store);
        let first = selector.pick_from_pool(&[]).await.unwrap();
        let second = selector.pick_from_pool(&[first.id.clone()]).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn fallback_only_applies_to_configured_models() {
        let store = InMemoryConfigStore::new();
        store.set_fallback_key(Some("fallback-key".into())).await;
        store.set_fallback_model_set(vec!["gemini-pro-preview".into()]).await;
        let selector = KeySelector::new(&store);

        assert!(selector.pick_fallback_if_applicable("gemini-pro-preview").await.is_some());
        assert!(selector.pick_fallback_if_applicable("gemini-flash").await.is_none());
    }
}
