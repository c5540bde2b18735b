use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

/// One pooled upstream credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub key: String,
}

/// Persistence boundary for everything the gateway's admin surface can change
/// without a restart: the trigger key, the pooled credentials, the fallback
/// credential and the model set that routes to it, and the retry budget.
///
/// This is treated as an external collaborator — the gateway only calls the
/// operations below; how they're durably stored is someone else's concern.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_admin_hash(&self) -> Option<String>;
    async fn set_admin_hash(&self, hash: String);

    async fn get_trigger_key(&self) -> Option<String>;
    async fn set_trigger_key(&self, key: Option<String>);
    async fn is_valid_trigger_key(&self, presented: &str) -> bool;

    async fn get_primary_pool(&self) -> Vec<Credential>;
    async fn add_primary_entries(&self, entries: Vec<Credential>);
    async fn remove_primary_entry(&self, id: &str);
    async fn clear_primary(&self);

    /// Atomically advance the rotation cursor and return the index to use
    /// against a pool of the given length (0 if the pool is empty).
    fn rotate_cursor_atomic(&self, pool_len: usize) -> usize;

    async fn get_fallback_key(&self) -> Option<String>;
    async fn set_fallback_key(&self, key: Option<String>);

    async fn get_fallback_model_set(&self) -> HashSet<String>;
    async fn set_fallback_model_set(&self, models: Vec<String>);
    async fn add_fallback_models(&self, models: Vec<String>);
    async fn clear_fallback_models(&self);

    async fn get_retry_budget(&self) -> u32;
    async fn set_retry_budget(&self, n: u32);
}

/// The bounded number of compare-and-set attempts before falling back to a
/// plain (non-atomic) read-modify-write. Progress is required over strict
/// fairness: under pathological contention we'd rather hand out an
/// occasional duplicate allocation than stall a request.
const MAX_CAS_RETRIES: u32 = 5;

/// A process-local `ConfigStore`. Fine for a single gateway instance; a
/// multi-instance deployment would back this trait with a shared store
/// instead (e.g. a small key-value service) without the gateway noticing.
pub struct InMemoryConfigStore {
    admin_hash: RwLock<Option<String>>,
    trigger_key: RwLock<Option<String>>,
    primary_pool: RwLock<Vec<Credential>>,
    cursor: AtomicUsize,
    fallback_key: RwLock<Option<String>>,
    fallback_model_set: RwLock<HashSet<String>>,
    retry_budget: RwLock<u32>,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            admin_hash: RwLock::new(None),
            trigger_key: RwLock::new(None),
            primary_pool: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            fallback_key: RwLock::new(None),
            fallback_model_set: RwLock::new(HashSet::new()),
            retry_budget: RwLock::new(3),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_admin_hash(&self) -> Option<String> {
        self.admin_hash.read().unwrap().clone()
    }

    async fn set_admin_hash(&self, hash: String) {
        *self.admin_hash.write().unwrap() = Some(hash);
    }

    async fn get_trigger_key(&self) -> Option<String> {
        self.trigger_key.read().unwrap().clone()
    }

    async fn set_trigger_key(&self, key: Option<String>) {
        *self.trigger_key.write().unwrap() = key;
    }

    async fn is_valid_trigger_key(&self, presented: &str) -> bool {
        matches!(self.trigger_key.read().unwrap().as_deref(), Some(k) if k == presented && !k.is_empty())
    }

    async fn get_primary_pool(&self) -> Vec<Credential> {
        self.primary_pool.read().unwrap().clone()
    }

    async fn add_primary_entries(&self, entries: Vec<Credential>) {
        self.primary_pool.write().unwrap().extend(entries);
    }

    async fn remove_primary_entry(&self, id: &str) {
        self.primary_pool.write().unwrap().retain(|c| c.id != id);
    }

    async fn clear_primary(&self) {
        self.primary_pool.write().unwrap().clear();
        self.cursor.store(0, Ordering::Relaxed);
    }

    fn rotate_cursor_atomic(&self, pool_len: usize) -> usize {
        if pool_len == 0 {
            return 0;
        }

        for attempt in 0..MAX_CAS_RETRIES {
            let current = self.cursor.load(Ordering::Acquire);
            let next = current.wrapping_add(1);
            match self
                .cursor
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return current % pool_len,
                Err(_) => {
                    if attempt + 1 < MAX_CAS_RETRIES {
                        std::hint::spin_loop();
                    }
                }
            }
        }

        // Persistent contention: fall back to a non-atomic read-modify-write.
        // May hand out a duplicate index under concurrency, never an omission.
        let current = self.cursor.load(Ordering::Relaxed);
        self.cursor.store(current.wrapping_add(1), Ordering::Relaxed);
        current % pool_len
    }

    async fn get_fallback_key(&self) -> Option<String> {
        self.fallback_key.read().unwrap().clone()
    }

    async fn set_fallback_key(&self, key: Option<String>) {
        *self.fallback_key.write().unwrap() = key;
    }

    async fn get_fallback_model_set(&self) -> HashSet<String> {
        self.fallback_model_set.read().unwrap().clone()
    }

    async fn set_fallback_model_set(&self, models: Vec<String>) {
        *self.fallback_model_set.write().unwrap() = models.into_iter().collect();
    }

    async fn add_fallback_models(&self, models: Vec<String>) {
        self.fallback_model_set.write().unwrap().extend(models);
    }

    async fn clear_fallback_models(&self) {
        self.fallback_model_set.write().unwrap().clear();
    }

    async fn get_retry_budget(&self) -> u32 {
        *self.retry_budget.read().unwrap()
    }

    async fn set_retry_budget(&self, n: u32) {
        *self.retry_budget.write().unwrap() = n.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_visits_every_credential_in_order() {
        let store = InMemoryConfigStore::new();
        let pool_len = 3;
        let picks: Vec<usize> = (0..6).map(|_| store.rotate_cursor_atomic(pool_len)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn rotation_on_empty_pool_returns_zero() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.rotate_cursor_atomic(0), 0);
    }

    #[tokio::test]
    async fn trigger_key_validation() {
        let store = InMemoryConfigStore::new();
        store.set_trigger_key(Some("secret".to_string())).await;
        assert!(store.is_valid_trigger_key("secret").await);
        assert!(!store.is_valid_trigger_key("wrong").await);
    }

    #[tokio::test]
    async fn fallback_model_set_roundtrip() {
        let store = InMemoryConfigStore::new();
        store.set_fallback_model_set(vec!["gemini-pro-preview".to_string()]).await;
        let set = store.get_fallback_model_set().await;
        assert!(set.contains("gemini-pro-preview"));
        store.add_fallback_models(vec!["gemini-ultra".to_string()]).await;
        assert_eq!(store.get_fallback_model_set().await.len(), 2);
        store.clear_fallback_models().await;
        assert!(store.get_fallback_model_set().await.is_empty());
    }
}
