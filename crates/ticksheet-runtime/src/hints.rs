//! Cached hint lookups.
//!
//! Hint queries hit the learning store once per distinct source text and are
//! then served from an in-memory cache. Hints only bias prompting, so a
//! short staleness window is acceptable by contract.

use crate::store::{LearningStore, StoreError};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use ticksheet_core::learn::{content_hash, Hint};
use ticksheet_core::types::Language;
use tracing::debug;

const CACHE_CAPACITY: u64 = 1024;
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Moka-backed cache in front of [`LearningStore::get_learned_matches`].
pub struct HintCache {
    store: Arc<LearningStore>,
    cache: Cache<String, Arc<Vec<Hint>>>,
}

impl HintCache {
    pub fn new(store: Arc<LearningStore>) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Ranked hints for a source text, cached per (text, language) pair.
    pub async fn hints_for(
        &self,
        text: &str,
        language: Language,
        threshold: f64,
    ) -> Result<Arc<Vec<Hint>>, StoreError> {
        let key = format!("{}:{}", language, content_hash(text));

        if let Some(cached) = self.cache.get(&key).await {
            debug!(key = %key, "hint cache hit");
            return Ok(cached);
        }

        let hints = Arc::new(self.store.get_learned_matches(text, language, threshold)?);
        self.cache.insert(key, Arc::clone(&hints)).await;
        Ok(hints)
    }

    /// Drop all cached lookups (after a review pass wrote new knowledge).
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
