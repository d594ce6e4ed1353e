//! Per-run memoization of upstream payloads.
//!
//! Each `(namespace, key)` pair owns an async once-cell, so a key is
//! populated at most once per run even when several adapters ask for it
//! concurrently. A failed lookup is stored as `None` and never retried.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::OnceCell;

/// Composite cache key made of every parameter that influences a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    /// Creates a key from its parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Cached outcome: `Some` payload, or `None` for a recorded failure.
type Slot = Arc<OnceCell<Option<Arc<Value>>>>;

/// Namespaced cache scoped to one build invocation.
#[derive(Debug, Default)]
pub struct RunCache {
    namespaces: Mutex<HashMap<String, HashMap<CacheKey, Slot>>>,
}

impl RunCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for a key, creating an empty one if needed.
    fn slot(&self, namespace: &str, key: &CacheKey) -> Slot {
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entries = namespaces.entry(String::from(namespace)).or_default();
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Returns the cached value for `key`, computing it on first use.
    ///
    /// A cached failure (`None`) is returned as-is without calling
    /// `compute` again. Concurrent callers for the same key wait for the
    /// single in-flight computation.
    pub async fn get_or_compute<F, Fut>(
        &self,
        namespace: &str,
        key: &CacheKey,
        compute: F,
    ) -> Option<Arc<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Value>>,
    {
        let slot = self.slot(namespace, key);
        let cached = slot
            .get_or_init(|| async {
                tracing::trace!(%namespace, %key, "Cache miss");
                compute().await.map(Arc::new)
            })
            .await;
        cached.clone()
    }

    /// Number of populated entries in a namespace (including failures).
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        let namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces.get(namespace).map_or(0, |entries| {
            entries.values().filter(|slot| slot.initialized()).count()
        })
    }

    /// Returns `true` if the namespace holds no populated entries.
    #[must_use]
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}
