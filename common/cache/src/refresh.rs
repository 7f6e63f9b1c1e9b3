//! Stale-while-revalidate reads on top of [`CacheStore`].
//!
//! A hit is returned to the caller immediately while a detached task reloads
//! the value through the caller-supplied loader and writes it back for future
//! readers. The caller never waits on that task and never sees its failures.
//! A miss falls back to the classic cache-aside fill: load, store, return.
//!
//! Concurrent misses for the same key each invoke their own loader; there is
//! no request coalescing here. Loaders must be idempotent, must not touch the
//! cache themselves, and should fetch current ground truth.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use crate::keys::Namespace;
use crate::store::CacheStore;

#[derive(Clone)]
pub struct RefreshCoordinator {
    store: CacheStore,
}

impl RefreshCoordinator {
    pub fn new(store: CacheStore) -> Self {
        RefreshCoordinator { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Read `key`, serving a cached value when one exists.
    ///
    /// On a hit the cached value is returned right away (the caller's
    /// latency is bounded by the backend round trip) and the loader runs on
    /// a detached task whose result is written back and whose errors are
    /// logged, never surfaced. On a miss the loader runs inline; its errors
    /// propagate because there is no value to fall back on.
    ///
    /// The loader is invoked at most once per call. Callers must not assume
    /// the refresh has landed by the time they read the key again; a refresh
    /// may complete before, during, or after this call returns.
    pub async fn get_or_refresh<T, E, F, Fut>(
        &self,
        key: &str,
        namespace: Namespace,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if let Some(cached) = self.store.get::<T>(key, namespace).await {
            self.spawn_refresh(key.to_string(), namespace, loader);
            return Ok(cached);
        }

        let fresh = loader().await?;
        self.store.set(key, &fresh, namespace).await;
        Ok(fresh)
    }

    fn spawn_refresh<T, E, F, Fut>(&self, key: String, namespace: Namespace, loader: F)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::spawn(async move {
            match loader().await {
                Ok(fresh) => {
                    if store.set(&key, &fresh, namespace).await {
                        debug!(key = key.as_str(), "background refresh stored fresh value");
                    }
                }
                Err(err) => {
                    warn!(key = key.as_str(), error = %err, "background refresh failed");
                }
            }
        });
    }
}
