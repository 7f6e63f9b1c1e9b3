//! The sole gateway to the cache backend.
//!
//! Every operation degrades to its documented empty default (`None`,
//! `false`, an all-`None` batch) when the cache is disabled, disconnected,
//! or the backend call fails. Caching must never become a new source of
//! outage: to a caller, a broken cache is indistinguishable from a cold one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use common_redis::{Client, RedisClient, RedisClientError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::keys::{physical_key, physical_pattern, Namespace};
use crate::serializer;

/// Keys requested per SCAN step during pattern deletes.
const SCAN_PAGE_SIZE: usize = 100;
/// First delay of the connection backoff schedule.
const CONNECT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Ceiling of the connection backoff schedule.
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(3);

const READS_COUNTER: &str = "cache_store_reads_total";
const ERRORS_COUNTER: &str = "cache_store_errors_total";

/// Handle to the cache. Cheap to clone; all clones share the same backend
/// connection and enabled state.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

struct Inner {
    schema_version: String,
    enabled: AtomicBool,
    connecting: AtomicBool,
    client: RwLock<Option<Arc<dyn Client + Send + Sync>>>,
    // retained so a later enable can re-trigger connection setup
    config: Option<CacheConfig>,
}

impl CacheStore {
    /// Wrap an existing backend client. For tests and callers that manage
    /// their own connection; the store starts enabled and connected.
    pub fn with_client(
        client: Arc<dyn Client + Send + Sync>,
        schema_version: impl Into<String>,
    ) -> Self {
        CacheStore {
            inner: Arc::new(Inner {
                schema_version: schema_version.into(),
                enabled: AtomicBool::new(true),
                connecting: AtomicBool::new(false),
                client: RwLock::new(Some(client)),
                config: None,
            }),
        }
    }

    /// Build a store from configuration and start connecting to the backend.
    ///
    /// The first attempt happens inline; on failure the remaining attempts
    /// run on a detached task with capped exponential backoff, after which
    /// the store stays disconnected (all operations return their empty
    /// defaults) until [`CacheStore::set_enabled`] re-triggers setup.
    pub async fn connect(config: CacheConfig) -> Self {
        let store = CacheStore {
            inner: Arc::new(Inner {
                schema_version: config.schema_version.clone(),
                enabled: AtomicBool::new(config.enabled),
                connecting: AtomicBool::new(false),
                client: RwLock::new(None),
                config: Some(config),
            }),
        };
        if store.is_enabled() && !store.inner.try_connect_once().await {
            store.spawn_connect();
        }
        store
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Turn caching on or off without tearing anything else down. Toggling
    /// to the current state is a no-op; enabling while disconnected
    /// re-triggers connection setup.
    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if was_enabled == enabled {
            return;
        }
        info!(enabled, "cache toggled");
        if enabled && !self.is_connected() {
            self.spawn_connect();
        }
    }

    pub fn schema_version(&self) -> &str {
        &self.inner.schema_version
    }

    fn is_connected(&self) -> bool {
        self.inner.read_client_slot().is_some()
    }

    fn current_client(&self) -> Option<Arc<dyn Client + Send + Sync>> {
        if !self.is_enabled() {
            return None;
        }
        self.inner.read_client_slot()
    }

    fn spawn_connect(&self) {
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            return; // a connect loop is already running
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_connect_loop().await;
            inner.connecting.store(false, Ordering::SeqCst);
        });
    }

    fn key(&self, namespace: Namespace, logical_key: &str) -> String {
        physical_key(&self.inner.schema_version, namespace, logical_key)
    }

    fn pattern(&self, namespace: Namespace, logical_pattern: &str) -> String {
        physical_pattern(&self.inner.schema_version, namespace, logical_pattern)
    }

    /// Fetch and decode a single value. `None` on miss, on decode error, and
    /// whenever the backend is unavailable.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, namespace: Namespace) -> Option<T> {
        let client = self.current_client()?;
        match client.get(self.key(namespace, key)).await {
            Ok(raw) => match serializer::deserialize(&raw) {
                Ok(value) => {
                    metrics::counter!(READS_COUNTER, "namespace" => namespace.prefix, "outcome" => "hit")
                        .increment(1);
                    Some(value)
                }
                Err(err) => {
                    // corrupt or schema-mismatched payloads read as misses
                    warn!(key, error = %err, "dropping undecodable cache entry");
                    metrics::counter!(READS_COUNTER, "namespace" => namespace.prefix, "outcome" => "decode_error")
                        .increment(1);
                    None
                }
            },
            Err(RedisClientError::NotFound) => {
                metrics::counter!(READS_COUNTER, "namespace" => namespace.prefix, "outcome" => "miss")
                    .increment(1);
                None
            }
            Err(err) => {
                error!(op = "get", key, error = %err, "cache backend error");
                metrics::counter!(ERRORS_COUNTER, "op" => "get").increment(1);
                None
            }
        }
    }

    /// Serialize and store a value with the namespace TTL. `false` on any
    /// failure.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, namespace: Namespace) -> bool {
        let Some(client) = self.current_client() else {
            return false;
        };
        let payload = match serializer::serialize(value) {
            Ok(payload) => payload,
            Err(err) => {
                error!(key, error = %err, "failed to serialize value for cache");
                return false;
            }
        };
        match client
            .set_ex(self.key(namespace, key), payload, namespace.ttl_seconds)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(op = "set", key, error = %err, "cache backend error");
                metrics::counter!(ERRORS_COUNTER, "op" => "set").increment(1);
                false
            }
        }
    }

    /// Returns true only if a key was actually removed.
    pub async fn delete(&self, key: &str, namespace: Namespace) -> bool {
        let Some(client) = self.current_client() else {
            return false;
        };
        match client.del(self.key(namespace, key)).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(op = "delete", key, error = %err, "cache backend error");
                false
            }
        }
    }

    /// Delete every key matching `pattern` within the namespace.
    ///
    /// Walks the keyspace with a cursor-based scan in pages of
    /// [`SCAN_PAGE_SIZE`], accumulating matches until the backend signals
    /// completion, then issues one bulk delete. A cursor that fails to
    /// advance stops the walk rather than looping forever. Returns `false`
    /// when nothing matched.
    pub async fn delete_by_pattern(&self, pattern: &str, namespace: Namespace) -> bool {
        let Some(client) = self.current_client() else {
            return false;
        };
        let physical = self.pattern(namespace, pattern);

        let mut cursor = 0u64;
        let mut matched: Vec<String> = Vec::new();
        loop {
            match client
                .scan_page(cursor, physical.clone(), SCAN_PAGE_SIZE)
                .await
            {
                Ok((next, page)) => {
                    matched.extend(page);
                    if next == 0 {
                        break;
                    }
                    if next == cursor {
                        warn!(pattern, cursor, "scan cursor did not advance; stopping early");
                        break;
                    }
                    cursor = next;
                }
                Err(err) => {
                    error!(op = "delete_by_pattern", pattern, error = %err, "cache backend error");
                    return false;
                }
            }
        }

        if matched.is_empty() {
            return false;
        }
        match client.del_many(matched).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                error!(op = "delete_by_pattern", pattern, error = %err, "cache backend error");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str, namespace: Namespace) -> bool {
        let Some(client) = self.current_client() else {
            return false;
        };
        match client.exists(self.key(namespace, key)).await {
            Ok(found) => found,
            Err(err) => {
                error!(op = "exists", key, error = %err, "cache backend error");
                false
            }
        }
    }

    /// Atomically add `delta` to the counter at `key`, re-applying the
    /// namespace TTL on every call; repeated increments keep restarting the
    /// window, which is what rate-limit counters want.
    pub async fn increment(&self, key: &str, delta: i64, namespace: Namespace) -> Option<i64> {
        let client = self.current_client()?;
        match client
            .incr_by_expire(self.key(namespace, key), delta, namespace.ttl_seconds)
            .await
        {
            Ok(count) => Some(count),
            Err(err) => {
                error!(op = "increment", key, error = %err, "cache backend error");
                None
            }
        }
    }

    /// Fetch many keys in one round trip. The result always has exactly one
    /// slot per requested key, in request order; absent or undecodable
    /// entries are `None`, and a failed round trip yields all-`None`.
    pub async fn batch_get<T: DeserializeOwned>(
        &self,
        keys: &[String],
        namespace: Namespace,
    ) -> Vec<Option<T>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let all_null = || keys.iter().map(|_| None).collect::<Vec<Option<T>>>();
        let Some(client) = self.current_client() else {
            return all_null();
        };
        let physical = keys.iter().map(|k| self.key(namespace, k)).collect();
        match client.mget(physical).await {
            Ok(slots) if slots.len() == keys.len() => slots
                .into_iter()
                .zip(keys)
                .map(|(slot, key)| {
                    slot.and_then(|raw| match serializer::deserialize(&raw) {
                        Ok(value) => Some(value),
                        Err(err) => {
                            warn!(key = key.as_str(), error = %err, "dropping undecodable cache entry");
                            None
                        }
                    })
                })
                .collect(),
            Ok(slots) => {
                error!(
                    expected = keys.len(),
                    got = slots.len(),
                    "mget reply arity does not match request"
                );
                all_null()
            }
            Err(err) => {
                error!(op = "batch_get", error = %err, "cache backend error");
                all_null()
            }
        }
    }

    /// Write many entries in one round trip, then apply the namespace TTL to
    /// every key as a second pipelined step (bulk-set-with-TTL is not a
    /// single backend primitive). Returns `true` iff the bulk write itself
    /// succeeded; a failed TTL step is logged only, leaving those entries
    /// without expiry.
    pub async fn batch_set<T: Serialize>(
        &self,
        entries: &[(String, T)],
        namespace: Namespace,
    ) -> bool {
        if entries.is_empty() {
            return false;
        }
        let Some(client) = self.current_client() else {
            return false;
        };

        let mut pairs = Vec::with_capacity(entries.len());
        let mut physical_keys = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let payload = match serializer::serialize(value) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(key = key.as_str(), error = %err, "failed to serialize value for cache");
                    return false;
                }
            };
            let physical = self.key(namespace, key);
            physical_keys.push(physical.clone());
            pairs.push((physical, payload));
        }

        if let Err(err) = client.mset(pairs).await {
            error!(op = "batch_set", error = %err, "cache backend error");
            return false;
        }
        if let Err(err) = client
            .expire_many(physical_keys, namespace.ttl_seconds)
            .await
        {
            warn!(op = "batch_set", error = %err, "bulk write succeeded but TTL application failed");
        }
        true
    }

    /// `true` when the cache is disabled (its absence is healthy by design)
    /// or a live ping succeeds.
    pub async fn health_check(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let Some(client) = self.inner.read_client_slot() else {
            return false;
        };
        match client.ping().await {
            Ok(()) => true,
            Err(err) => {
                error!(op = "health_check", error = %err, "cache backend error");
                false
            }
        }
    }

    /// Flush the entire backend database. Maintenance and test tooling only;
    /// vacuously succeeds when the cache is disabled or disconnected.
    pub async fn clear_all(&self) -> bool {
        let Some(client) = self.current_client() else {
            return true;
        };
        match client.flush_db().await {
            Ok(()) => true,
            Err(err) => {
                error!(op = "clear_all", error = %err, "cache backend error");
                false
            }
        }
    }
}

impl Inner {
    fn read_client_slot(&self) -> Option<Arc<dyn Client + Send + Sync>> {
        match self.client.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn install_client(&self, client: Arc<dyn Client + Send + Sync>) {
        let mut slot = match self.client.write() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(client);
    }

    async fn try_connect_once(&self) -> bool {
        let Some(config) = &self.config else {
            return false;
        };
        match RedisClient::with_config(
            config.connection_url(),
            config.response_timeout(),
            config.connection_timeout(),
        )
        .await
        {
            Ok(client) => {
                info!("redis connected");
                self.install_client(Arc::new(client));
                true
            }
            Err(err) => {
                warn!(error = %err, "redis connection attempt failed");
                false
            }
        }
    }

    async fn run_connect_loop(&self) {
        let Some(config) = &self.config else {
            return;
        };
        let mut delay = CONNECT_BASE_DELAY;
        for attempt in 1..=config.connect_max_retries {
            if !self.enabled.load(Ordering::Relaxed) {
                debug!("cache disabled; abandoning reconnect");
                return;
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(CONNECT_MAX_DELAY);
            if self.try_connect_once().await {
                info!(attempt, "redis connected after retry");
                return;
            }
        }
        error!(
            attempts = config.connect_max_retries,
            "giving up on redis; cache stays disconnected until re-enabled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Timestamp;
    use common_redis::MockRedisClient;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
    struct Profile {
        id: String,
        display_name: String,
        last_seen: Timestamp,
    }

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            display_name: format!("user {id}"),
            last_seen: Timestamp::now(),
        }
    }

    fn store_with(mock: &MockRedisClient) -> CacheStore {
        CacheStore::with_client(Arc::new(mock.clone()), "1.0.0")
    }

    mod single_key {
        use super::*;

        #[tokio::test]
        async fn set_then_get_round_trips() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            let value = profile("42");

            assert!(store.set("42", &value, Namespace::USER).await);
            let cached: Option<Profile> = store.get("42", Namespace::USER).await;
            assert_eq!(cached, Some(value));
        }

        #[tokio::test]
        async fn get_missing_returns_none() {
            let store = store_with(&MockRedisClient::new());
            let cached: Option<Profile> = store.get("nope", Namespace::USER).await;
            assert_eq!(cached, None);
        }

        #[tokio::test]
        async fn undecodable_entries_read_as_misses() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            mock.insert_raw(
                physical_key("1.0.0", Namespace::USER, "42"),
                "{corrupt json",
                None,
            );

            let cached: Option<Profile> = store.get("42", Namespace::USER).await;
            assert_eq!(cached, None);
        }

        #[tokio::test]
        async fn set_applies_the_namespace_ttl() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            assert!(store.set("42", &profile("42"), Namespace::USER).await);

            let ttl = mock
                .ttl_of(&physical_key("1.0.0", Namespace::USER, "42"))
                .expect("entry should carry a ttl");
            assert!(ttl <= Duration::from_secs(Namespace::USER.ttl_seconds));
            assert!(ttl > Duration::from_secs(Namespace::USER.ttl_seconds - 5));
        }

        #[tokio::test]
        async fn delete_reports_whether_a_key_was_removed() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            store.set("42", &profile("42"), Namespace::USER).await;

            assert!(store.delete("42", Namespace::USER).await);
            assert!(!store.delete("42", Namespace::USER).await);
        }

        #[tokio::test]
        async fn exists_reflects_presence() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            assert!(!store.exists("42", Namespace::USER).await);
            store.set("42", &profile("42"), Namespace::USER).await;
            assert!(store.exists("42", Namespace::USER).await);
        }
    }

    mod versioning {
        use super::*;

        #[tokio::test]
        async fn values_written_under_one_version_are_invisible_to_another() {
            let mock = MockRedisClient::new();
            let v1 = store_with(&mock);
            let v2 = CacheStore::with_client(Arc::new(mock.clone()), "2.0.0");

            assert!(v1.set("42", &profile("42"), Namespace::USER).await);
            let from_v2: Option<Profile> = v2.get("42", Namespace::USER).await;
            assert_eq!(from_v2, None);

            let from_v1: Option<Profile> = v1.get("42", Namespace::USER).await;
            assert!(from_v1.is_some());
        }
    }

    mod expiry {
        use super::*;

        const BLINK: Namespace = Namespace::new(1, "storefront:blink:");

        #[tokio::test]
        async fn entries_disappear_after_their_ttl() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);

            assert!(store.set("k", &"v".to_string(), BLINK).await);
            assert!(store.exists("k", BLINK).await);

            tokio::time::sleep(Duration::from_millis(1200)).await;
            assert!(!store.exists("k", BLINK).await);
            let cached: Option<String> = store.get("k", BLINK).await;
            assert_eq!(cached, None);
        }
    }

    mod counters {
        use super::*;

        #[tokio::test]
        async fn increments_accumulate() {
            let store = store_with(&MockRedisClient::new());
            assert_eq!(
                store.increment("hits", 1, Namespace::RATE_LIMIT).await,
                Some(1)
            );
            assert_eq!(
                store.increment("hits", 1, Namespace::RATE_LIMIT).await,
                Some(2)
            );
            assert_eq!(
                store.increment("hits", 5, Namespace::RATE_LIMIT).await,
                Some(7)
            );
        }

        #[tokio::test]
        async fn every_increment_restarts_the_ttl_window() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            let physical = physical_key("1.0.0", Namespace::RATE_LIMIT, "hits");

            store.increment("hits", 1, Namespace::RATE_LIMIT).await;
            tokio::time::sleep(Duration::from_millis(1000)).await;
            store.increment("hits", 1, Namespace::RATE_LIMIT).await;

            // the second increment resets the 60s window; a decayed ttl
            // would be around 59s here
            let ttl = mock.ttl_of(&physical).expect("counter should carry a ttl");
            assert!(ttl > Duration::from_millis(59_500), "ttl decayed: {ttl:?}");
        }

        #[tokio::test]
        async fn incrementing_a_non_numeric_value_returns_none() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            mock.insert_raw(
                physical_key("1.0.0", Namespace::RATE_LIMIT, "hits"),
                "not-a-number",
                None,
            );
            assert_eq!(store.increment("hits", 1, Namespace::RATE_LIMIT).await, None);
        }
    }

    mod batches {
        use super::*;

        #[tokio::test]
        async fn batch_get_preserves_request_order_with_gaps() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            let first = profile("1");
            let third = profile("3");
            store.set("1", &first, Namespace::USER).await;
            store.set("3", &third, Namespace::USER).await;

            let keys = vec!["1".to_string(), "2".to_string(), "3".to_string()];
            let got: Vec<Option<Profile>> = store.batch_get(&keys, Namespace::USER).await;
            assert_eq!(got, vec![Some(first), None, Some(third)]);
        }

        #[tokio::test]
        async fn batch_get_of_nothing_is_empty() {
            let store = store_with(&MockRedisClient::new());
            let got: Vec<Option<Profile>> = store.batch_get(&[], Namespace::USER).await;
            assert!(got.is_empty());
        }

        #[tokio::test]
        async fn batch_get_backend_failure_yields_all_null() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            store.set("1", &profile("1"), Namespace::USER).await;
            mock.fail_op("mget", RedisClientError::Timeout);

            let keys = vec!["1".to_string(), "2".to_string()];
            let got: Vec<Option<Profile>> = store.batch_get(&keys, Namespace::USER).await;
            assert_eq!(got, vec![None, None]);
        }

        #[tokio::test]
        async fn undecodable_batch_slots_are_null_without_failing_the_rest() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            let good = profile("1");
            store.set("1", &good, Namespace::USER).await;
            mock.insert_raw(physical_key("1.0.0", Namespace::USER, "2"), "garbage", None);

            let keys = vec!["1".to_string(), "2".to_string()];
            let got: Vec<Option<Profile>> = store.batch_get(&keys, Namespace::USER).await;
            assert_eq!(got, vec![Some(good), None]);
        }

        #[tokio::test]
        async fn batch_set_writes_everything_then_applies_ttls() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            let entries = vec![
                ("1".to_string(), profile("1")),
                ("2".to_string(), profile("2")),
            ];

            assert!(store.batch_set(&entries, Namespace::USER).await);

            for key in ["1", "2"] {
                let physical = physical_key("1.0.0", Namespace::USER, key);
                assert!(mock.contains_key(&physical));
                assert!(mock.ttl_of(&physical).is_some(), "missing ttl on {key}");
            }

            // the bulk write lands before the expiry step
            let ops: Vec<&'static str> = mock.calls().iter().map(|c| c.op).collect();
            let mset_at = ops.iter().position(|op| *op == "mset").unwrap();
            let expire_at = ops.iter().position(|op| *op == "expire_many").unwrap();
            assert!(mset_at < expire_at);
        }

        #[tokio::test]
        async fn batch_set_of_nothing_is_false() {
            let store = store_with(&MockRedisClient::new());
            let entries: Vec<(String, Profile)> = vec![];
            assert!(!store.batch_set(&entries, Namespace::USER).await);
        }

        #[tokio::test]
        async fn batch_set_still_succeeds_when_the_ttl_step_fails() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            mock.fail_op("expire_many", RedisClientError::Timeout);

            let entries = vec![("1".to_string(), profile("1"))];
            assert!(store.batch_set(&entries, Namespace::USER).await);

            // written, but left without expiry; the gap is logged, not patched
            let physical = physical_key("1.0.0", Namespace::USER, "1");
            assert!(mock.contains_key(&physical));
            assert_eq!(mock.ttl_of(&physical), None);
        }

        #[tokio::test]
        async fn batch_set_fails_when_the_bulk_write_fails() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            mock.fail_op("mset", RedisClientError::Timeout);

            let entries = vec![("1".to_string(), profile("1"))];
            assert!(!store.batch_set(&entries, Namespace::USER).await);
        }
    }

    mod pattern_delete {
        use super::*;

        #[tokio::test]
        async fn removes_every_match_across_scan_pages() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);

            for i in 0..250 {
                let value = format!("v{i}");
                assert!(
                    store
                        .set(&format!("item{i:03}"), &value, Namespace::PRODUCT)
                        .await
                );
            }
            // a neighbour outside the pattern survives
            assert!(store.set("42", &profile("42"), Namespace::USER).await);

            assert!(store.delete_by_pattern("item*", Namespace::PRODUCT).await);

            assert_eq!(mock.len(), 1);
            assert!(store.exists("42", Namespace::USER).await);

            // 250 matches at 100 per page = exactly three scan steps
            let scans = mock.calls().iter().filter(|c| c.op == "scan_page").count();
            assert_eq!(scans, 3);
        }

        #[tokio::test]
        async fn returns_false_when_nothing_matches() {
            let store = store_with(&MockRedisClient::new());
            assert!(!store.delete_by_pattern("item*", Namespace::PRODUCT).await);
        }

        #[tokio::test]
        async fn terminates_when_the_cursor_never_advances() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            for i in 0..10 {
                let value = format!("v{i}");
                store
                    .set(&format!("item{i}"), &value, Namespace::PRODUCT)
                    .await;
            }
            mock.set_stuck_scan_cursor(true);

            // completes despite the backend replaying the same cursor
            assert!(store.delete_by_pattern("item*", Namespace::PRODUCT).await);
            let scans = mock.calls().iter().filter(|c| c.op == "scan_page").count();
            assert_eq!(scans, 2);
        }
    }

    mod degraded {
        use super::*;

        #[tokio::test]
        async fn disabled_store_returns_defaults_and_never_touches_the_backend() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);
            store.set_enabled(false);

            let got: Option<Profile> = store.get("42", Namespace::USER).await;
            assert_eq!(got, None);
            assert!(!store.set("42", &profile("42"), Namespace::USER).await);
            assert!(!store.delete("42", Namespace::USER).await);
            assert!(!store.exists("42", Namespace::USER).await);
            assert!(!store.delete_by_pattern("*", Namespace::USER).await);
            assert_eq!(store.increment("hits", 1, Namespace::RATE_LIMIT).await, None);
            let keys = vec!["1".to_string(), "2".to_string()];
            let batch: Vec<Option<Profile>> = store.batch_get(&keys, Namespace::USER).await;
            assert_eq!(batch, vec![None, None]);
            assert!(
                !store
                    .batch_set(&[("1".to_string(), profile("1"))], Namespace::USER)
                    .await
            );

            // a disabled cache is healthy, and clearing it succeeds vacuously
            assert!(store.health_check().await);
            assert!(store.clear_all().await);

            assert!(mock.calls().is_empty());
        }

        #[tokio::test]
        async fn reenabling_restores_service() {
            let mock = MockRedisClient::new();
            let store = store_with(&mock);

            store.set_enabled(false);
            assert!(!store.set("42", &profile("42"), Namespace::USER).await);

            store.set_enabled(true);
            assert!(store.set("42", &profile("42"), Namespace::USER).await);
            let got: Option<Profile> = store.get("42", Namespace::USER).await;
            assert!(got.is_some());
        }

        #[tokio::test]
        async fn disconnected_store_returns_defaults() {
            let mut config = CacheConfig::default_for_test();
            // nothing listens here; the dial fails immediately
            config.redis_url = "redis://127.0.0.1:1/".to_string();
            config.connection_timeout_ms = 200;
            config.connect_max_retries = 1;

            let store = CacheStore::connect(config).await;

            let got: Option<Profile> = store.get("42", Namespace::USER).await;
            assert_eq!(got, None);
            assert!(!store.set("42", &profile("42"), Namespace::USER).await);
            assert_eq!(store.increment("hits", 1, Namespace::RATE_LIMIT).await, None);
            let keys = vec!["k".to_string()];
            let batch: Vec<Option<Profile>> = store.batch_get(&keys, Namespace::USER).await;
            assert_eq!(batch, vec![None]);

            // enabled but unreachable is not healthy
            assert!(!store.health_check().await);
            // nothing to clear, though
            assert!(store.clear_all().await);
        }
    }
}
