use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::{Client, RedisClientError};

/// One recorded backend call: operation name plus the key (or a summary for
/// batch operations).
#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: &'static str,
    pub key: String,
}

#[derive(Debug, Clone)]
struct MockEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MockEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

#[derive(Default)]
struct MockState {
    // BTreeMap keeps SCAN paging deterministic
    entries: BTreeMap<String, MockEntry>,
    calls: Vec<MockRedisCall>,
    fail_ops: HashMap<&'static str, RedisClientError>,
    stuck_scan_cursor: bool,
}

/// In-memory stand-in for the real backend.
///
/// Keys carry real expiry deadlines, SCAN serves deterministic pages over the
/// sorted keyspace, and every call is recorded. Failures can be injected per
/// operation name, and `set_stuck_scan_cursor` makes SCAN return the same
/// non-zero cursor forever so callers can prove their loop guards terminate.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    state: Arc<Mutex<MockState>>,
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every subsequent call to `op` (e.g. `"mset"`, `"expire_many"`)
    /// fail with `err`.
    pub fn fail_op(&self, op: &'static str, err: RedisClientError) {
        self.lock().fail_ops.insert(op, err);
    }

    /// Make every subsequent call of any operation fail with `err`.
    pub fn fail_all(&self, err: RedisClientError) {
        let mut state = self.lock();
        for op in [
            "get",
            "set_ex",
            "del",
            "del_many",
            "exists",
            "incr_by_expire",
            "mget",
            "mset",
            "expire_many",
            "scan_page",
            "ping",
            "flush_db",
        ] {
            state.fail_ops.insert(op, err.clone());
        }
    }

    pub fn clear_failures(&self) {
        self.lock().fail_ops.clear();
    }

    /// When set, SCAN replies with the cursor it was handed (coerced to
    /// non-zero), never signalling completion.
    pub fn set_stuck_scan_cursor(&self, stuck: bool) {
        self.lock().stuck_scan_cursor = stuck;
    }

    pub fn calls(&self) -> Vec<MockRedisCall> {
        self.lock().calls.clone()
    }

    /// Seed a raw entry, bypassing the `Client` surface.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<u64>) {
        let entry = MockEntry {
            value: value.into(),
            expires_at: ttl.map(|secs| Instant::now() + Duration::from_secs(secs)),
        };
        self.lock().entries.insert(key.into(), entry);
    }

    /// Remaining time to live, or `None` when the key is absent or has no
    /// expiry.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let mut state = self.lock();
        Self::sweep(&mut state);
        state
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let mut state = self.lock();
        Self::sweep(&mut state);
        state.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        let mut state = self.lock();
        Self::sweep(&mut state);
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(state: &mut MockState) {
        state.entries.retain(|_, entry| !entry.is_expired());
    }

    fn check_failure(state: &MockState, op: &'static str) -> Result<(), RedisClientError> {
        match state.fail_ops.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn record(state: &mut MockState, op: &'static str, key: String) {
        state.calls.push(MockRedisCall { op, key });
    }

    /// Glob matching as the backend does it for SCAN MATCH; only `*` is
    /// interpreted.
    fn glob_match(pattern: &str, text: &str) -> bool {
        let pat = pattern.as_bytes();
        let txt = text.as_bytes();
        let (mut p, mut t) = (0usize, 0usize);
        let mut star: Option<usize> = None;
        let mut mark = 0usize;

        while t < txt.len() {
            if p < pat.len() && (pat[p] == txt[t]) {
                p += 1;
                t += 1;
            } else if p < pat.len() && pat[p] == b'*' {
                star = Some(p);
                mark = t;
                p += 1;
            } else if let Some(s) = star {
                p = s + 1;
                mark += 1;
                t = mark;
            } else {
                return false;
            }
        }
        while p < pat.len() && pat[p] == b'*' {
            p += 1;
        }
        p == pat.len()
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "get", k.clone());
        Self::check_failure(&state, "get")?;
        Self::sweep(&mut state);
        match state.entries.get(&k) {
            Some(entry) => Ok(entry.value.clone()),
            None => Err(RedisClientError::NotFound),
        }
    }

    async fn set_ex(&self, k: String, v: String, seconds: u64) -> Result<(), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "set_ex", k.clone());
        Self::check_failure(&state, "set_ex")?;
        state.entries.insert(
            k,
            MockEntry {
                value: v,
                expires_at: Some(Instant::now() + Duration::from_secs(seconds)),
            },
        );
        Ok(())
    }

    async fn del(&self, k: String) -> Result<bool, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "del", k.clone());
        Self::check_failure(&state, "del")?;
        Self::sweep(&mut state);
        Ok(state.entries.remove(&k).is_some())
    }

    async fn del_many(&self, keys: Vec<String>) -> Result<u64, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "del_many", format!("keys={}", keys.len()));
        Self::check_failure(&state, "del_many")?;
        Self::sweep(&mut state);
        let mut removed = 0;
        for k in keys {
            if state.entries.remove(&k).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, k: String) -> Result<bool, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "exists", k.clone());
        Self::check_failure(&state, "exists")?;
        Self::sweep(&mut state);
        Ok(state.entries.contains_key(&k))
    }

    async fn incr_by_expire(
        &self,
        k: String,
        delta: i64,
        ttl_seconds: u64,
    ) -> Result<i64, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "incr_by_expire", k.clone());
        Self::check_failure(&state, "incr_by_expire")?;
        Self::sweep(&mut state);

        let current = match state.entries.get(&k) {
            Some(entry) => entry
                .value
                .parse::<i64>()
                .map_err(|_| RedisClientError::Parse("value is not an integer".to_string()))?,
            None => 0,
        };
        let next = current + delta;
        state.entries.insert(
            k,
            MockEntry {
                value: next.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(next)
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "mget", format!("keys={}", keys.len()));
        Self::check_failure(&state, "mget")?;
        Self::sweep(&mut state);
        Ok(keys
            .iter()
            .map(|k| state.entries.get(k).map(|entry| entry.value.clone()))
            .collect())
    }

    async fn mset(&self, entries: Vec<(String, String)>) -> Result<(), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "mset", format!("entries={}", entries.len()));
        Self::check_failure(&state, "mset")?;
        for (k, v) in entries {
            // MSET carries no expiry; that arrives in a separate EXPIRE step
            state.entries.insert(
                k,
                MockEntry {
                    value: v,
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn expire_many(
        &self,
        keys: Vec<String>,
        ttl_seconds: u64,
    ) -> Result<(), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "expire_many", format!("keys={}", keys.len()));
        Self::check_failure(&state, "expire_many")?;
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        for k in keys {
            if let Some(entry) = state.entries.get_mut(&k) {
                entry.expires_at = Some(deadline);
            }
        }
        Ok(())
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: String,
        count: usize,
    ) -> Result<(u64, Vec<String>), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "scan_page", format!("{pattern}@{cursor}"));
        Self::check_failure(&state, "scan_page")?;
        Self::sweep(&mut state);

        let matches: Vec<String> = state
            .entries
            .keys()
            .filter(|k| Self::glob_match(&pattern, k))
            .cloned()
            .collect();

        if state.stuck_scan_cursor {
            let page = matches.into_iter().take(count).collect();
            return Ok((cursor.max(1), page));
        }

        let start = cursor as usize;
        if start >= matches.len() {
            return Ok((0, vec![]));
        }
        let end = (start + count).min(matches.len());
        let page = matches[start..end].to_vec();
        let next = if end >= matches.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    async fn ping(&self) -> Result<(), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "ping", String::new());
        Self::check_failure(&state, "ping")?;
        Ok(())
    }

    async fn flush_db(&self) -> Result<(), RedisClientError> {
        let mut state = self.lock();
        Self::record(&mut state, "flush_db", String::new());
        Self::check_failure(&state, "flush_db")?;
        state.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod glob {
        use super::*;

        #[test]
        fn literal_patterns_match_exactly() {
            assert!(MockRedisClient::glob_match("a:b:c", "a:b:c"));
            assert!(!MockRedisClient::glob_match("a:b:c", "a:b:d"));
        }

        #[test]
        fn trailing_star_matches_any_suffix() {
            assert!(MockRedisClient::glob_match("v1:user:*", "v1:user:42"));
            assert!(MockRedisClient::glob_match("v1:user:*", "v1:user:"));
            assert!(!MockRedisClient::glob_match("v1:user:*", "v1:product:42"));
        }

        #[test]
        fn interior_star_matches_any_run() {
            assert!(MockRedisClient::glob_match("v1:*:42", "v1:user:42"));
            assert!(MockRedisClient::glob_match("a*c*e", "abcde"));
            assert!(!MockRedisClient::glob_match("a*c*e", "abcdf"));
        }
    }

    mod keyspace {
        use super::*;

        #[tokio::test]
        async fn entries_expire_after_their_ttl() {
            let client = MockRedisClient::new();
            client
                .set_ex("k".to_string(), "v".to_string(), 1)
                .await
                .unwrap();
            assert!(client.contains_key("k"));

            tokio::time::sleep(Duration::from_millis(1100)).await;
            assert!(!client.contains_key("k"));
            assert!(matches!(
                client.get("k".to_string()).await,
                Err(RedisClientError::NotFound)
            ));
        }

        #[tokio::test]
        async fn scan_pages_cover_the_keyspace_once() {
            let client = MockRedisClient::new();
            for i in 0..25 {
                client.insert_raw(format!("p:{i:02}"), "v", None);
            }
            client.insert_raw("other", "v", None);

            let mut cursor = 0;
            let mut seen = vec![];
            loop {
                let (next, page) = client
                    .scan_page(cursor, "p:*".to_string(), 10)
                    .await
                    .unwrap();
                seen.extend(page);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            assert_eq!(seen.len(), 25);
        }

        #[tokio::test]
        async fn injected_failures_surface_per_operation() {
            let client = MockRedisClient::new();
            client.fail_op("get", RedisClientError::Timeout);
            client
                .set_ex("k".to_string(), "v".to_string(), 60)
                .await
                .unwrap();
            assert!(matches!(
                client.get("k".to_string()).await,
                Err(RedisClientError::Timeout)
            ));
        }
    }
}
