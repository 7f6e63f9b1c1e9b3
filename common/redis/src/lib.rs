use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RedisClientError {
    #[error("key not found")]
    NotFound,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("timeout")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for RedisClientError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            RedisClientError::Timeout
        } else {
            RedisClientError::Redis(Arc::new(err))
        }
    }
}

impl From<std::string::FromUtf8Error> for RedisClientError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        RedisClientError::Parse(err.to_string())
    }
}

/// The backend surface the cache layer is built on.
///
/// Implementations must be safe to share across tasks; every method takes
/// `&self` and owns its arguments so calls can be issued concurrently over a
/// multiplexed connection.
///
/// `scan_page` deliberately exposes a single SCAN step (cursor in, next
/// cursor + one page of matching keys out) instead of a full keyspace walk:
/// the iteration policy, page accumulation and termination guard belong to
/// the caller.
#[async_trait]
pub trait Client {
    /// Returns `Err(RedisClientError::NotFound)` when the key is absent.
    async fn get(&self, k: String) -> Result<String, RedisClientError>;

    /// SETEX: store `v` under `k` with an expiry of `seconds`.
    async fn set_ex(&self, k: String, v: String, seconds: u64) -> Result<(), RedisClientError>;

    /// Returns true when a key was actually removed.
    async fn del(&self, k: String) -> Result<bool, RedisClientError>;

    /// Bulk DEL; returns the number of keys removed.
    async fn del_many(&self, keys: Vec<String>) -> Result<u64, RedisClientError>;

    async fn exists(&self, k: String) -> Result<bool, RedisClientError>;

    /// Pipelined INCRBY + EXPIRE. The expiry is applied on every call, so the
    /// key's window restarts with each increment. Returns the new counter
    /// value.
    async fn incr_by_expire(
        &self,
        k: String,
        delta: i64,
        ttl_seconds: u64,
    ) -> Result<i64, RedisClientError>;

    /// MGET; the result has one slot per requested key, in request order.
    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, RedisClientError>;

    /// MSET; writes all pairs in a single round trip, without expiry.
    async fn mset(&self, entries: Vec<(String, String)>) -> Result<(), RedisClientError>;

    /// Pipelined EXPIRE over `keys`.
    async fn expire_many(&self, keys: Vec<String>, ttl_seconds: u64)
        -> Result<(), RedisClientError>;

    /// One SCAN step: `SCAN cursor MATCH pattern COUNT count`. Returns the
    /// next cursor (0 signals completion) and the keys found in this step.
    async fn scan_page(
        &self,
        cursor: u64,
        pattern: String,
        count: usize,
    ) -> Result<(u64, Vec<String>), RedisClientError>;

    async fn ping(&self) -> Result<(), RedisClientError>;

    /// FLUSHDB. Maintenance and test tooling only.
    async fn flush_db(&self) -> Result<(), RedisClientError>;
}

mod client;
mod mock;

pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient};
