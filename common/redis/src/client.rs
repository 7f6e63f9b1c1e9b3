use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::{Client, RedisClientError};

/// Production client backed by a tokio multiplexed connection.
///
/// The connection is cheap to clone; each operation clones it so concurrent
/// callers never contend on `&mut self`.
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    /// Connect with no response or connection timeout (blocks indefinitely).
    pub async fn new(addr: String) -> Result<RedisClient, RedisClientError> {
        Self::with_config(addr, None, None).await
    }

    /// Connect with full timeout control.
    ///
    /// `None` means no timeout. `Some(Duration::ZERO)` is rejected as
    /// `InvalidConfiguration`; use `None` instead.
    pub async fn with_config(
        addr: String,
        response_timeout: Option<Duration>,
        connection_timeout: Option<Duration>,
    ) -> Result<RedisClient, RedisClientError> {
        let client = redis::Client::open(addr)?;

        if let Some(timeout) = response_timeout {
            if timeout.is_zero() {
                return Err(RedisClientError::InvalidConfiguration(
                    "response timeout cannot be Duration::ZERO - use None for no timeout"
                        .to_string(),
                ));
            }
        }
        if let Some(timeout) = connection_timeout {
            if timeout.is_zero() {
                return Err(RedisClientError::InvalidConfiguration(
                    "connection timeout cannot be Duration::ZERO - use None for no timeout"
                        .to_string(),
                ));
            }
        }

        let mut config = redis::AsyncConnectionConfig::new();
        if let Some(timeout) = response_timeout {
            config = config.set_response_timeout(timeout);
        }
        if let Some(timeout) = connection_timeout {
            config = config.set_connection_timeout(timeout);
        }

        let connection = client
            .get_multiplexed_async_connection_with_config(&config)
            .await?;

        Ok(RedisClient { connection })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<String, RedisClientError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(k).await?;
        value.ok_or(RedisClientError::NotFound)
    }

    async fn set_ex(&self, k: String, v: String, seconds: u64) -> Result<(), RedisClientError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(k, v, seconds).await?;
        Ok(())
    }

    async fn del(&self, k: String) -> Result<bool, RedisClientError> {
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(k).await?;
        Ok(removed > 0)
    }

    async fn del_many(&self, keys: Vec<String>) -> Result<u64, RedisClientError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }

    async fn exists(&self, k: String) -> Result<bool, RedisClientError> {
        let mut conn = self.connection.clone();
        let found: bool = conn.exists(k).await?;
        Ok(found)
    }

    async fn incr_by_expire(
        &self,
        k: String,
        delta: i64,
        ttl_seconds: u64,
    ) -> Result<i64, RedisClientError> {
        let mut pipe = redis::pipe();
        pipe.cmd("INCRBY").arg(&k).arg(delta);
        pipe.cmd("EXPIRE").arg(&k).arg(ttl_seconds).ignore();

        let mut conn = self.connection.clone();
        let (count,): (i64,) = pipe.query_async(&mut conn).await?;
        Ok(count)
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, RedisClientError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.connection.clone();
        let results: Vec<Option<String>> = conn.mget(&keys).await?;
        Ok(results)
    }

    async fn mset(&self, entries: Vec<(String, String)>) -> Result<(), RedisClientError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (k, v) in &entries {
            cmd.arg(k).arg(v);
        }
        let mut conn = self.connection.clone();
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn expire_many(
        &self,
        keys: Vec<String>,
        ttl_seconds: u64,
    ) -> Result<(), RedisClientError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for k in &keys {
            pipe.cmd("EXPIRE").arg(k).arg(ttl_seconds).ignore();
        }
        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: String,
        count: usize,
    ) -> Result<(u64, Vec<String>), RedisClientError> {
        let mut conn = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next_cursor, keys))
    }

    async fn ping(&self) -> Result<(), RedisClientError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisClientError::Parse(format!(
                "unexpected PING reply: {pong}"
            )))
        }
    }

    async fn flush_db(&self) -> Result<(), RedisClientError> {
        let mut conn = self.connection.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
