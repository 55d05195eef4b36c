//! Redis-backed key-value store.
//!
//! Each entry is a hash holding the payload and its expiration metadata, so
//! sliding entries can be refreshed on read:
//!
//! | field    | content                                   |
//! |----------|-------------------------------------------|
//! | `absexp` | absolute deadline in unix millis, or `-1` |
//! | `sldexp` | sliding window in millis, or `-1`         |
//! | `data`   | the stored string                         |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};
use tracing::{debug, instrument};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::store::{EntryOptions, KeyValueStore};

const ABSOLUTE_FIELD: &str = "absexp";
const SLIDING_FIELD: &str = "sldexp";
const DATA_FIELD: &str = "data";
const NOT_PRESENT: i64 = -1;

/// Redis store sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Redis` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        Self::connect_with_clock(redis_url, Arc::new(SystemClock)).await
    }

    /// Connects to Redis, evaluating expiration against `clock`.
    pub async fn connect_with_clock(
        redis_url: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        debug!("Connected to redis store");

        Ok(Self { conn, clock })
    }

    /// Checks that the server answers.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

/// Time to live for an entry with the given metadata, in millis.
///
/// Sliding windows are capped by the absolute deadline.
fn ttl_millis(now: i64, absolute: Option<i64>, sliding: Option<i64>) -> Option<i64> {
    let until_deadline = absolute.map(|deadline| deadline - now);
    match (until_deadline, sliding) {
        (Some(remaining), Some(window)) => Some(remaining.min(window)),
        (Some(remaining), None) => Some(remaining),
        (None, Some(window)) => Some(window),
        (None, None) => None,
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn present(raw: Option<i64>) -> Option<i64> {
    raw.filter(|value| *value != NOT_PRESENT)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self), fields(cache.operation = "HMGET"))]
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();

        let (absolute, sliding, data): (Option<i64>, Option<i64>, Option<String>) =
            redis::cmd("HMGET")
                .arg(key)
                .arg(ABSOLUTE_FIELD)
                .arg(SLIDING_FIELD)
                .arg(DATA_FIELD)
                .query_async(&mut conn)
                .await?;

        let Some(data) = data else {
            return Ok(None);
        };

        let now = self.now_millis();
        let absolute = present(absolute);
        let sliding = present(sliding);

        if let Some(deadline) = absolute
            && now >= deadline
        {
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            return Ok(None);
        }

        if sliding.is_some()
            && let Some(ttl) = ttl_millis(now, absolute, sliding)
        {
            let _: () = redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl)
                .query_async(&mut conn)
                .await?;
        }

        Ok(Some(data))
    }

    #[instrument(skip(self, value), fields(cache.operation = "HSET"))]
    async fn set_string(
        &self,
        key: &str,
        value: &str,
        options: &EntryOptions,
    ) -> Result<(), StoreError> {
        options.validate()?;

        let mut conn = self.conn.clone();
        let now = self.clock.now();
        let absolute = options
            .absolute_deadline(now)
            .map(|deadline| deadline.timestamp_millis());
        let sliding = options.sliding_expiration().map(duration_millis);
        let ttl = ttl_millis(now.timestamp_millis(), absolute, sliding);

        if matches!(ttl, Some(remaining) if remaining <= 0) {
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            debug!(cache.key = %key, "Skipped write past its deadline");
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(key)
            .ignore()
            .cmd("HSET")
            .arg(key)
            .arg(ABSOLUTE_FIELD)
            .arg(absolute.unwrap_or(NOT_PRESENT))
            .arg(SLIDING_FIELD)
            .arg(sliding.unwrap_or(NOT_PRESENT))
            .arg(DATA_FIELD)
            .arg(value)
            .ignore();

        if let Some(ttl) = ttl {
            pipe.cmd("PEXPIRE").arg(key).arg(ttl).ignore();
        }

        let _: () = pipe.query_async(&mut conn).await?;

        debug!(cache.key = %key, cache.ttl_ms = ?ttl, "Cache set");

        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();

        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;

        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
