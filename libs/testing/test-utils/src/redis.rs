//! Disposable Redis for stream tests
//!
//! `RedisStreamContainer` starts a Redis 8 container and answers the
//! questions stream tests ask from the outside: how long is a stream, how
//! many entries does a group still hold as pending, does a group exist.
//! Each query opens its own connection so the answers never share a socket
//! with the store under test.

use redis::{Client, RedisResult};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

const REDIS_TAG: &str = "8-alpine";

/// Redis container scoped to one test; removed when dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::RedisStreamContainer;
///
/// # async fn example() {
/// let redis = RedisStreamContainer::start().await;
/// // hand redis.url() to the store under test, then:
/// assert_eq!(redis.stream_len("email:jobs").await, 0);
/// # }
/// ```
pub struct RedisStreamContainer {
    _container: ContainerAsync<Redis>,
    client: Client,
    url: String,
}

impl RedisStreamContainer {
    /// Start the container and wait until it accepts connections
    pub async fn start() -> Self {
        let container = Redis::default()
            .with_tag(REDIS_TAG)
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let url = format!("redis://127.0.0.1:{port}");
        let client = Client::open(url.as_str()).expect("Failed to create Redis client");

        tracing::info!(port, tag = REDIS_TAG, "Test Redis ready");

        Self {
            _container: container,
            client,
            url,
        }
    }

    /// URL for the store under test
    pub fn url(&self) -> &str {
        &self.url
    }

    /// XLEN of `stream`; 0 when the key does not exist
    pub async fn stream_len(&self, stream: &str) -> u64 {
        self.query(redis::cmd("XLEN").arg(stream))
            .await
            .expect("XLEN failed")
    }

    /// Number of entries `group` has delivered but not acknowledged
    pub async fn pending_len(&self, stream: &str, group: &str) -> u64 {
        // Summary form: [count, smallest-id, greatest-id, [[consumer, count]...]]
        let (count, _, _, _): (u64, Option<String>, Option<String>, Option<Vec<(String, String)>>) =
            self.query(redis::cmd("XPENDING").arg(stream).arg(group))
                .await
                .expect("XPENDING failed");
        count
    }

    /// Whether `group` exists on `stream`
    pub async fn group_exists(&self, stream: &str, group: &str) -> bool {
        let groups: RedisResult<Vec<redis::Value>> =
            self.query(redis::cmd("XINFO").arg("GROUPS").arg(stream)).await;

        match groups {
            Ok(groups) => groups.iter().any(|info| group_name(info) == Some(group)),
            // ERR no such key
            Err(_) => false,
        }
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> RedisResult<T> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        cmd.query_async(&mut conn).await
    }
}

/// Pull `name` out of one XINFO GROUPS reply (a map on RESP3, a flat array on RESP2)
fn group_name<'a>(info: &'a redis::Value) -> Option<&'a str> {
    let text = |v: &'a redis::Value| -> Option<&'a str> {
        match v {
            redis::Value::BulkString(bytes) => std::str::from_utf8(bytes).ok(),
            redis::Value::SimpleString(s) => Some(s.as_str()),
            _ => None,
        }
    };

    match info {
        redis::Value::Array(items) => items
            .chunks(2)
            .find(|pair| pair.first().and_then(text) == Some("name"))
            .and_then(|pair| pair.get(1))
            .and_then(text),
        redis::Value::Map(pairs) => pairs
            .iter()
            .find(|(k, _)| text(k) == Some("name"))
            .and_then(|(_, v)| text(v)),
        _ => None,
    }
}

impl Drop for RedisStreamContainer {
    fn drop(&mut self) {
        tracing::debug!(url = %self.url, "Removing test Redis container");
    }
}
