//! Redis-backed `Store` (production backend). Dependency choice grounded in
//! `vectordotdev-vector`'s Cargo.toml, which pins `redis = "0.32.4"` with a
//! `connection-manager` + `tokio-comp` feature set for the same reason this
//! service needs it: a pooled, auto-reconnecting async client shared across
//! concurrent tasks without hand-rolled connection management.

use super::{BaselineOps, DedupOps, DirtyOps, DurationOps, ListOps, Store};
use crate::core::error::{CoreError, CoreResult};
use crate::core::model::Baseline;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl RedisConfig {
    fn connection_url(&self) -> String {
        let auth = if self.password.is_empty() {
            String::new()
        } else {
            format!(":{}@", self.password)
        };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisStore { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn transient<E: std::error::Error + Send + Sync + 'static>(err: E) -> CoreError {
    CoreError::transient(err)
}

/// Baseline-hash field names, fixed by the wire contract (spec.md §6):
/// `p50, p95, mad, sampleCount, updatedAt`.
fn baseline_to_fields(b: &Baseline) -> Vec<(&'static str, String)> {
    vec![
        ("p50", format!("{:.17}", b.p50)),
        ("p95", format!("{:.17}", b.p95)),
        ("mad", format!("{:.17}", b.mad)),
        ("sampleCount", b.sample_count.to_string()),
        (
            "updatedAt",
            b.updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        ),
    ]
}

fn fields_to_baseline(fields: &HashMap<String, String>) -> Option<Baseline> {
    if fields.is_empty() {
        return None;
    }
    let p50 = fields.get("p50")?.parse().ok()?;
    let p95 = fields.get("p95")?.parse().ok()?;
    let mad = fields.get("mad")?.parse().ok()?;
    let sample_count = fields.get("sampleCount")?.parse().ok()?;
    let updated_at = fields
        .get("updatedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());

    Some(Baseline {
        p50,
        p95,
        mad,
        sample_count,
        updated_at,
    })
}

#[async_trait]
impl DurationOps for RedisStore {
    async fn append_duration(&self, key: &str, ms: i64, window_size: usize) -> CoreResult<()> {
        let mut conn = self.conn();
        redis::pipe()
            .atomic()
            .lpush(key, ms)
            .ltrim(key, 0, window_size.max(1) as isize - 1)
            .query_async::<()>(&mut conn)
            .await
            .map_err(transient)
    }

    async fn get_durations(&self, key: &str) -> CoreResult<Vec<i64>> {
        let mut conn = self.conn();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await.map_err(transient)?;
        Ok(raw.iter().filter_map(|s| s.parse().ok()).collect())
    }
}

#[async_trait]
impl BaselineOps for RedisStore {
    async fn get_baseline(&self, key: &str) -> CoreResult<Option<Baseline>> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(transient)?;
        Ok(fields_to_baseline(&fields))
    }

    async fn set_baseline(&self, key: &str, mut baseline: Baseline) -> CoreResult<()> {
        if baseline.updated_at.timestamp() == 0 {
            baseline.updated_at = Utc::now();
        }
        let mut conn = self.conn();
        conn.hset_multiple(key, &baseline_to_fields(&baseline))
            .await
            .map_err(transient)
    }

    async fn get_baselines(&self, keys: &[String]) -> CoreResult<HashMap<String, Baseline>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }
        let replies: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(transient)?;

        Ok(keys
            .iter()
            .zip(replies)
            .filter_map(|(k, fields)| fields_to_baseline(&fields).map(|b| (k.clone(), b)))
            .collect())
    }
}

#[async_trait]
impl DedupOps for RedisStore {
    async fn is_duplicate_or_mark(&self, trace_id: &str, ttl: Duration) -> CoreResult<bool> {
        let mut conn = self.conn();
        let key = crate::core::keys::seen_key(trace_id);
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(transient)?;
        // `SET ... NX` replies nil when the key already existed.
        Ok(reply.is_none())
    }
}

#[async_trait]
impl DirtyOps for RedisStore {
    async fn mark_dirty(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.conn();
        let _: i64 = conn
            .sadd(crate::core::keys::DIRTY_SET_KEY, key)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn pop_dirty_batch(&self, n: usize) -> CoreResult<Vec<String>> {
        let mut conn = self.conn();
        // SPOP with a count is a single atomic command: no two concurrent
        // callers can observe the same popped key.
        let popped: Vec<String> = redis::cmd("SPOP")
            .arg(crate::core::keys::DIRTY_SET_KEY)
            .arg(n)
            .query_async(&mut conn)
            .await
            .map_err(transient)?;
        Ok(popped)
    }
}

#[async_trait]
impl ListOps for RedisStore {
    async fn list_baseline_keys(&self, min_samples: i64) -> CoreResult<Vec<String>> {
        let mut conn = self.conn();
        let mut matched = Vec::new();
        for pattern in [
            format!("{}*", crate::core::keys::BASE_PREFIX),
            format!("{}*", crate::core::keys::SPANBASE_PREFIX),
        ] {
            let mut cursor: u64 = 0;
            loop {
                let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await
                    .map_err(transient)?;
                matched.extend(keys);
                cursor = next_cursor;
                if cursor == 0 {
                    break;
                }
            }
        }

        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let baselines = self.get_baselines(&matched).await?;
        Ok(matched
            .into_iter()
            .filter(|k| baselines.get(k).map(|b| b.sample_count >= min_samples).unwrap_or(false))
            .collect())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.conn();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(transient)?;
        Ok(())
    }
}
