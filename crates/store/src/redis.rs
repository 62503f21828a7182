//! Redis implementation of the durable plan tier.

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use std::time::Duration;

use fitforge_core::{CachedPlan, Error, PlanStore, RequestFingerprint, Result, WriteOutcome};

/// Write `payload` unless the stored `created_at` is newer; returns 1 when written.
const CONDITIONAL_PUT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'created_at')
if current and tonumber(current) > tonumber(ARGV[1]) then
  return 0
end
redis.call('HSET', KEYS[1], 'created_at', ARGV[1], 'payload', ARGV[2], 'hits', ARGV[3])
redis.call('PEXPIRE', KEYS[1], ARGV[4])
return 1
"#;

/// Count a hit and return `{payload, hits}`, or nil when absent.
const GET_AND_COUNT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return false
end
local hits = redis.call('HINCRBY', KEYS[1], 'hits', 1)
return {redis.call('HGET', KEYS[1], 'payload'), hits}
"#;

/// Redis persistence for cached plans.
///
/// Each plan is a hash with `created_at`, `payload` and `hits` fields. Expiry
/// is delegated to Redis key TTLs, and writes go through a Lua script so the
/// `created_at` comparison and the write are atomic.
pub struct RedisPlanStore {
    client: Client,
    prefix: String,
    put_script: Script,
    get_script: Script,
}

impl RedisPlanStore {
    /// Create a new Redis plan store.
    pub fn new(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| Error::storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client,
            prefix: prefix.trim_end_matches(':').to_string(),
            put_script: Script::new(CONDITIONAL_PUT),
            get_script: Script::new(GET_AND_COUNT),
        })
    }

    fn key(&self, fingerprint: &RequestFingerprint) -> String {
        format!("{}:{}", self.prefix, fingerprint)
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::storage(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl PlanStore for RedisPlanStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, fingerprint: &RequestFingerprint) -> Result<Option<CachedPlan>> {
        let mut conn = self.conn().await?;
        let found: Option<(String, u64)> = self
            .get_script
            .key(self.key(fingerprint))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::storage(format!("Redis get error: {}", e)))?;

        let Some((json, hits)) = found else {
            return Ok(None);
        };

        let mut plan: CachedPlan = serde_json::from_str(&json)
            .map_err(|e| Error::storage(format!("Failed to deserialize plan: {}", e)))?;

        let now = Utc::now();
        if plan.is_expired_at(now) {
            return Ok(None);
        }
        plan.hit_count = hits;
        plan.last_accessed_at = Some(now);
        Ok(Some(plan))
    }

    async fn put(&self, plan: &CachedPlan, ttl: Duration) -> Result<WriteOutcome> {
        if ttl.is_zero() {
            return Ok(WriteOutcome::Written);
        }

        let mut conn = self.conn().await?;
        let stored = plan.for_tier(ttl);
        let json = serde_json::to_string(&stored)
            .map_err(|e| Error::storage(format!("Failed to serialize plan: {}", e)))?;

        let written: i64 = self
            .put_script
            .key(self.key(&plan.fingerprint))
            .arg(plan.created_at.timestamp_millis())
            .arg(json)
            .arg(stored.hit_count)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::storage(format!("Redis set error: {}", e)))?;

        Ok(if written == 1 {
            WriteOutcome::Written
        } else {
            WriteOutcome::SkippedStale
        })
    }

    async fn invalidate(&self, fingerprint: &RequestFingerprint) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .del(self.key(fingerprint))
            .await
            .map_err(|e| Error::storage(format!("Redis delete error: {}", e)))?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        // Redis expires keys itself.
        Ok(0)
    }
}
