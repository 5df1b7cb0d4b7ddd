use anyhow::Context as _;
use deadpool_redis::redis::{AsyncCommands, RedisError};
use deadpool_redis::{Connection, Pool};

use crate::domain::repository::SettingsCache;
use crate::domain::settings::GstSettings;
use crate::error::GstServiceError;

const GENERATION_KEY: &str = "gst:settings:gen";

fn snapshot_key(generation: u64) -> String {
    format!("gst:settings:{generation}")
}

fn redis_err(e: RedisError) -> GstServiceError {
    GstServiceError::Internal(e.into())
}

#[derive(Clone)]
pub struct RedisSettingsCache {
    pub pool: Pool,
    pub ttl_secs: u64,
}

impl RedisSettingsCache {
    async fn conn(&self) -> Result<Connection, GstServiceError> {
        self.pool
            .get()
            .await
            .map_err(|e| GstServiceError::Internal(e.into()))
    }

    /// Round-trips a `PING` through the pool.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await.context("get redis connection")?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis PING")?;
        Ok(())
    }
}

impl SettingsCache for RedisSettingsCache {
    async fn generation(&self) -> Result<u64, GstServiceError> {
        let mut conn = self.conn().await?;
        let generation: Option<u64> = conn.get(GENERATION_KEY).await.map_err(redis_err)?;
        Ok(generation.unwrap_or_default())
    }

    async fn get(&self, generation: u64) -> Result<Option<GstSettings>, GstServiceError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(snapshot_key(generation))
            .await
            .map_err(redis_err)?;
        // A snapshot written by an older build is treated as a miss.
        Ok(raw.and_then(|json| serde_json::from_str(&json).ok()))
    }

    async fn put(&self, generation: u64, settings: &GstSettings) -> Result<(), GstServiceError> {
        let json =
            serde_json::to_string(settings).map_err(|e| GstServiceError::Internal(e.into()))?;
        let mut conn = self.conn().await?;
        let (): () = conn
            .set_ex(snapshot_key(generation), json, self.ttl_secs)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn invalidate(&self) -> Result<(), GstServiceError> {
        let mut conn = self.conn().await?;
        let generation: u64 = conn.incr(GENERATION_KEY, 1).await.map_err(redis_err)?;
        // Unreachable from now on.
        if let Some(previous) = generation.checked_sub(1) {
            let _: i64 = conn.del(snapshot_key(previous)).await.map_err(redis_err)?;
        }
        Ok(())
    }
}
