//! Redis implementation of the store seam.
//!
//! Uses one multiplexed async connection per pooled session. Commands are issued
//! explicitly (`GET`, `SET .. EX`, `DEL`, `EXISTS`, `EXPIRE`, `PING`).

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::store::{Connector, StoreConnection};

/// Creates Redis sessions from a connection URL.
pub struct RedisConnector {
    client: Client,
    display_url: String,
}

impl RedisConnector {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| CacheError::connection(e.to_string()))?;
        let display_url = sanitize_url(url);
        tracing::debug!(url = %display_url, "Redis connector created");
        Ok(Self {
            client,
            display_url,
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(Box::new(RedisConnection { conn }))
    }

    fn describe(&self) -> String {
        self.display_url.clone()
    }
}

/// A pooled Redis session.
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut self.conn).await?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // EX takes whole seconds and rejects 0
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn del(&mut self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut self.conn).await?;
        Ok(removed)
    }

    async fn exists(&mut self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let count: u64 = redis::cmd("EXISTS").arg(keys).query_async(&mut self.conn).await?;
        Ok(count)
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool> {
        let applied: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .query_async(&mut self.conn)
            .await?;
        Ok(applied)
    }

    async fn ping(&mut self) -> Result<()> {
        let pong: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::protocol(format!("unexpected PING reply '{}'", pong)))
        }
    }
}

/// Sanitize URL for logging (redacts credentials).
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            format!("{}://[REDACTED]@{}", &url[..scheme_end], &url[at_pos + 1..])
        } else {
            "[REDACTED]".to_string()
        }
    } else {
        url.to_string()
    }
}
