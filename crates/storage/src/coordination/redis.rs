// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed coordination store
//!
//! Conditional operations run as Lua scripts so each is a single atomic step on the
//! server. Every key is namespaced under the configured prefix.

use super::{ChannelSubscription, CoordinationStore, StoreError};
use async_trait::async_trait;
use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError, Script};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INSERT_IF_BELOW: &str = r"
if redis.call('ZSCORE', KEYS[1], ARGV[1]) then
  redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
  redis.call('PEXPIRE', KEYS[1], ARGV[4])
  return 1
end
if redis.call('ZCARD', KEYS[1]) < tonumber(ARGV[3]) then
  redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
  redis.call('PEXPIRE', KEYS[1], ARGV[4])
  return 1
end
return 0
";

const TOUCH_IF_PRESENT: &str = r"
if redis.call('ZSCORE', KEYS[1], ARGV[1]) then
  redis.call('ZADD', KEYS[1], 'XX', ARGV[2], ARGV[1])
  redis.call('PEXPIRE', KEYS[1], ARGV[3])
  return 1
end
return 0
";

const RECORD_FIELD: &str = r"
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return redis.call('HGETALL', KEYS[1])
";

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().max(1) as u64
}

pub struct RedisCoordinationStore {
    client: Client,
    conn: ConnectionManager,
    key_prefix: String,
    insert_if_below: Script,
    touch_if_present: Script,
    record_field: Script,
}

impl RedisCoordinationStore {
    /// Connect to `url`; keys are written as `<key_prefix>:<key>`
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;

        info!(url = %url, key_prefix, "connected to redis");

        Ok(Self {
            client,
            conn,
            key_prefix: key_prefix.to_string(),
            insert_if_below: Script::new(INSERT_IF_BELOW),
            touch_if_present: Script::new(TOUCH_IF_PRESENT),
            record_field: Script::new(RECORD_FIELD),
        })
    }

    fn key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn remove_expired(&self, key: &str, cutoff: u64) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.zrembyscore(self.key(key), "-inf", cutoff).await?;
        Ok(removed)
    }

    async fn insert_if_below(
        &self,
        key: &str,
        member: &str,
        score: u64,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let inserted: i64 = self
            .insert_if_below
            .key(self.key(key))
            .arg(member)
            .arg(score)
            .arg(limit)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(inserted == 1)
    }

    async fn touch(
        &self,
        key: &str,
        member: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let touched: i64 = self
            .touch_if_present
            .key(self.key(key))
            .arg(member)
            .arg(score)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(touched == 1)
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.zrem(self.key(key), member).await?;
        Ok(removed > 0)
    }

    async fn count(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count: usize = conn.zcard(self.key(key)).await?;
        Ok(count)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(self.key(channel), message).await?;
        debug!(channel, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.key(channel)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = channel.to_string();
        let forwarder = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "undecodable pubsub payload"),
                }
            }
        });

        Ok(ChannelSubscription::with_forwarder(rx, forwarder))
    }

    async fn record_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = self
            .record_field
            .key(self.key(key))
            .arg(field)
            .arg(value)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        match reply.as_deref() {
            Some("OK") => Ok(true),
            None => Ok(false),
            Some(other) => Err(StoreError::Protocol(format!("SET NX replied {other}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: usize = conn.del(self.key(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
