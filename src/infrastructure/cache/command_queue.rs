//! Per-account command queue (§4.2). A performance layer only — persistence
//! via [`crate::domain::ports::CommandRepository`] is the source of truth.
//! If the queue loses entries (restart, eviction) the next scheduled DB scan
//! recovers them by re-enqueueing pending/sent commands.

use crate::domain::types::Command;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

fn queue_key(account_number: i64) -> String {
    format!("mt5:cmdqueue:{}", account_number)
}

fn response_channel(command_id: Uuid) -> String {
    format!("mt5:cmdresp:{}", command_id)
}

#[async_trait]
pub trait CommandQueue: Send + Sync {
    /// O(1) push onto the account's FIFO.
    async fn enqueue(&self, account_number: i64, command: &Command) -> Result<()>;

    /// Atomically removes up to `n` items from the head of the account's
    /// queue.
    async fn pop_batch(&self, account_number: i64, n: usize) -> Result<Vec<Command>>;

    /// One-to-many notify on a channel named by `command_id`, for a future
    /// synchronous call site blocked on this command's outcome.
    async fn publish_response(&self, command_id: Uuid, payload: &serde_json::Value) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisCommandQueue {
    conn: ConnectionManager,
}

impl RedisCommandQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CommandQueue for RedisCommandQueue {
    async fn enqueue(&self, account_number: i64, command: &Command) -> Result<()> {
        let payload = serde_json::to_string(command).context("failed to serialize command")?;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .rpush(queue_key(account_number), payload)
            .await
            .context("redis RPUSH failed")?;
        Ok(())
    }

    async fn pop_batch(&self, account_number: i64, n: usize) -> Result<Vec<Command>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .lpop(queue_key(account_number), std::num::NonZeroUsize::new(n))
            .await
            .context("redis LPOP failed")?;

        let mut commands = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_str::<Command>(&entry) {
                Ok(cmd) => commands.push(cmd),
                Err(e) => tracing::warn!("dropping malformed queued command: {}", e),
            }
        }
        Ok(commands)
    }

    async fn publish_response(&self, command_id: Uuid, payload: &serde_json::Value) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .publish(response_channel(command_id), payload.to_string())
            .await
            .context("redis PUBLISH failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_key_is_per_account() {
        assert_eq!(queue_key(12345), "mt5:cmdqueue:12345");
        assert_ne!(queue_key(1), queue_key(2));
    }

    #[test]
    fn response_channel_is_per_command() {
        let id = Uuid::new_v4();
        assert_eq!(response_channel(id), format!("mt5:cmdresp:{}", id));
    }
}
