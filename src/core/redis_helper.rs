use actix_web::web;
use redis::AsyncCommands;
use std::time::Duration;

pub struct RedisHelper {
    client: web::Data<redis::Client>,
}

#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    #[error("Redis connection error: {0}")]
    ConnectionError(#[from] redis::RedisError),
}

impl RedisHelper {
    pub fn new(client: web::Data<redis::Client>) -> Self {
        Self { client }
    }

    async fn get_conn(&self) -> Result<redis::aio::Connection, RedisError> {
        self.client
            .get_async_connection()
            .await
            .map_err(RedisError::ConnectionError)
    }

    /// `SET key 1 NX EX ttl`. Returns `true` when the key was free and is
    /// now held for `ttl`, `false` when someone already holds it.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, RedisError> {
        let mut conn = self.get_conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, RedisError> {
        let mut conn = self.get_conn().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }
}

pub fn code_cooldown_key(qualified_identifier: &str) -> String {
    format!("login_code_cooldown:{}", qualified_identifier)
}
