//! Upstash Redis REST API (secondary remote tier).
//!
//! Commands are sent as a JSON array to the database's REST URL with a bearer
//! token; replies are `{"result": ...}` or `{"error": "..."}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::remote::{CacheTierError, RemoteStore};

#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct UpstashStore {
    http_client: Client,
    rest_url: String,
    token: String,
}

impl UpstashStore {
    pub fn new(rest_url: &str, token: &str, timeout: Duration) -> Result<Self, CacheTierError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheTierError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            rest_url: rest_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn command(&self, args: &[&str]) -> Result<Value, CacheTierError> {
        let response = self
            .http_client
            .post(&self.rest_url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(|e| CacheTierError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CacheTierError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let reply: UpstashReply = response
            .json()
            .await
            .map_err(|e| CacheTierError::Decode(e.without_url().to_string()))?;

        if let Some(error) = reply.error {
            return Err(CacheTierError::Command(error));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl RemoteStore for UpstashStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheTierError> {
        match self.command(&["GET", key]).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(CacheTierError::Decode(format!(
                "unexpected GET reply: {other}"
            ))),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheTierError> {
        let ttl = ttl_secs.to_string();
        self.command(&["SET", key, value, "EX", &ttl]).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheTierError> {
        self.command(&["DEL", key]).await?;
        Ok(())
    }
}
