use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::wire::{RelayReply, RelayRequest};

/// The client's view of the chat relay: one request in, one reply text out.
#[async_trait]
pub trait Relay: Send + Sync + 'static {
    async fn send(&self, request: &RelayRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpRelay {
    client: Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn send(&self, request: &RelayRequest) -> Result<String> {
        let url = format!("{}/ai-chat", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Relay request failed with status: {}", response.status()));
        }

        let reply: RelayReply = response.json().await?;
        Ok(reply.message)
    }
}
