//! The agent on the other side of the conversation

use async_trait::async_trait;
use fireglobe_core::{Error, ErrorKind, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// An agent that can be put through a test conversation
#[async_trait]
pub trait AgentUnderTest: Send {
    /// Clear conversational state before a new persona starts
    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Send one user message and return the agent's reply
    async fn send_message(&mut self, message: &str) -> Result<String>;
}

/// Agent reachable over HTTP.
///
/// Each message is POSTed as `{"message": ...}`; the reply is read from the
/// `response` field, or `message` if that is absent.
pub struct HttpAgent {
    client: Client,
    url: String,
    reset_url: Option<String>,
}

impl HttpAgent {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::config_invalid(format!("Failed to create HTTP client: {}", e)).with_operation("agent::new")
        })?;
        Ok(Self {
            client,
            url: url.into(),
            reset_url: None,
        })
    }

    /// Endpoint POSTed to on every reset
    pub fn with_reset_url(mut self, url: impl Into<String>) -> Self {
        self.reset_url = Some(url.into());
        self
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value> {
        let response = self.client.post(url).json(&body).send().await.map_err(|e| {
            Error::new(ErrorKind::NetworkFailed, e.to_string())
                .with_operation("agent::post")
                .with_context("url", url.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::new(ErrorKind::NetworkFailed, format!("agent answered {}", status.as_u16()))
                .with_operation("agent::post")
                .with_context("body", text));
        }

        response.json().await.map_err(|e| {
            Error::parse_failed(format!("agent reply is not JSON: {}", e)).with_operation("agent::post")
        })
    }
}

#[async_trait]
impl AgentUnderTest for HttpAgent {
    async fn reset(&mut self) -> Result<()> {
        match &self.reset_url {
            Some(url) => self.post(url, json!({})).await.map(|_| ()),
            None => Ok(()),
        }
    }

    async fn send_message(&mut self, message: &str) -> Result<String> {
        let reply = self.post(&self.url, json!({ "message": message })).await?;
        reply
            .get("response")
            .or_else(|| reply.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::parse_failed("agent reply has no 'response' or 'message' field")
                    .with_operation("agent::send_message")
            })
    }
}
