//! Cross-agent relay.
//!
//! Transaction hashes spotted in a conversation are forwarded to a peer
//! analysis service. Delivery goes through [`RelayDispatcher`] so callers
//! never wait on it; results come back either by polling
//! [`RelayClient::fetch_analysis`] or pushed into the [`AnalysisCache`].

pub mod cache;
pub mod dispatch;

pub use cache::AnalysisCache;
pub use dispatch::{DispatchHandle, DispatchOutcome, RelayDispatcher, RetryPolicy};

use crate::chain::TransactionReference;
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::transcript::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body sent to the peer service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub conversation_id: String,
    pub personality_name: String,
    pub conversation_messages: Vec<Message>,
    pub transaction_hash: String,
    pub chain_id: String,
}

impl AnalysisRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        personality_name: impl Into<String>,
        conversation_messages: Vec<Message>,
        tx: &TransactionReference,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            personality_name: personality_name.into(),
            conversation_messages,
            transaction_hash: tx.tx_hash.clone(),
            chain_id: tx.chain_id.clone(),
        }
    }
}

/// Analysis produced by the peer service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAnalysis {
    pub analysis: String,
    pub timestamp: String,
}

/// Where analysis requests are delivered
#[async_trait]
pub trait AnalysisSink: Send + Sync {
    /// One delivery attempt
    async fn deliver(&self, request: &AnalysisRequest) -> Result<()>;
}

/// HTTP client for the peer analysis service
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::config_invalid(format!("Failed to create HTTP client: {}", e))
                .with_operation("relay::new")
        })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// `None` when no relay is configured
    pub fn from_config(config: &RelayConfig) -> Result<Option<Self>> {
        match &config.base_url {
            Some(url) => Self::new(url.clone(), config.timeout()).map(Some),
            None => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn try_fetch(&self, tx_hash: &str) -> Result<TransactionAnalysis> {
        let url = format!("{}/analysis/{}", self.base_url, tx_hash);
        let response = self.client.get(&url).send().await.map_err(|e| {
            Error::relay_unavailable(e.to_string())
                .with_operation("relay::fetch_analysis")
                .with_context("url", url.clone())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::relay_unavailable(format!("relay answered {}", status.as_u16()))
                .with_operation("relay::fetch_analysis")
                .with_context("url", url));
        }

        response.json().await.map_err(|e| {
            Error::parse_failed(format!("relay analysis is malformed: {}", e))
                .with_operation("relay::fetch_analysis")
        })
    }

    /// Look up the analysis for `tx_hash`. Never fails: any error is `None`.
    pub async fn fetch_analysis(&self, tx_hash: &str) -> Option<TransactionAnalysis> {
        match self.try_fetch(tx_hash).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!("No analysis for {}: {}", tx_hash, e);
                None
            }
        }
    }
}

#[async_trait]
impl AnalysisSink for RelayClient {
    async fn deliver(&self, request: &AnalysisRequest) -> Result<()> {
        let url = format!("{}/analyze", self.base_url);
        let response = self.client.post(&url).json(request).send().await.map_err(|e| {
            Error::relay_unavailable(e.to_string())
                .with_operation("relay::deliver")
                .with_context("url", url.clone())
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::relay_unavailable(format!("relay answered {}", status.as_u16()))
                .with_operation("relay::deliver")
                .with_context("body", body))
        }
    }
}
