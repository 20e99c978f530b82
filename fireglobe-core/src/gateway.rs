//! LLM gateway - one prompt in, one completion out.
//!
//! Owns the sampling temperatures and validates the shape of the answer.
//! The gateway never retries: callers decide whether to serve a fallback.

use crate::config::LlmConfig;
use crate::error::{self, Result};
use crate::provider::{ChatMessage, CompletionRequest, LlmProvider, OpenAIProvider, UsageTracker};
use parking_lot::Mutex;
use std::sync::Arc;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_DETERMINISTIC_TEMPERATURE: f32 = 0.3;

pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    deterministic_temperature: f32,
    max_tokens: Option<usize>,
    usage: Mutex<UsageTracker>,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: DEFAULT_TEMPERATURE,
            deterministic_temperature: DEFAULT_DETERMINISTIC_TEMPERATURE,
            max_tokens: None,
            usage: Mutex::new(UsageTracker::new()),
        }
    }

    /// Build a gateway talking to the configured OpenAI-compatible endpoint
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = OpenAIProvider::new(config.provider_config())
            .map_err(|e| error::from_provider(e).with_operation("gateway::from_config"))?;
        Ok(Self::new(Arc::new(provider))
            .with_temperatures(config.temperature, config.deterministic_temperature)
            .with_max_tokens(config.max_tokens))
    }

    pub fn with_temperatures(mut self, exploratory: f32, deterministic: f32) -> Self {
        self.temperature = exploratory;
        self.deterministic_temperature = deterministic;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        self.provider.default_model()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn deterministic_temperature(&self) -> f32 {
        self.deterministic_temperature
    }

    /// Snapshot of accumulated usage
    pub fn usage(&self) -> UsageTracker {
        self.usage.lock().clone()
    }

    /// Send a single user prompt and return the completion text
    pub async fn complete(&self, prompt: &str, temperature: f32, max_tokens: Option<usize>) -> Result<String> {
        let mut request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(temperature);
        if let Some(max) = max_tokens.or(self.max_tokens) {
            request = request.with_max_tokens(max);
        }

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                self.usage.lock().track_failure();
                return Err(error::from_provider(e)
                    .with_operation("gateway::complete")
                    .with_context("model", self.model().to_string()));
            }
        };

        self.usage.lock().track(&response.model, &response.usage);

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(error::empty_completion()
                .with_operation("gateway::complete")
                .with_context("model", response.model)),
        }
    }

    /// Free-form generation at the exploratory temperature
    pub async fn complete_exploratory(&self, prompt: &str, max_tokens: Option<usize>) -> Result<String> {
        self.complete(prompt, self.temperature, max_tokens).await
    }

    /// Structured extraction at the lower temperature
    pub async fn complete_deterministic(&self, prompt: &str) -> Result<String> {
        self.complete(prompt, self.deterministic_temperature, None).await
    }
}
