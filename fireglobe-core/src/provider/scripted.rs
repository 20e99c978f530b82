//! Scripted provider - replays canned completions in order

use super::*;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A provider that answers from a queue of prepared results and records
/// every request it receives. An exhausted queue answers with a network error.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(content.into()));
        self
    }

    /// Queue a failed completion
    pub fn fail(self, error: ProviderError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// The user prompt of the n-th request
    pub fn prompt_at(&self, index: usize) -> Option<String> {
        self.requests
            .lock()
            .get(index)
            .and_then(|r| r.messages.last().map(|m| m.content.clone()))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.clone().unwrap_or_else(|| self.default_model().to_string());
        self.requests.lock().push(request);

        let next = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())));

        next.map(|content| CompletionResponse {
            id: "scripted".into(),
            model,
            content: Some(content),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }
}
