//! The shared core every transport adapter calls into.

use crate::chain::TransactionReference;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::evaluator::{ConversationEvaluator, EvaluationResult};
use crate::gateway::LlmGateway;
use crate::persona::{Persona, PersonaSet, PersonalityGenerator};
use crate::provider::LlmProvider;
use crate::relay::{
    AnalysisCache, AnalysisRequest, DispatchHandle, DispatchOutcome, RelayClient, RelayDispatcher, RetryPolicy,
    TransactionAnalysis,
};
use crate::rubric::Rubric;
use crate::store::{StoreOutcome, TranscriptStore};
use crate::transcript::Message;
use crate::turn::{GeneratedTurn, TurnGenerator};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub model: String,
    pub relay_enabled: bool,
    pub llm_calls: usize,
}

struct Relay {
    client: Arc<RelayClient>,
    dispatcher: RelayDispatcher,
}

pub struct TesterService {
    config: ServiceConfig,
    gateway: Arc<LlmGateway>,
    personas: PersonalityGenerator,
    turns: TurnGenerator,
    evaluator: ConversationEvaluator,
    store: TranscriptStore,
    relay: Option<Relay>,
    analyses: AnalysisCache,
}

impl TesterService {
    /// Build from configuration, talking to the configured completion endpoint.
    /// Must be called inside a tokio runtime when a relay is configured.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let gateway = LlmGateway::from_config(&config.llm)?;
        Self::with_gateway(config, gateway)
    }

    /// Build with an explicit completion provider
    pub fn with_provider(config: ServiceConfig, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let gateway = LlmGateway::new(provider)
            .with_temperatures(config.llm.temperature, config.llm.deterministic_temperature)
            .with_max_tokens(config.llm.max_tokens);
        Self::with_gateway(config, gateway)
    }

    fn with_gateway(config: ServiceConfig, gateway: LlmGateway) -> Result<Self> {
        config.validate()?;
        let rubric = config.rubric()?;
        let gateway = Arc::new(gateway);
        let store = TranscriptStore::new(&config.storage.dir)?;

        let relay = RelayClient::from_config(&config.relay)?.map(|client| {
            let client = Arc::new(client);
            let dispatcher = RelayDispatcher::spawn(
                client.clone(),
                RetryPolicy::from_config(&config.relay),
                config.relay.queue_capacity,
            );
            tracing::info!("Relay enabled at {}", client.base_url());
            Relay { client, dispatcher }
        });

        let domain = config.evaluation.domain.clone();
        Ok(Self {
            personas: PersonalityGenerator::new(gateway.clone())
                .with_max_count(config.evaluation.max_personalities),
            turns: TurnGenerator::new(gateway.clone(), domain.clone()),
            evaluator: ConversationEvaluator::new(gateway.clone(), rubric, domain),
            analyses: AnalysisCache::new(config.relay.cache_capacity, config.relay.cache_ttl()),
            gateway,
            store,
            relay,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.gateway
    }

    pub fn rubric(&self) -> &Rubric {
        self.evaluator.rubric()
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Largest persona count a single request is served
    pub fn max_personalities(&self) -> usize {
        self.personas.max_count()
    }

    pub fn relay_enabled(&self) -> bool {
        self.relay.is_some()
    }

    pub async fn generate_personalities(
        &self,
        agent_description: &str,
        agent_capabilities: &str,
        count: usize,
    ) -> PersonaSet {
        self.personas.generate(agent_description, agent_capabilities, count).await
    }

    /// Next persona utterance. A transaction reference in the generated text
    /// is relayed in the background under `conversation_id`.
    pub async fn generate_turn(
        &self,
        persona: &Persona,
        transcript: &[Message],
        is_initial: bool,
        agent_description: &str,
        conversation_id: Option<&str>,
    ) -> GeneratedTurn {
        let turn = self
            .turns
            .generate_turn(persona, transcript, is_initial, agent_description)
            .await;

        if let Some(tx) = &turn.detected_transaction {
            let conversation_id = conversation_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("conv_{}", Utc::now().timestamp_millis()));
            let mut messages = transcript.to_vec();
            messages.push(Message::user(turn.message.clone()));
            // fire and forget
            let _ = self.relay_transaction(AnalysisRequest::new(conversation_id, &persona.name, messages, tx));
        }

        turn
    }

    pub async fn evaluate(&self, persona: &Persona, transcript: &[Message]) -> EvaluationResult {
        self.evaluator.evaluate(persona, transcript).await
    }

    pub fn store_conversation(&self, conversation_id: &str, personality_name: &str, messages: &[Message]) -> StoreOutcome {
        self.store.store(conversation_id, personality_name, messages)
    }

    /// Queue a relay delivery. Fails only when no relay is configured.
    pub fn relay_transaction(&self, request: AnalysisRequest) -> Result<DispatchHandle> {
        match &self.relay {
            Some(relay) => Ok(relay.dispatcher.dispatch(request)),
            None => {
                tracing::warn!(
                    "Relay not configured; dropping analysis request for {}",
                    request.transaction_hash
                );
                Err(Error::relay_unavailable("relay is not configured")
                    .with_operation("service::relay_transaction")
                    .permanent())
            }
        }
    }

    /// Relay a transaction reference found in an agent reply
    pub fn relay_reference(
        &self,
        conversation_id: &str,
        personality_name: &str,
        messages: &[Message],
        tx: &TransactionReference,
    ) -> DispatchHandle {
        let request = AnalysisRequest::new(conversation_id, personality_name, messages.to_vec(), tx);
        self.relay_transaction(request).unwrap_or_else(|e| {
            DispatchHandle::ready(DispatchOutcome::Failed {
                attempts: 0,
                error: e.to_string(),
            })
        })
    }

    /// Cached analysis, else ask the relay and cache what it returns
    pub async fn transaction_analysis(&self, tx_hash: &str) -> Option<TransactionAnalysis> {
        if let Some(found) = self.analyses.get(tx_hash) {
            return Some(found);
        }
        let relay = self.relay.as_ref()?;
        let fetched = relay.client.fetch_analysis(tx_hash).await?;
        self.analyses.put(tx_hash, fetched.clone());
        Some(fetched)
    }

    /// Accept an analysis pushed back by the relay
    pub fn record_analysis(&self, tx_hash: &str, analysis: String, timestamp: Option<String>) {
        let timestamp = timestamp.unwrap_or_else(|| Utc::now().to_rfc3339());
        tracing::info!("Received analysis for {}", tx_hash);
        self.analyses.put(tx_hash, TransactionAnalysis { analysis, timestamp });
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339(),
            model: self.gateway.model().to_string(),
            relay_enabled: self.relay_enabled(),
            llm_calls: self.gateway.usage().total_calls,
        }
    }
}
