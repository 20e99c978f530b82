//! Test-run orchestration

use crate::agent::AgentUnderTest;
use crate::logger::ResultsLogger;
use crate::results::{overall_score, summarize, Conversation, ConversationStatus, TestResults};
use chrono::Utc;
use fireglobe_core::{extract_transaction, EvaluationResult, Message, Persona, Result, Role, TesterService, Transcript};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Phrases that mark an agent winding the conversation down
const END_PHRASES: &[&str] = &[
    "goodbye",
    "have a great day",
    "feel free to reach out",
    "is there anything else",
];

/// Fewest messages before a conversation may end early
const MIN_MESSAGES_BEFORE_END: usize = 4;

#[derive(Debug, Clone)]
pub struct TesterConfig {
    pub agent_description: String,
    pub agent_capabilities: String,
    pub num_personalities: usize,
    pub max_messages_per_conversation: usize,
    /// Pause between exchanges, to stay under rate limits
    pub turn_delay: Duration,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            agent_description: String::new(),
            agent_capabilities: String::new(),
            num_personalities: 10,
            max_messages_per_conversation: 10,
            turn_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestEvent {
    TestStarted { test_id: String },
    PersonalitiesGenerated { count: usize, used_fallback: bool },
    ConversationStarted { conversation_id: String, personality_name: String },
    MessageSent { conversation_id: String, role: Role, content: String },
    ConversationCompleted { conversation_id: String, status: ConversationStatus },
    EvaluationCompleted { conversation_id: String, score: u8 },
    Error { error: String, context: String },
    TestCompleted { test_id: String, overall_score: u8 },
}

/// True once the agent signs off, but never before four messages
pub fn should_end_conversation(messages: &[Message]) -> bool {
    if messages.len() < MIN_MESSAGES_BEFORE_END {
        return false;
    }
    match messages.last() {
        Some(last) => {
            let content = last.content.to_lowercase();
            END_PHRASES.iter().any(|phrase| content.contains(phrase))
        }
        None => false,
    }
}

pub struct AgentTester {
    service: Arc<TesterService>,
    config: TesterConfig,
    events: Option<mpsc::UnboundedSender<TestEvent>>,
    logger: Option<ResultsLogger>,
}

impl AgentTester {
    pub fn new(service: Arc<TesterService>, config: TesterConfig) -> Self {
        Self {
            service,
            config,
            events: None,
            logger: None,
        }
    }

    /// Receive progress events on the returned channel
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TestEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Log messages as they happen and save the final results
    pub fn with_logger(mut self, logger: ResultsLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    fn emit(&self, event: TestEvent) {
        if let Some(tx) = &self.events {
            // nobody listening is fine
            let _ = tx.send(event);
        }
    }

    async fn log(&self, conversation_id: &str, message: &Message) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_message(conversation_id, message).await {
                tracing::warn!("Failed to log message for {}: {}", conversation_id, e);
            }
        }
    }

    async fn append(&self, transcript: &mut Transcript, message: Message) -> Result<()> {
        self.emit(TestEvent::MessageSent {
            conversation_id: transcript.conversation_id.clone(),
            role: message.role,
            content: message.content.clone(),
        });
        self.log(&transcript.conversation_id, &message).await;
        transcript.push(message)
    }

    async fn converse<A: AgentUnderTest + ?Sized>(&self, agent: &mut A, persona: &Persona, transcript: &mut Transcript) -> Result<()> {
        agent.reset().await?;

        let max = self.config.max_messages_per_conversation;
        for i in 0..max {
            let turn = self
                .service
                .generate_turn(
                    persona,
                    transcript.messages(),
                    i == 0,
                    &self.config.agent_description,
                    Some(&transcript.conversation_id),
                )
                .await;
            self.append(transcript, Message::user(turn.message.clone())).await?;

            let reply = agent.send_message(&turn.message).await?;
            let tx = extract_transaction(&reply);
            self.append(transcript, Message::agent(reply)).await?;
            if let Some(tx) = tx {
                tracing::info!("Agent reply references transaction {}", tx.tx_hash);
                let _ = self.service.relay_reference(
                    &transcript.conversation_id,
                    &persona.name,
                    transcript.messages(),
                    &tx,
                );
            }

            if should_end_conversation(transcript.messages()) {
                tracing::debug!("Conversation {} ended by the agent", transcript.conversation_id);
                break;
            }
            if i + 1 < max && !self.config.turn_delay.is_zero() {
                tokio::time::sleep(self.config.turn_delay).await;
            }
        }
        Ok(())
    }

    async fn run_conversation<A: AgentUnderTest + ?Sized>(&self, agent: &mut A, persona: &Persona) -> Conversation {
        let conversation_id = Uuid::new_v4().to_string();
        let start_time = Utc::now();
        self.emit(TestEvent::ConversationStarted {
            conversation_id: conversation_id.clone(),
            personality_name: persona.name.clone(),
        });

        let mut transcript = Transcript::new(conversation_id.clone(), persona.name.clone());
        let outcome = self.converse(agent, persona, &mut transcript).await;
        transcript.close();

        let mut conversation = Conversation {
            id: conversation_id.clone(),
            personality_name: persona.name.clone(),
            messages: transcript.messages().to_vec(),
            start_time,
            end_time: Some(Utc::now()),
            status: ConversationStatus::Completed,
            error: None,
            stored_at: None,
        };

        match outcome {
            Ok(()) => {
                let service = self.service.clone();
                let messages = conversation.messages.clone();
                let name = persona.name.clone();
                let id = conversation_id.clone();
                let stored = tokio::task::spawn_blocking(move || service.store_conversation(&id, &name, &messages)).await;
                match stored {
                    Ok(outcome) if outcome.success => conversation.stored_at = Some(outcome.filepath),
                    Ok(_) => tracing::warn!("Conversation {} was not stored", conversation_id),
                    Err(e) => tracing::error!("Store task for {} failed: {}", conversation_id, e),
                }
            }
            Err(e) => {
                tracing::error!("Conversation with {} failed: {}", persona.name, e);
                conversation.status = ConversationStatus::Failed;
                conversation.error = Some(e.to_string());
                self.emit(TestEvent::Error {
                    error: format!("Failed conversation with {}: {}", persona.name, e.message()),
                    context: persona.name.clone(),
                });
            }
        }

        self.emit(TestEvent::ConversationCompleted {
            conversation_id,
            status: conversation.status,
        });
        conversation
    }

    /// Run the whole test against `agent`
    pub async fn run<A: AgentUnderTest + ?Sized>(&self, agent: &mut A) -> TestResults {
        let test_id = Uuid::new_v4().to_string();
        let start_time = Utc::now();
        self.emit(TestEvent::TestStarted {
            test_id: test_id.clone(),
        });
        tracing::info!("Starting test {}", test_id);

        let set = self
            .service
            .generate_personalities(
                &self.config.agent_description,
                &self.config.agent_capabilities,
                self.config.num_personalities,
            )
            .await;
        self.emit(TestEvent::PersonalitiesGenerated {
            count: set.personalities.len(),
            used_fallback: set.used_fallback,
        });

        let mut conversations = Vec::with_capacity(set.personalities.len());
        for persona in &set.personalities {
            conversations.push(self.run_conversation(agent, persona).await);
        }

        let mut evaluations: Vec<EvaluationResult> = Vec::new();
        for (persona, conversation) in set.personalities.iter().zip(&conversations) {
            if conversation.status != ConversationStatus::Completed {
                continue;
            }
            let evaluation = self.service.evaluate(persona, &conversation.messages).await;
            self.emit(TestEvent::EvaluationCompleted {
                conversation_id: conversation.id.clone(),
                score: evaluation.score,
            });
            evaluations.push(evaluation);
        }

        let results = TestResults {
            test_id: test_id.clone(),
            agent_description: self.config.agent_description.clone(),
            summary: summarize(&conversations, &evaluations),
            overall_score: overall_score(&evaluations),
            personalities: set.personalities,
            conversations,
            evaluations,
            start_time,
            end_time: Utc::now(),
        };

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.save_results(&results).await {
                tracing::error!("Failed to save test results: {}", e);
            }
        }

        tracing::info!("Test {} finished with overall score {}", test_id, results.overall_score);
        self.emit(TestEvent::TestCompleted {
            test_id,
            overall_score: results.overall_score,
        });
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fireglobe_core::{Error, ScriptedProvider, ServiceConfig};
    use serde_json::json;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Replies from a script; `fail_conversation` makes every message of that
    /// (1-based) conversation fail
    struct ScriptedAgent {
        replies: VecDeque<String>,
        resets: usize,
        fail_conversation: Option<usize>,
        received: Vec<String>,
    }

    impl ScriptedAgent {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|s| s.to_string()).collect(),
                resets: 0,
                fail_conversation: None,
                received: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl AgentUnderTest for ScriptedAgent {
        async fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            Ok(())
        }

        async fn send_message(&mut self, message: &str) -> Result<String> {
            if self.fail_conversation == Some(self.resets) {
                return Err(Error::unexpected("agent crashed"));
            }
            self.received.push(message.to_string());
            Ok(self.replies.pop_front().unwrap_or_else(|| "ok".to_string()))
        }
    }

    fn personas(names: &[&str]) -> String {
        let items: Vec<_> = names
            .iter()
            .map(|n| json!({ "name": n, "personality": "curious", "description": "asks about swaps" }))
            .collect();
        serde_json::Value::Array(items).to_string()
    }

    fn evaluation(score: u8, strength: &str) -> String {
        json!({
            "score": score,
            "criteria": {
                "helpfulness": score, "accuracy": score, "relevance": score,
                "clarity": score, "technicalDepth": score
            },
            "strengths": [strength],
            "weaknesses": ["slow"],
            "overallFeedback": "fine"
        })
        .to_string()
    }

    fn tester(dir: &TempDir, provider: ScriptedProvider, personas: usize, max_messages: usize) -> AgentTester {
        let mut config = ServiceConfig::default();
        config.storage.dir = dir.path().join("storage");
        let service = TesterService::with_provider(config, Arc::new(provider)).unwrap();
        AgentTester::new(
            Arc::new(service),
            TesterConfig {
                agent_description: "A DeFi agent".into(),
                agent_capabilities: "swaps".into(),
                num_personalities: personas,
                max_messages_per_conversation: max_messages,
                turn_delay: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_should_end_conversation() {
        let short = vec![Message::user("hi"), Message::agent("Goodbye!")];
        assert!(!should_end_conversation(&short));

        let mut long = vec![
            Message::user("a"),
            Message::agent("b"),
            Message::user("c"),
            Message::agent("Feel free to reach out any time."),
        ];
        assert!(should_end_conversation(&long));

        long.push(Message::agent("Here is the quote."));
        assert!(!should_end_conversation(&long));
    }

    #[tokio::test]
    async fn test_full_run() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new()
            .reply(personas(&["Alice", "Bob"]))
            .reply("Can you swap ETH?")
            .reply("What is the fee?")
            .reply("Is this audited?")
            .reply("Who audited it?")
            .reply(evaluation(80, "clear"))
            .reply(evaluation(61, "clear"));
        let mut tester = tester(&dir, provider, 2, 2);
        let mut events = tester.subscribe();
        let mut agent = ScriptedAgent::new(&["Sure", "0.3%", "Yes", "Firm X"]);

        let results = tester.run(&mut agent).await;

        assert_eq!(results.personalities.len(), 2);
        assert_eq!(results.conversations.len(), 2);
        assert!(results.conversations.iter().all(|c| c.status == ConversationStatus::Completed));
        assert!(results.conversations.iter().all(|c| c.messages.len() == 4));
        assert!(results.conversations.iter().all(|c| c.stored_at.is_some()));
        assert_eq!(results.conversations[0].messages[0].content, "Can you swap ETH?");
        assert_eq!(results.conversations[1].messages[1].content, "Yes");
        assert_eq!(agent.received, vec!["Can you swap ETH?", "What is the fee?", "Is this audited?", "Who audited it?"]);
        assert_eq!(agent.resets, 2);

        assert_eq!(results.evaluations.len(), 2);
        assert_eq!(results.overall_score, 71);
        assert_eq!(results.summary.top_strengths, vec!["clear"]);
        assert_eq!(results.summary.successful_conversations, 2);
        assert!(Uuid::parse_str(&results.test_id).is_ok());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(TestEvent::TestStarted { .. })));
        assert!(matches!(seen.last(), Some(TestEvent::TestCompleted { overall_score: 71, .. })));
        let sent = seen.iter().filter(|e| matches!(e, TestEvent::MessageSent { .. })).count();
        assert_eq!(sent, 8);
    }

    #[tokio::test]
    async fn test_agent_sign_off_ends_early() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new()
            .reply(personas(&["Alice"]))
            .reply("Hello")
            .reply("Thanks!")
            .reply(evaluation(90, "polite"));
        let tester = tester(&dir, provider, 1, 5);
        let mut agent = ScriptedAgent::new(&[
            "Is there anything else I can help with?",
            "Goodbye and have a great day!",
        ]);

        let results = tester.run(&mut agent).await;
        // the first sign-off comes before four messages and is ignored
        assert_eq!(results.conversations[0].messages.len(), 4);
        assert_eq!(results.overall_score, 90);
    }

    #[tokio::test]
    async fn test_failing_agent_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new()
            .reply(personas(&["Alice", "Bob"]))
            .reply("Alice says hi")
            .reply("Bob says hi")
            .reply("Bob follows up")
            .reply(evaluation(40, "tries"));
        let tester = tester(&dir, provider, 2, 2);
        let mut agent = ScriptedAgent::new(&[]);
        agent.fail_conversation = Some(1);

        let results = tester.run(&mut agent).await;

        assert_eq!(results.conversations[0].status, ConversationStatus::Failed);
        assert!(results.conversations[0].error.is_some());
        assert!(results.conversations[0].stored_at.is_none());
        assert_eq!(results.conversations[1].status, ConversationStatus::Completed);
        assert_eq!(results.evaluations.len(), 1);
        assert_eq!(results.evaluations[0].personality_name, "Bob");
        assert_eq!(results.summary.failed_conversations, 1);
        assert_eq!(results.overall_score, 40);
    }

    #[tokio::test]
    async fn test_results_are_logged() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new().reply(personas(&["Alice"])).reply("Hi");
        let logger = ResultsLogger::new(dir.path().join("logs")).unwrap();
        let tester = tester(&dir, provider, 1, 1).with_logger(logger.clone());
        let mut agent = ScriptedAgent::new(&["Hello"]);

        let results = tester.run(&mut agent).await;

        // evaluation script was exhausted: fallback score
        assert_eq!(results.overall_score, 50);
        let log = std::fs::read_to_string(logger.message_log_path(&results.conversations[0].id)).unwrap();
        assert_eq!(log.lines().count(), 2);
        let saved = std::fs::read_dir(logger.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("test_results_"))
            .count();
        assert_eq!(saved, 1);
    }

    #[tokio::test]
    async fn test_agent_transaction_is_relayed_with_its_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let app = axum::Router::new().route(
            "/analyze",
            axum::routing::post(move |axum::Json(body): axum::Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    axum::Json(json!({ "success": true }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = TempDir::new().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.dir = dir.path().join("storage");
        config.relay.base_url = Some(format!("http://{addr}"));
        let provider = ScriptedProvider::new().reply(personas(&["Alice"])).reply("Swap 1 ETH please");
        let service = TesterService::with_provider(config, Arc::new(provider)).unwrap();
        let tester = AgentTester::new(
            Arc::new(service),
            TesterConfig {
                agent_description: "A DeFi agent".into(),
                agent_capabilities: "swaps".into(),
                num_personalities: 1,
                max_messages_per_conversation: 1,
                turn_delay: Duration::ZERO,
            },
        );
        let hash = format!("0x{}", "cd".repeat(32));
        let reply = format!("Done, tx {hash} on polygon");
        let mut agent = ScriptedAgent::new(&[reply.as_str()]);

        let results = tester.run(&mut agent).await;

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["conversation_id"], results.conversations[0].id.as_str());
        assert_eq!(body["personality_name"], "Alice");
        assert_eq!(body["transaction_hash"], hash.as_str());
        assert_eq!(body["chain_id"], "137");
        let messages = body["conversation_messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "Swap 1 ETH please");
        assert_eq!(messages[1]["content"], reply.as_str());
    }
}
