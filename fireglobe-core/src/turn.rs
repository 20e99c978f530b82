//! Conversational turn generation.
//!
//! Produces the persona's next utterance, either an opening line or a reply
//! that carries the whole conversation so far. Failures never escape: the
//! caller always gets a usable message.

use crate::chain::{extract_transaction, TransactionReference};
use crate::error::{Error, Result};
use crate::gateway::LlmGateway;
use crate::persona::Persona;
use crate::transcript::{render_dialogue, Message};
use serde::Serialize;
use std::sync::Arc;

/// Sent whenever generation fails
pub const FALLBACK_MESSAGE: &str = "Hello! I'd like to learn more about what you can do.";

/// Token cap for a single utterance
pub const TURN_MAX_TOKENS: usize = 500;

/// Role labels the model tends to echo, checked in this order
pub const ROLE_PREFIXES: &[&str] = &[
    "You: ",
    "User: ",
    "Agent: ",
    "Message: ",
    "Response: ",
    "Your response: ",
    "Your opening message: ",
    "Opening message: ",
    "My response: ",
    "My message: ",
];

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedTurn {
    pub message: String,
    pub detected_transaction: Option<TransactionReference>,
    pub used_fallback: bool,
}

impl GeneratedTurn {
    fn fallback() -> Self {
        Self {
            message: FALLBACK_MESSAGE.to_string(),
            detected_transaction: None,
            used_fallback: true,
        }
    }
}

/// Strip the first matching role label, then keep only the first line
pub fn clean_utterance(raw: &str) -> String {
    let mut message = raw.trim();

    if let Some(rest) = ROLE_PREFIXES.iter().find_map(|prefix| message.strip_prefix(prefix)) {
        message = rest.trim();
    }

    message.lines().next().unwrap_or("").trim().to_string()
}

pub struct TurnGenerator {
    gateway: Arc<LlmGateway>,
    /// What kind of agent the persona is talking to, e.g. "DeFi blockchain agent"
    domain: String,
}

impl TurnGenerator {
    pub fn new(gateway: Arc<LlmGateway>, domain: impl Into<String>) -> Self {
        Self {
            gateway,
            domain: domain.into(),
        }
    }

    fn opening_prompt(&self, persona: &Persona, agent_description: &str) -> String {
        format!(
            "You are a real person with a specific personality, testing a {domain}.

Your Personality Traits: {traits}
Your Characteristics: {characteristics}

The Agent: {agent_description}

Task: Start a natural conversation with this agent. Be yourself - curious, cautious, excited, skeptical, or whatever fits YOUR personality.
Don't mention your personality traits explicitly. Just BE that person naturally.
Keep your message concise (1-3 sentences) and conversational.

Your opening message:",
            domain = self.domain,
            traits = persona.personality,
            characteristics = persona.description,
        )
    }

    fn follow_up_prompt(&self, persona: &Persona, transcript: &[Message]) -> String {
        format!(
            "You are continuing a conversation with a {domain}.

Your Personality Traits: {traits}
Your Characteristics: {characteristics}

FULL CONVERSATION SO FAR:
{history}

Task: Generate your next response based on what the agent just said.
- Reference what was discussed earlier if relevant
- Ask follow-up questions that show you were listening
- Show your personality naturally (cautious, excited, skeptical, etc.)
- Don't repeat what you or the agent already said
- Keep it concise (1-3 sentences) and natural
- If the agent answered your question, acknowledge it and ask something new
- If you're satisfied, you can say thanks and ask about something else

Your response:",
            domain = self.domain,
            traits = persona.personality,
            characteristics = persona.description,
            history = render_dialogue(transcript),
        )
    }

    async fn try_generate(
        &self,
        persona: &Persona,
        transcript: &[Message],
        is_initial: bool,
        agent_description: &str,
    ) -> Result<String> {
        let prompt = if is_initial {
            self.opening_prompt(persona, agent_description)
        } else {
            self.follow_up_prompt(persona, transcript)
        };

        let raw = self.gateway.complete_exploratory(&prompt, Some(TURN_MAX_TOKENS)).await?;
        let message = clean_utterance(&raw);
        if message.is_empty() {
            return Err(Error::validation_failed("utterance is empty after cleanup")
                .with_operation("turn::generate"));
        }
        if let Some(prefix) = ROLE_PREFIXES.iter().find(|prefix| message.starts_with(*prefix)) {
            return Err(Error::validation_failed("utterance still starts with a role label")
                .with_operation("turn::generate")
                .with_context("prefix", prefix.trim_end().to_string()));
        }
        Ok(message)
    }

    /// Generate the persona's next message. Never fails.
    pub async fn generate_turn(
        &self,
        persona: &Persona,
        transcript: &[Message],
        is_initial: bool,
        agent_description: &str,
    ) -> GeneratedTurn {
        match self.try_generate(persona, transcript, is_initial, agent_description).await {
            Ok(message) => {
                let detected_transaction = extract_transaction(&message);
                if let Some(tx) = &detected_transaction {
                    tracing::info!("Detected transaction {} on chain {}", tx.tx_hash, tx.chain_id);
                }
                GeneratedTurn {
                    message,
                    detected_transaction,
                    used_fallback: false,
                }
            }
            Err(e) => {
                tracing::error!("Message generation failed for {}: {}", persona.name, e);
                GeneratedTurn::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, ScriptedProvider};

    fn persona() -> Persona {
        Persona::new("RiskAverseTrader", "Cautious and skeptical", "Asks about audits before swapping")
    }

    fn turn_generator(provider: ScriptedProvider) -> (TurnGenerator, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let gateway = Arc::new(LlmGateway::new(provider.clone()));
        (TurnGenerator::new(gateway, "DeFi blockchain agent"), provider)
    }

    #[test]
    fn test_clean_utterance_strips_first_prefix_only() {
        assert_eq!(clean_utterance("You: Hello there"), "Hello there");
        assert_eq!(clean_utterance("Response: Agent: hi"), "Agent: hi");
        assert_eq!(clean_utterance("  Your opening message: Is this audited?  "), "Is this audited?");
    }

    #[test]
    fn test_clean_utterance_keeps_first_line() {
        assert_eq!(
            clean_utterance("How do fees work?\nAgent: Fees are 0.3%.\nYou: thanks"),
            "How do fees work?"
        );
        assert_eq!(clean_utterance("\n\n"), "");
    }

    #[test]
    fn test_prefix_list_order() {
        assert_eq!(clean_utterance("Your response: fine"), "fine");
        // only "User: " is stripped; the echoed "You: " stays
        assert_eq!(clean_utterance("User: You: hi"), "You: hi");
    }

    #[tokio::test]
    async fn test_stacked_role_labels_fall_back() {
        let (generator, _) =
            turn_generator(ScriptedProvider::new().reply("Response: You: Is this swap safe?"));
        let turn = generator.generate_turn(&persona(), &[], true, "A DeFi agent").await;

        assert!(turn.used_fallback);
        assert_eq!(turn.message, FALLBACK_MESSAGE);
        assert!(ROLE_PREFIXES.iter().all(|p| !turn.message.starts_with(p)));
    }

    #[tokio::test]
    async fn test_opening_message() {
        let (generator, provider) =
            turn_generator(ScriptedProvider::new().reply("Your opening message: Hi, is it safe to swap here?\nmore"));
        let turn = generator.generate_turn(&persona(), &[], true, "A DeFi agent").await;

        assert!(!turn.used_fallback);
        assert_eq!(turn.message, "Hi, is it safe to swap here?");
        assert!(!turn.message.contains('\n'));
        assert!(ROLE_PREFIXES.iter().all(|p| !turn.message.starts_with(p)));

        let prompt = provider.prompt_at(0).unwrap();
        assert!(prompt.contains("Your opening message:"));
        assert!(prompt.contains("The Agent: A DeFi agent"));
        let request = &provider.requests()[0];
        assert_eq!(request.max_tokens, Some(TURN_MAX_TOKENS));
        assert_eq!(request.temperature, Some(crate::gateway::DEFAULT_TEMPERATURE));
    }

    #[tokio::test]
    async fn test_follow_up_embeds_history() {
        let (generator, provider) = turn_generator(ScriptedProvider::new().reply("What about slippage?"));
        let history = vec![Message::user("Can you swap?"), Message::agent("Yes, which tokens?")];
        let turn = generator.generate_turn(&persona(), &history, false, "ignored").await;

        assert_eq!(turn.message, "What about slippage?");
        let prompt = provider.prompt_at(0).unwrap();
        assert!(prompt.contains("FULL CONVERSATION SO FAR:\nYou: Can you swap?\n\nAgent: Yes, which tokens?"));
    }

    #[tokio::test]
    async fn test_detects_transaction_in_message() {
        let hash = format!("0x{}", "ab".repeat(32));
        let (generator, _) = turn_generator(
            ScriptedProvider::new().reply(format!("Can you check {hash} on polygon?")),
        );
        let turn = generator.generate_turn(&persona(), &[], false, "").await;

        let tx = turn.detected_transaction.unwrap();
        assert_eq!(tx.tx_hash, hash);
        assert_eq!(tx.chain_id, "137");
    }

    #[tokio::test]
    async fn test_failures_return_static_greeting() {
        let (generator, _) = turn_generator(
            ScriptedProvider::new().fail(ProviderError::Api { status: 500, message: "oops".into() }),
        );

        let turn = generator.generate_turn(&persona(), &[], true, "").await;
        assert!(turn.used_fallback);
        assert_eq!(turn.message, FALLBACK_MESSAGE);
        assert!(turn.detected_transaction.is_none());

        // exhausted script: transport error path
        let turn = generator.generate_turn(&persona(), &[], false, "").await;
        assert_eq!(turn.message, FALLBACK_MESSAGE);
    }
}
