//! Persona generation.
//!
//! Asks the model for `count` test personas tailored to the agent's stated
//! capabilities. The result always has exactly `count` entries: anything the
//! model gets wrong is replaced wholesale by the built-in fallback list.

use crate::error::{Error, Result};
use crate::gateway::LlmGateway;
use crate::sanitize::parse_json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Largest persona count served unless configured otherwise
pub const DEFAULT_MAX_PERSONALITIES: usize = 50;

/// A synthetic user profile scripting one side of a test conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    /// Trait summary
    pub personality: String,
    /// How this persona will exercise the agent
    pub description: String,
}

impl Persona {
    pub fn new(name: &str, personality: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            personality: personality.to_string(),
            description: description.to_string(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.personality.trim().is_empty()
            && !self.description.trim().is_empty()
    }
}

/// Outcome of a generation call
#[derive(Debug, Clone, Serialize)]
pub struct PersonaSet {
    pub personalities: Vec<Persona>,
    pub used_fallback: bool,
}

/// The built-in persona roster
pub fn fallback_roster() -> Vec<Persona> {
    vec![
        Persona::new(
            "CryptoMaximalist",
            "Extremely bullish on cryptocurrency, dismisses traditional finance",
            "A true believer who sees DeFi as the future of all financial systems",
        ),
        Persona::new(
            "RiskAverseTrader",
            "Conservative investor who prioritizes safety over returns",
            "Cautious and methodical, always asking about security audits and risk management",
        ),
        Persona::new(
            "YieldFarmer",
            "Constantly chasing the highest APY, moves funds frequently",
            "Optimized for maximum returns, always looking for the next best yield opportunity",
        ),
        Persona::new(
            "DeFiSkeptic",
            "Questions DeFi protocols, concerned about smart contract risks",
            "Critical thinker who challenges assumptions and looks for potential problems",
        ),
        Persona::new(
            "TechEnthusiast",
            "Fascinated by blockchain technology and smart contract mechanics",
            "Focuses on technical implementation, code quality, and innovative features",
        ),
        Persona::new(
            "RegulatoryConcerned",
            "Worried about compliance, KYC/AML requirements, and government intervention",
            "Always thinking about legal implications and regulatory compliance",
        ),
        Persona::new(
            "LiquidityProvider",
            "Provides liquidity to DEXs, concerned about impermanent loss and fees",
            "Focused on liquidity provision strategies and understanding market making",
        ),
        Persona::new(
            "DeFiNewbie",
            "New to DeFi, asks basic questions, needs guidance on protocols",
            "Learning-oriented, asks fundamental questions about how DeFi works",
        ),
        Persona::new(
            "ArbitrageHunter",
            "Looks for price differences across exchanges and protocols for profit",
            "Opportunistic trader focused on finding and exploiting market inefficiencies",
        ),
        Persona::new(
            "GovernanceParticipant",
            "Actively participates in DAO governance, votes on proposals, cares about decentralization",
            "Community-focused individual who values decentralized decision-making and protocol governance",
        ),
    ]
}

/// First `count` roster entries. Past the end of the roster, entries repeat
/// with a numeric suffix so names stay distinct.
pub fn fallback_personas(count: usize) -> Vec<Persona> {
    let roster = fallback_roster();
    (0..count)
        .map(|i| {
            let mut persona = roster[i % roster.len()].clone();
            let round = i / roster.len();
            if round > 0 {
                persona.name = format!("{}{}", persona.name, round + 1);
            }
            persona
        })
        .collect()
}

fn build_prompt(agent_description: &str, agent_capabilities: &str, count: usize) -> String {
    format!(
        r#"You are an expert at creating test personas for AI agents. Generate exactly {count} distinct personality types that would effectively test this specific agent's capabilities.

AGENT TO TEST:
Description: {agent_description}

AGENT CAPABILITIES (what it can do):
{agent_capabilities}

TASK: Generate {count} different personality types that will specifically test the agent's stated capabilities. Each personality should be designed to interact with and test one or more of the agent's specific functions.

REQUIREMENTS:
1. Generate exactly {count} personalities
2. Each personality should focus on testing specific capabilities mentioned above
3. Personalities should try to use the agent's actual features (transfers, swaps, NFTs, etc.)
4. Include variety: beginners who need guidance, experts who test edge cases, cautious users, aggressive users, etc.
5. Each personality should have realistic testing scenarios that match the agent's capabilities
6. Personalities should naturally trigger different tool calls and features

FORMAT: Return a STRICT JSON array with exactly this structure:
[
  {{
    "name": "PersonalityName",
    "personality": "Brief personality traits and characteristics",
    "description": "Detailed description of how this personality will test the agent's specific capabilities"
  }}
]

CRITICAL: Return ONLY the JSON array. No additional text, no explanations, no markdown formatting. Just the JSON array with exactly {count} personality objects."#
    )
}

/// Parse and validate a completion into exactly `count` complete personas
pub fn parse_personas(raw: &str, count: usize) -> Result<Vec<Persona>> {
    let personas: Vec<Persona> = parse_json(raw)?;

    if personas.len() != count {
        return Err(Error::validation_failed(format!(
            "expected {} personalities, got {}",
            count,
            personas.len()
        ))
        .with_operation("persona::parse"));
    }

    if let Some(index) = personas.iter().position(|p| !p.is_complete()) {
        return Err(Error::validation_failed("persona has an empty field")
            .with_operation("persona::parse")
            .with_context("index", index.to_string()));
    }

    Ok(personas)
}

pub struct PersonalityGenerator {
    gateway: Arc<LlmGateway>,
    max_count: usize,
}

impl PersonalityGenerator {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self {
            gateway,
            max_count: DEFAULT_MAX_PERSONALITIES,
        }
    }

    /// Counts above `max_count` are clamped to it
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count.max(1);
        self
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Generate `count` personas, at most `max_count`. Never fails; see
    /// `PersonaSet::used_fallback`.
    pub async fn generate(&self, agent_description: &str, agent_capabilities: &str, count: usize) -> PersonaSet {
        let count = if count > self.max_count {
            tracing::warn!("Requested {} personalities, clamping to {}", count, self.max_count);
            self.max_count
        } else {
            count
        };
        if count == 0 {
            return PersonaSet {
                personalities: Vec::new(),
                used_fallback: false,
            };
        }

        let prompt = build_prompt(agent_description, agent_capabilities, count);
        let outcome = match self.gateway.complete_deterministic(&prompt).await {
            Ok(raw) => parse_personas(&raw, count),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(personalities) => {
                tracing::info!("Generated {} personalities", personalities.len());
                PersonaSet {
                    personalities,
                    used_fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!("Personality generation fell back to built-in roster: {}", e);
                PersonaSet {
                    personalities: fallback_personas(count),
                    used_fallback: true,
                }
            }
        }
    }
}
