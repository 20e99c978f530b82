//! Conversation scoring.
//!
//! Renders the transcript, asks the model to score it against the configured
//! rubric and parses the structured answer. Any failure yields the fixed
//! degraded result (every score 50), never an error.

use crate::error::{Error, Result};
use crate::gateway::LlmGateway;
use crate::persona::Persona;
use crate::rubric::Rubric;
use crate::sanitize::parse_json;
use crate::transcript::{render_for_evaluation, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const FALLBACK_SCORE: u8 = 50;
pub const FALLBACK_STRENGTH: &str = "Error occurred during evaluation";
pub const FALLBACK_WEAKNESS: &str = "Unable to complete evaluation";
pub const FALLBACK_FEEDBACK: &str = "Evaluation failed due to an error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub conversation_id: String,
    pub personality_name: String,
    /// Overall score in [0, 100]
    pub score: u8,
    /// Rubric key -> sub-score in [0, 100]
    pub criteria: BTreeMap<String, u8>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub overall_feedback: String,
    pub timestamp: DateTime<Utc>,
}

/// What the model is asked to return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
    score: f64,
    criteria: BTreeMap<String, f64>,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    overall_feedback: String,
}

fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// `eval_<unix seconds>.<micros>`: an opaque correlation id
pub fn evaluation_id(now: DateTime<Utc>) -> String {
    format!("eval_{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

pub struct ConversationEvaluator {
    gateway: Arc<LlmGateway>,
    rubric: Rubric,
    domain: String,
}

impl ConversationEvaluator {
    pub fn new(gateway: Arc<LlmGateway>, rubric: Rubric, domain: impl Into<String>) -> Self {
        Self {
            gateway,
            rubric,
            domain: domain.into(),
        }
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    fn build_prompt(&self, persona: &Persona, transcript: &[Message]) -> String {
        let criteria_list = self
            .rubric
            .criteria
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {} - {}", i + 1, c.label, c.description))
            .collect::<Vec<_>>()
            .join("\n");

        let criteria_shape = self
            .rubric
            .criteria
            .iter()
            .map(|c| format!("    \"{}\": <score>", c.key))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            r#"You are an expert at evaluating AI agent conversations. Evaluate the following conversation between a {domain} and a user.

PERSONALITY TESTING:
Name: {name}
Traits: {traits}
Description: {description}

CONVERSATION:
{conversation}

TASK: Evaluate the agent's performance based on how well it addressed this specific personality's needs and concerns.

Evaluate on these criteria (0-100 for each):
{criteria_list}

Return STRICT JSON format:
{{
  "score": <overall score 0-100>,
  "criteria": {{
{criteria_shape}
  }},
  "strengths": ["strength1", "strength2", "strength3"],
  "weaknesses": ["weakness1", "weakness2", "weakness3"],
  "overallFeedback": "Brief overall assessment"
}}

Return ONLY the JSON. No markdown, no explanations."#,
            domain = self.domain,
            name = persona.name,
            traits = persona.personality,
            description = persona.description,
            conversation = render_for_evaluation(transcript),
        )
    }

    /// Parse a completion into scores for exactly this rubric
    fn parse(&self, raw: &str) -> Result<RawEvaluation> {
        let parsed: RawEvaluation = parse_json(raw)?;
        if let Some(missing) = self.rubric.keys().find(|k| !parsed.criteria.contains_key(*k)) {
            return Err(Error::parse_failed(format!("criteria is missing '{}'", missing))
                .with_operation("evaluator::parse")
                .with_context("rubric", self.rubric.name.clone()));
        }
        Ok(parsed)
    }

    fn fallback(&self, personality_name: &str, now: DateTime<Utc>) -> EvaluationResult {
        EvaluationResult {
            conversation_id: evaluation_id(now),
            personality_name: personality_name.to_string(),
            score: FALLBACK_SCORE,
            criteria: self
                .rubric
                .keys()
                .map(|k| (k.to_string(), FALLBACK_SCORE))
                .collect(),
            strengths: vec![FALLBACK_STRENGTH.to_string()],
            weaknesses: vec![FALLBACK_WEAKNESS.to_string()],
            overall_feedback: FALLBACK_FEEDBACK.to_string(),
            timestamp: now,
        }
    }

    /// Score a transcript. Never fails.
    pub async fn evaluate(&self, persona: &Persona, transcript: &[Message]) -> EvaluationResult {
        let prompt = self.build_prompt(persona, transcript);
        let outcome = match self.gateway.complete_deterministic(&prompt).await {
            Ok(raw) => self.parse(&raw),
            Err(e) => Err(e),
        };

        let now = Utc::now();
        match outcome {
            Ok(raw) => {
                let criteria = self
                    .rubric
                    .keys()
                    .map(|k| (k.to_string(), clamp_score(raw.criteria[k])))
                    .collect();
                let result = EvaluationResult {
                    conversation_id: evaluation_id(now),
                    personality_name: persona.name.clone(),
                    score: clamp_score(raw.score),
                    criteria,
                    strengths: raw.strengths,
                    weaknesses: raw.weaknesses,
                    overall_feedback: raw.overall_feedback,
                    timestamp: now,
                };
                tracing::info!("Evaluated conversation for {}: score {}", persona.name, result.score);
                result
            }
            Err(e) => {
                tracing::error!("Failed to evaluate conversation for {}: {}", persona.name, e);
                self.fallback(&persona.name, now)
            }
        }
    }
}
