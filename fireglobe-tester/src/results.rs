//! Outcome of a test run

use chrono::{DateTime, Utc};
use fireglobe_core::{EvaluationResult, Message, Persona};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub personality_name: String,
    pub messages: Vec<Message>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the transcript was stored, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total_conversations: usize,
    pub successful_conversations: usize,
    pub failed_conversations: usize,
    pub average_score: u8,
    pub top_strengths: Vec<String>,
    pub top_weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub test_id: String,
    pub agent_description: String,
    pub personalities: Vec<Persona>,
    pub conversations: Vec<Conversation>,
    pub evaluations: Vec<EvaluationResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub overall_score: u8,
    pub summary: TestSummary,
}

/// Rounded mean score, 0 when nothing was evaluated
pub fn overall_score(evaluations: &[EvaluationResult]) -> u8 {
    if evaluations.is_empty() {
        return 0;
    }
    let sum: u32 = evaluations.iter().map(|e| u32::from(e.score)).sum();
    (f64::from(sum) / evaluations.len() as f64).round() as u8
}

/// The `limit` most frequent items. Equal counts keep first-seen order.
pub fn top_items<'a>(items: impl IntoIterator<Item = &'a String>, limit: usize) -> Vec<String> {
    let mut counts: Vec<(&'a String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(item, _)| item.clone()).collect()
}

pub fn summarize(conversations: &[Conversation], evaluations: &[EvaluationResult]) -> TestSummary {
    let successful = conversations
        .iter()
        .filter(|c| c.status == ConversationStatus::Completed)
        .count();

    TestSummary {
        total_conversations: conversations.len(),
        successful_conversations: successful,
        failed_conversations: conversations.len() - successful,
        average_score: overall_score(evaluations),
        top_strengths: top_items(evaluations.iter().flat_map(|e| &e.strengths), 5),
        top_weaknesses: top_items(evaluations.iter().flat_map(|e| &e.weaknesses), 5),
    }
}
