//! Request and response bodies of the REST surface

use fireglobe_core::chain::TransactionReference;
use fireglobe_core::{Message, Persona};
use serde::{Deserialize, Serialize};

fn default_count() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct GeneratePersonalitiesRequest {
    pub agent_description: String,
    pub agent_capabilities: String,
    #[serde(default = "default_count")]
    pub num_personalities: usize,
}

#[derive(Debug, Serialize)]
pub struct GeneratePersonalitiesResponse {
    pub success: bool,
    pub personalities: Vec<Persona>,
    pub used_fallback: bool,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateMessageRequest {
    pub personality: Persona,
    #[serde(default)]
    pub previous_messages: Vec<Message>,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub agent_description: String,
    /// Carried to the relay when the message names a transaction
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateMessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_transaction: Option<TransactionReference>,
    pub used_fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub personality_name: String,
    pub personality: String,
    pub description: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub conversation_id: String,
    pub personality_name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub success: bool,
    pub filepath: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeTransactionRequest {
    pub conversation_id: String,
    pub personality_name: String,
    #[serde(default)]
    pub conversation_messages: Vec<Message>,
    pub transaction_hash: String,
    pub chain_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GetAnalysisRequest {
    pub transaction_hash: String,
}

#[derive(Debug, Serialize)]
pub struct GetAnalysisResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisResultRequest {
    pub transaction_hash: String,
    pub analysis: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Acknowledgement for relay endpoints
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}
