//! # Fireglobe Core
//!
//! Drives synthetic test conversations against an AI agent and scores them.
//!
//! ## Core Concepts
//! - **Gateway**: one prompt in, one completion out, over an OpenAI-compatible API
//! - **Personas**: generated test users, with a built-in roster as fallback
//! - **Turns**: the persona's next utterance, cleaned down to a single line
//! - **Evaluation**: rubric-based scoring of a finished transcript
//! - **Store**: one JSON file per stored transcript
//! - **Relay**: transaction hashes forwarded to a peer analysis service
//!
//! Every generation path degrades to fixed fallback content instead of
//! failing; storage and relay report failure through their return values.

pub mod chain;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gateway;
pub mod persona;
pub mod provider;
pub mod relay;
pub mod rubric;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod transcript;
pub mod turn;

pub use chain::{detect_chain, extract_transaction, TransactionReference};
pub use config::{ServiceConfig, TransportMode};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use evaluator::{ConversationEvaluator, EvaluationResult};
pub use gateway::LlmGateway;
pub use persona::{Persona, PersonaSet, PersonalityGenerator};
pub use provider::{LlmProvider, OpenAIProvider, ProviderConfig, ProviderError};
pub use relay::{AnalysisCache, AnalysisRequest, DispatchHandle, DispatchOutcome, TransactionAnalysis};
pub use rubric::{Criterion, Rubric, RubricSetting};
pub use sanitize::{parse_json, sanitize_json_response};
pub use service::{HealthReport, TesterService};
pub use store::{StoreOutcome, StoredTranscript, TranscriptStore};
pub use transcript::{Message, Role, Transcript};
pub use turn::{GeneratedTurn, TurnGenerator};

#[cfg(any(test, feature = "test-support"))]
pub use provider::ScriptedProvider;
