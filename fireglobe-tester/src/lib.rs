//! # Fireglobe Tester
//!
//! Runs a whole test against an agent:
//! 1. Generate personas for the agent's description and capabilities
//! 2. For each persona, hold a conversation of up to N exchanges
//! 3. Store every finished transcript
//! 4. Score each completed conversation and summarize the run
//!
//! Progress is reported as a stream of [`TestEvent`]s.

mod agent;
mod logger;
mod results;
mod tester;

pub use agent::{AgentUnderTest, HttpAgent};
pub use logger::ResultsLogger;
pub use results::{Conversation, ConversationStatus, TestResults, TestSummary};
pub use tester::{should_end_conversation, AgentTester, TestEvent, TesterConfig};
