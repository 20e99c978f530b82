//! Transaction references in free text.
//!
//! A transaction hash is `0x` followed by exactly 64 hex digits. The chain is
//! guessed from keywords in the surrounding message using an ordered rule
//! list: the first matching rule wins, so more specific phrases come first.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const BASE_SEPOLIA: &str = "84532";
pub const BASE_MAINNET: &str = "8453";
pub const ETHEREUM_MAINNET: &str = "1";
pub const POLYGON: &str = "137";
pub const ARBITRUM: &str = "42161";
pub const OPTIMISM: &str = "10";

/// Chain assumed when no rule matches
pub const DEFAULT_CHAIN: &str = BASE_SEPOLIA;

static TX_HASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b0x[0-9a-fA-F]{64}\b").expect("transaction hash pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReference {
    pub tx_hash: String,
    pub chain_id: String,
}

struct ChainRule {
    chain_id: &'static str,
    matches: fn(&str) -> bool,
}

// Order matters: bare "base" must only be reached once the mainnet phrasings
// have been ruled out.
static CHAIN_RULES: &[ChainRule] = &[
    ChainRule {
        chain_id: BASE_SEPOLIA,
        matches: |t| t.contains("base-sepolia") || t.contains("base sepolia"),
    },
    ChainRule {
        chain_id: BASE_MAINNET,
        matches: |t| t.contains("base mainnet") || (t.contains("base") && t.contains("mainnet")),
    },
    ChainRule {
        chain_id: BASE_SEPOLIA,
        matches: |t| t.contains("base"),
    },
    ChainRule {
        chain_id: ETHEREUM_MAINNET,
        matches: |t| t.contains("ethereum mainnet") || (t.contains("ethereum") && t.contains("mainnet")),
    },
    ChainRule {
        chain_id: POLYGON,
        matches: |t| t.contains("polygon"),
    },
    ChainRule {
        chain_id: ARBITRUM,
        matches: |t| t.contains("arbitrum"),
    },
    ChainRule {
        chain_id: OPTIMISM,
        matches: |t| t.contains("optimism"),
    },
];

/// Classify the chain a message talks about
pub fn detect_chain(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    CHAIN_RULES
        .iter()
        .find(|rule| (rule.matches)(&lowered))
        .map(|rule| rule.chain_id)
        .unwrap_or(DEFAULT_CHAIN)
}

/// First transaction hash in `text`, with its guessed chain
pub fn extract_transaction(text: &str) -> Option<TransactionReference> {
    let hash = TX_HASH.find(text)?;
    Some(TransactionReference {
        tx_hash: hash.as_str().to_string(),
        chain_id: detect_chain(text).to_string(),
    })
}
