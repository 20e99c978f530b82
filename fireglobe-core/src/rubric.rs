//! Evaluation rubrics
//!
//! A rubric names the five sub-scores an evaluation must produce. Two presets
//! ship with the crate: a general conversation-quality rubric and a rubric
//! aimed at agents that act through on-chain tools.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of criteria every rubric carries
pub const RUBRIC_SIZE: usize = 5;

/// One named sub-score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// JSON key the model must return (e.g. `technicalDepth`)
    pub key: String,
    /// Human label used in the prompt
    pub label: String,
    /// Question the model answers when scoring
    pub description: String,
}

impl Criterion {
    pub fn new(key: &str, label: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    pub criteria: Vec<Criterion>,
}

impl Rubric {
    /// Conversation quality: helpfulness, accuracy, relevance, clarity, depth
    pub fn general() -> Self {
        Self {
            name: "general".into(),
            criteria: vec![
                Criterion::new("helpfulness", "Helpfulness", "Did the agent help the user achieve their goals?"),
                Criterion::new("accuracy", "Accuracy", "Were the agent's responses factually correct?"),
                Criterion::new(
                    "relevance",
                    "Relevance",
                    "Did the agent stay on topic and address the personality's specific concerns?",
                ),
                Criterion::new("clarity", "Clarity", "Were the responses clear and easy to understand?"),
                Criterion::new(
                    "technicalDepth",
                    "Technical Depth",
                    "Did the agent provide appropriate technical detail for this personality type?",
                ),
            ],
        }
    }

    /// Tool use: did the agent pick, parameterise and execute its tools well
    pub fn tool_use() -> Self {
        Self {
            name: "tool-use".into(),
            criteria: vec![
                Criterion::new(
                    "toolSelection",
                    "Tool Selection",
                    "Did the agent invoke the right capability for each request?",
                ),
                Criterion::new(
                    "parameterAccuracy",
                    "Parameter Accuracy",
                    "Were amounts, addresses, tokens and networks passed correctly?",
                ),
                Criterion::new(
                    "executionReliability",
                    "Execution Reliability",
                    "Did actions complete, and were failures reported honestly?",
                ),
                Criterion::new(
                    "transactionSafety",
                    "Transaction Safety",
                    "Did the agent confirm intent and warn about risk before moving funds?",
                ),
                Criterion::new(
                    "userGuidance",
                    "User Guidance",
                    "Did the agent explain what it did and what the user should do next?",
                ),
            ],
        }
    }

    /// Look up a built-in rubric by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "general" => Some(Self::general()),
            "tool-use" | "tool_use" => Some(Self::tool_use()),
            _ => None,
        }
    }

    pub fn preset_names() -> &'static [&'static str] {
        &["general", "tool-use"]
    }

    /// Build a custom rubric, rejecting anything but five distinct keys
    pub fn custom(name: impl Into<String>, criteria: Vec<Criterion>) -> Result<Self> {
        let rubric = Self {
            name: name.into(),
            criteria,
        };
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn validate(&self) -> Result<()> {
        if self.criteria.len() != RUBRIC_SIZE {
            return Err(Error::config_invalid(format!(
                "rubric must have exactly {} criteria, got {}",
                RUBRIC_SIZE,
                self.criteria.len()
            ))
            .with_context("rubric", self.name.clone()));
        }

        let mut seen = HashSet::new();
        for criterion in &self.criteria {
            if criterion.key.trim().is_empty() {
                return Err(Error::config_invalid("rubric criterion key is empty")
                    .with_context("rubric", self.name.clone()));
            }
            if !seen.insert(criterion.key.as_str()) {
                return Err(Error::config_invalid(format!("duplicate criterion '{}'", criterion.key))
                    .with_context("rubric", self.name.clone()));
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.key.as_str())
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::general()
    }
}

/// How a rubric is named in configuration: a preset name or a full list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RubricSetting {
    Preset(String),
    Custom(Vec<Criterion>),
}

impl Default for RubricSetting {
    fn default() -> Self {
        RubricSetting::Preset("general".into())
    }
}

impl RubricSetting {
    pub fn resolve(&self) -> Result<Rubric> {
        match self {
            RubricSetting::Preset(name) => Rubric::preset(name).ok_or_else(|| {
                Error::config_invalid(format!("unknown rubric preset '{}'", name))
                    .with_context("available", Rubric::preset_names().join(", "))
            }),
            RubricSetting::Custom(criteria) => Rubric::custom("custom", criteria.clone()),
        }
    }
}
