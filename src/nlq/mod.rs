//! Natural Language Querying (NLQ)
//!
//! Turns a free-text question into a validated read-only Cypher query, runs
//! it, and turns the rows back into a one-sentence answer.

pub mod client;
pub mod pipeline;
pub mod prompt;
pub mod rephrase;

pub use client::{LanguageModel, ModelRegistry, NLQClient};
pub use pipeline::NLQPipeline;
pub use rephrase::{CanonicalTemplate, Rephrased};

use crate::graph::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Canonical reply when the graph holds nothing relevant
pub const ANSWER_UNKNOWN: &str = "I don't know the answer.";
/// Canonical reply when no valid query could be produced or run in time
pub const COULD_NOT_ANSWER: &str = "I could not answer that question.";

/// Pipeline stage, used in timeout reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rephrase,
    QueryGeneration,
    QueryExecution,
    AnswerSynthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Rephrase => "rephrase",
            Stage::QueryGeneration => "query generation",
            Stage::QueryExecution => "query execution",
            Stage::AnswerSynthesis => "answer synthesis",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum NLQError {
    /// The model or graph backend could not be reached or answered with an error
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Generated query is malformed, writes, or references unknown schema elements
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl NLQError {
    /// Failures confined to one question; the caller gets a "could not
    /// answer" reply instead of an error.
    pub fn is_stage_local(&self) -> bool {
        matches!(self, NLQError::InvalidQuery(_) | NLQError::Timeout { .. })
    }
}

pub type NLQResult<T> = Result<T, NLQError>;

/// Model backend selected per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelChoice {
    #[serde(rename = "llama")]
    Llama,
    #[serde(rename = "openai")]
    OpenAI,
}

impl ModelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Llama => "llama",
            ModelChoice::OpenAI => "openai",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Synthesized from query results
    Answered,
    /// The query ran but found nothing
    Unknown,
    /// No valid query could be produced or executed in time
    Unanswerable,
}

/// Final reply for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    /// The executed query, when one ran
    pub query: Option<String>,
}

impl Answer {
    pub fn answered(text: String, query: String) -> Self {
        Self {
            text,
            kind: AnswerKind::Answered,
            query: Some(query),
        }
    }

    pub fn unknown(query: Option<String>) -> Self {
        Self {
            text: ANSWER_UNKNOWN.to_string(),
            kind: AnswerKind::Unknown,
            query,
        }
    }

    pub fn unanswerable() -> Self {
        Self {
            text: COULD_NOT_ANSWER.to_string(),
            kind: AnswerKind::Unanswerable,
            query: None,
        }
    }
}
