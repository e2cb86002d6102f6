//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mentorgraph::graph::seed::parse_records;
use mentorgraph::graph::PersonRecord;
use mentorgraph::nlq::prompt::{CANONICAL_SECTION, GENERATION_TASK, RESULTS_SECTION};
use mentorgraph::{AppConfig, LanguageModel, ModelChoice, ModelRegistry, NLQError, NLQResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SEED_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/employees.csv");

pub const ADA_TECH_MENTOR: &str = "Who is the tech mentor of Ada Lovelace?";
pub const ADA_QUERY: &str =
    "MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(p:Person {full_name: 'Ada Lovelace'}) RETURN m.full_name AS mentor";

pub const INVENTORY_MEMBERS: &str = "Who works on the Inventory Management System?";
pub const INVENTORY_QUERY: &str = "MATCH (p:Person)-[:WORKS_ON]->(:Project {name: 'Inventory Management System'}) \
     RETURN p.full_name AS member ORDER BY member";

pub const CEO_CAREER_MENTOR: &str = "Who is the career mentor of Margaret Hamilton?";
pub const CEO_QUERY: &str =
    "MATCH (m:Person)-[:IS_CAREER_MENTOR_OF]->(p:Person {full_name: 'Margaret Hamilton'}) RETURN m.full_name AS mentor";

pub fn seed_records() -> Vec<PersonRecord> {
    let text = std::fs::read_to_string(SEED_PATH).unwrap();
    parse_records(&text).unwrap()
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.seed.source = SEED_PATH.to_string();
    config
}

/// Question between the `<Question>` tags of a prompt
pub fn question_of(prompt: &str) -> String {
    let start = prompt.rfind("<Question>\n").map(|i| i + "<Question>\n".len()).unwrap();
    let end = prompt[start..].find("\n</Question>").unwrap();
    prompt[start..start + end].to_string()
}

/// Deterministic stand-in for a language model.
///
/// Generation prompts get the scripted responses for their question, one per
/// attempt (the last one repeats). Answer prompts are answered by listing the
/// string and number values of the rows. Rephrase prompts get the scripted
/// rephrasing, or the question back.
#[derive(Default)]
pub struct ScriptedModel {
    queries: HashMap<String, Vec<String>>,
    rephrasings: HashMap<String, String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard questions over the seed data
    pub fn mentorship() -> Self {
        Self::new()
            .with_query(ADA_TECH_MENTOR, &[ADA_QUERY])
            .with_query(INVENTORY_MEMBERS, &[INVENTORY_QUERY])
            .with_query(CEO_CAREER_MENTOR, &[CEO_QUERY])
    }

    pub fn with_query(mut self, question: &str, responses: &[&str]) -> Self {
        self.queries
            .insert(question.to_string(), responses.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn with_rephrasing(mut self, question: &str, rephrased: &str) -> Self {
        self.rephrasings.insert(question.to_string(), rephrased.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn generation_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.contains(GENERATION_TASK))
            .collect()
    }

    fn answer_rows(prompt: &str) -> String {
        let start = prompt.find(RESULTS_SECTION).unwrap() + RESULTS_SECTION.len();
        let end = prompt.find("</Query Results>").unwrap();
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(prompt[start..end].trim()).unwrap();
        let values: Vec<String> = rows
            .iter()
            .flat_map(|row| row.values())
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
        format!("The answer is {}.", values.join(", "))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> NLQResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if prompt.contains(CANONICAL_SECTION) {
            let question = question_of(prompt);
            return Ok(self.rephrasings.get(&question).cloned().unwrap_or(question));
        }
        if prompt.contains(RESULTS_SECTION) {
            return Ok(Self::answer_rows(prompt));
        }

        let question = question_of(prompt);
        let Some(responses) = self.queries.get(&question) else {
            return Ok("I cannot write a query for that.".to_string());
        };
        let attempt = self
            .generation_prompts()
            .iter()
            .filter(|p| question_of(p) == question)
            .count();
        let index = (attempt - 1).min(responses.len() - 1);
        Ok(format!("```cypher\n{}\n```", responses[index]))
    }
}

/// Model whose backend is down
pub struct UnreachableModel;

#[async_trait]
impl LanguageModel for UnreachableModel {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _prompt: &str) -> NLQResult<String> {
        Err(NLQError::BackendUnavailable("connection refused".to_string()))
    }
}

pub fn registry(model: Arc<dyn LanguageModel>) -> ModelRegistry {
    let mut models = ModelRegistry::new();
    models.register(ModelChoice::Llama, model);
    models
}
