//! Question → query → rows → answer

use super::prompt::{self, Rejection};
use super::rephrase::Rephrased;
use super::{Answer, LanguageModel, ModelChoice, ModelRegistry, NLQError, NLQResult, Stage, ANSWER_UNKNOWN};
use crate::config::PipelineConfig;
use crate::graph::{guard, GraphReader, Row, SchemaDescription};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct NLQPipeline {
    graph: Arc<dyn GraphReader>,
    models: ModelRegistry,
    config: PipelineConfig,
}

impl NLQPipeline {
    pub fn new(graph: Arc<dyn GraphReader>, models: ModelRegistry, config: PipelineConfig) -> Self {
        Self { graph, models, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Map the question onto a canonical form when the model finds one
    pub async fn rephrase(&self, question: &str, choice: ModelChoice) -> NLQResult<Rephrased> {
        let model = self.models.get(choice)?;
        self.rephrase_with(model.as_ref(), question).await
    }

    /// Generate and validate a read-only query for the question
    pub async fn generate_query(
        &self,
        question: &str,
        schema: &SchemaDescription,
        choice: ModelChoice,
    ) -> NLQResult<String> {
        let model = self.models.get(choice)?;
        self.attempt_query(model.as_ref(), question, schema, None)
            .await?
            .map_err(|rejection| NLQError::InvalidQuery(rejection.reason))
    }

    /// Turn query rows into a short answer
    pub async fn synthesize_answer(&self, question: &str, rows: &[Row], choice: ModelChoice) -> NLQResult<String> {
        if rows_are_empty(rows) {
            return Ok(ANSWER_UNKNOWN.to_string());
        }
        let model = self.models.get(choice)?;
        self.synthesize_with(model.as_ref(), question, rows).await
    }

    /// Full question-answering flow. Failures confined to this question end
    /// in [`Answer::unanswerable`]; unreachable backends are errors.
    pub async fn answer(
        &self,
        question: &str,
        choice: ModelChoice,
        schema: &SchemaDescription,
        rephrase: bool,
    ) -> NLQResult<Answer> {
        if schema.is_empty() {
            info!("Graph is empty, skipping query generation");
            return Ok(Answer::unknown(None));
        }

        let model = self.models.get(choice)?;
        let model = model.as_ref();
        info!("Answering question with {} ({})", choice, model.name());

        let generation_question = if rephrase {
            match self.rephrase_with(model, question).await {
                Ok(rephrased) => {
                    debug!("Rephrased question: {:?}", rephrased);
                    rephrased.text().to_string()
                }
                Err(e) if e.is_stage_local() => {
                    warn!("Rephrase failed, using the original question: {}", e);
                    question.trim().to_string()
                }
                Err(e) => return Err(e),
            }
        } else {
            question.trim().to_string()
        };

        let mut rejection: Option<Rejection> = None;
        for attempt in 1..=self.config.max_query_attempts {
            let query = match self
                .attempt_query(model, &generation_question, schema, rejection.as_ref())
                .await
            {
                Ok(Ok(query)) => query,
                Ok(Err(rejected)) => {
                    warn!("Attempt {} produced an invalid query: {}", attempt, rejected.reason);
                    rejection = Some(rejected);
                    continue;
                }
                Err(e) if e.is_stage_local() => {
                    warn!("Query generation failed: {}", e);
                    return Ok(Answer::unanswerable());
                }
                Err(e) => return Err(e),
            };
            debug!("Generated query: {}", query);

            let rows = match self.execute(&query).await {
                Ok(rows) => rows,
                Err(NLQError::InvalidQuery(reason)) => {
                    warn!("Attempt {} failed in the store: {}", attempt, reason);
                    rejection = Some(Rejection { query, reason });
                    continue;
                }
                Err(e) if e.is_stage_local() => {
                    warn!("Query execution failed: {}", e);
                    return Ok(Answer::unanswerable());
                }
                Err(e) => return Err(e),
            };
            debug!("Query returned {} rows", rows.len());

            if rows_are_empty(&rows) {
                return Ok(Answer::unknown(Some(query)));
            }

            return match self.synthesize_with(model, question, &rows).await {
                Ok(text) if text == ANSWER_UNKNOWN => Ok(Answer::unknown(Some(query))),
                Ok(text) => Ok(Answer::answered(text, query)),
                Err(e) if e.is_stage_local() => {
                    warn!("Answer synthesis failed: {}", e);
                    Ok(Answer::unanswerable())
                }
                Err(e) => Err(e),
            };
        }

        warn!(
            "No valid query after {} attempts",
            self.config.max_query_attempts
        );
        Ok(Answer::unanswerable())
    }

    async fn rephrase_with(&self, model: &dyn LanguageModel, question: &str) -> NLQResult<Rephrased> {
        let prompt = prompt::render_rephrase(question);
        let output = self.call_model(Stage::Rephrase, model.complete(&prompt)).await?;
        if output.trim().is_empty() {
            return Ok(Rephrased::Passthrough(question.trim().to_string()));
        }
        Ok(Rephrased::classify(&output))
    }

    /// One generation round. The outer error is a backend failure or timeout,
    /// the inner one a query that failed validation.
    async fn attempt_query(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        schema: &SchemaDescription,
        rejection: Option<&Rejection>,
    ) -> NLQResult<Result<String, Rejection>> {
        let prompt = prompt::render_generation(question, schema, rejection);
        let output = self.call_model(Stage::QueryGeneration, model.complete(&prompt)).await?;
        let candidate = prompt::extract_cypher(&output);
        Ok(validate_query(&candidate, schema).map_err(|reason| Rejection {
            query: candidate,
            reason,
        }))
    }

    async fn synthesize_with(&self, model: &dyn LanguageModel, question: &str, rows: &[Row]) -> NLQResult<String> {
        let prompt = prompt::render_answer(question, rows, self.config.top_k)?;
        let output = self.call_model(Stage::AnswerSynthesis, model.complete(&prompt)).await?;
        let text = output.trim();
        if text.is_empty() {
            Ok(ANSWER_UNKNOWN.to_string())
        } else {
            Ok(text.to_string())
        }
    }

    async fn execute(&self, query: &str) -> NLQResult<Vec<Row>> {
        let after = self.config.query_timeout();
        match timeout(after, self.graph.run_query(query)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) if e.is_query_error() => Err(NLQError::InvalidQuery(e.to_string())),
            Ok(Err(e)) => Err(NLQError::Graph(e)),
            Err(_) => Err(NLQError::Timeout {
                stage: Stage::QueryExecution,
                after,
            }),
        }
    }

    async fn call_model<F>(&self, stage: Stage, call: F) -> NLQResult<String>
    where
        F: Future<Output = NLQResult<String>>,
    {
        let after: Duration = self.config.model_timeout();
        timeout(after, call)
            .await
            .unwrap_or(Err(NLQError::Timeout { stage, after }))
    }
}

/// Check a candidate query before it reaches the store; the error is the
/// reason fed back to the model.
pub fn validate_query(candidate: &str, schema: &SchemaDescription) -> Result<String, String> {
    if candidate.trim().is_empty() {
        return Err("the response contained no query".to_string());
    }
    let query = prompt::single_statement(candidate).map_err(|e| e.to_string())?;
    guard::ensure_read_only(&query).map_err(|e| e.to_string())?;
    schema.check_references(&query)?;
    Ok(query)
}

/// No rows, or only nulls and empty lists
fn rows_are_empty(rows: &[Row]) -> bool {
    rows.iter().all(|row| {
        row.values().all(|value| match value {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            _ => false,
        })
    })
}
