//! Request service
//!
//! Owns the graph store, the question-answering pipeline and the cached
//! schema. Populate and reset are serialized; answering only ever reads the
//! cached schema and goes through the read-only side of the store.

use crate::config::AppConfig;
use crate::graph::{GraphAdmin, GraphError, GraphReader, MentorTiers, SchemaDescription, SeedError, SeedSource};
use crate::nlq::{Answer, ModelChoice, ModelRegistry, NLQError, NLQPipeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A model or the graph store could not serve an answer
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Graph store error: {0}")]
    Store(#[from] GraphError),

    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),
}

impl From<NLQError> for ServiceError {
    fn from(err: NLQError) -> Self {
        ServiceError::BackendUnavailable(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A question as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub model: ModelChoice,
    /// Overrides the configured rephrase default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rephrase: Option<bool>,
}

impl QuestionRequest {
    pub fn new(question: &str, model: ModelChoice) -> Self {
        Self {
            question: question.to_string(),
            model,
            rephrase: None,
        }
    }

    fn validate(&self) -> ServiceResult<&str> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(ServiceError::InvalidRequest("question must not be empty".to_string()));
        }
        Ok(question)
    }
}

pub struct QaService {
    store: Arc<dyn GraphAdmin>,
    pipeline: NLQPipeline,
    seed: SeedSource,
    tiers: MentorTiers,
    rephrase_by_default: bool,
    schema: RwLock<SchemaDescription>,
    admin: Mutex<()>,
}

impl QaService {
    /// Build the service and read the current schema from the store
    pub async fn start<S: GraphAdmin + 'static>(
        store: Arc<S>,
        models: ModelRegistry,
        config: &AppConfig,
    ) -> ServiceResult<Self> {
        let reader: Arc<dyn GraphReader> = store.clone();
        let service = Self {
            store,
            pipeline: NLQPipeline::new(reader, models, config.pipeline.clone()),
            seed: SeedSource::parse(&config.seed.source),
            tiers: config.mentor_tiers.clone(),
            rephrase_by_default: config.pipeline.rephrase,
            schema: RwLock::new(SchemaDescription::new()),
            admin: Mutex::new(()),
        };
        service.refresh_schema().await?;
        Ok(service)
    }

    pub async fn answer(&self, request: &QuestionRequest) -> ServiceResult<Answer> {
        let question = request.validate()?;
        let schema = self.schema.read().await.clone();
        let rephrase = request.rephrase.unwrap_or(self.rephrase_by_default);

        let answer = self
            .pipeline
            .answer(question, request.model, &schema, rephrase)
            .await
            .map_err(|e| {
                warn!("Answering failed: {}", e);
                ServiceError::from(e)
            })?;
        info!("Answered with {:?}", answer.kind);
        Ok(answer)
    }

    /// Rephrased question text; the original question when the model fails
    /// to produce one in time
    pub async fn rephrase(&self, request: &QuestionRequest) -> ServiceResult<String> {
        let question = request.validate()?;
        match self.pipeline.rephrase(question, request.model).await {
            Ok(rephrased) => Ok(rephrased.text().to_string()),
            Err(e) if e.is_stage_local() => {
                warn!("Rephrase failed, returning the question unchanged: {}", e);
                Ok(question.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the seed table into the store and return the new schema
    pub async fn populate(&self) -> ServiceResult<SchemaDescription> {
        let _guard = self.admin.lock().await;

        info!("Populating graph from {}", self.seed);
        let text = self.seed.fetch().await?;
        let records = crate::graph::seed::parse_records(&text)?;

        let mismatches = self.tiers.mismatches(&records);
        for m in &mismatches {
            warn!(
                "{:?} mentor {} ({:?}) of {} ({:?}) is outside the expected tier",
                m.kind, m.mentor, m.mentor_tier, m.mentee, m.mentee_tier
            );
        }

        let mut summary = self.store.load(&records).await?;
        summary.tier_mismatches = mismatches.len();
        info!(
            "Populated {} rows: {} nodes and {} relationships created, {} tier mismatches",
            summary.rows, summary.nodes_created, summary.relationships_created, summary.tier_mismatches
        );

        self.refresh_schema().await
    }

    /// Delete everything and return the (empty) schema
    pub async fn reset(&self) -> ServiceResult<SchemaDescription> {
        let _guard = self.admin.lock().await;
        self.store.clear().await?;
        info!("Graph cleared");
        self.refresh_schema().await
    }

    /// Cached schema
    pub async fn schema(&self) -> SchemaDescription {
        self.schema.read().await.clone()
    }

    pub async fn refresh_schema(&self) -> ServiceResult<SchemaDescription> {
        let schema = self.store.schema().await?;
        *self.schema.write().await = schema.clone();
        Ok(schema)
    }

    pub fn available_models(&self) -> Vec<ModelChoice> {
        self.pipeline.models().available()
    }

    pub async fn close(&self) -> ServiceResult<()> {
        Ok(self.store.close().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn test_request_json() {
        let request: QuestionRequest =
            serde_json::from_str(r#"{"question": "Who mentors Ada?", "model": "llama"}"#).unwrap();
        assert_eq!(request.model, ModelChoice::Llama);
        assert_eq!(request.rephrase, None);

        assert!(serde_json::from_str::<QuestionRequest>(r#"{"question": "q", "model": "gpt"}"#).is_err());
        assert!(serde_json::from_str::<QuestionRequest>(r#"{"question": "q"}"#).is_err());
    }

    #[tokio::test]
    async fn test_blank_question_is_invalid() {
        let service = QaService::start(Arc::new(MemoryGraph::new()), ModelRegistry::new(), &AppConfig::default())
            .await
            .unwrap();
        let err = service
            .answer(&QuestionRequest::new("   ", ModelChoice::Llama))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_seed_file_surfaces() {
        let mut config = AppConfig::default();
        config.seed.source = "/nonexistent/employees.csv".to_string();
        let service = QaService::start(Arc::new(MemoryGraph::new()), ModelRegistry::new(), &config)
            .await
            .unwrap();
        assert!(matches!(service.populate().await, Err(ServiceError::Seed(SeedError::Io(_)))));
    }

    #[test]
    fn test_nlq_errors_map_to_unavailable() {
        let err: ServiceError = NLQError::Graph(GraphError::Closed).into();
        assert!(matches!(err, ServiceError::BackendUnavailable(_)));
    }
}
