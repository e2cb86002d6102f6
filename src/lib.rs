//! Mentorgraph
//!
//! Natural-language question answering over a company mentorship graph.
//!
//! # Architecture
//!
//! - [`graph`]: graph store adapters (Neo4j over HTTP, in-process memory),
//!   schema description, read-only query gate and seed loading
//! - [`nlq`]: prompt orchestration; a language model writes a Cypher query,
//!   the store runs it and the model turns the rows into an answer
//! - [`service`]: request validation, schema cache, populate and reset
//! - [`http`]: axum routes over the service
//!
//! ## Example Usage
//!
//! ```rust
//! use mentorgraph::graph::{GraphAdmin, GraphReader, MemoryGraph, MentorKind, PersonRecord};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let graph = MemoryGraph::new();
//! let ada = PersonRecord::new(1, "Ada Lovelace", "Developer", "Engineering")
//!     .with_mentor(MentorKind::Tech, "Grace Hopper");
//! graph.load(&[ada]).await.unwrap();
//!
//! let rows = graph
//!     .run_query("MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(:Person {full_name: 'Ada Lovelace'}) RETURN m.full_name AS mentor")
//!     .await
//!     .unwrap();
//! assert_eq!(rows[0]["mentor"], "Grace Hopper");
//! # });
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod http;
pub mod nlq;
pub mod service;

// Re-export main types for convenience
pub use config::{AppConfig, ConfigError, ConfigResult};

pub use graph::{
    GraphAdmin, GraphError, GraphReader, GraphResult, LoadSummary, MemoryGraph, Neo4jGraph, Row,
    SchemaDescription,
};

pub use nlq::{Answer, AnswerKind, LanguageModel, ModelChoice, ModelRegistry, NLQError, NLQPipeline, NLQResult};

pub use service::{QaService, QuestionRequest, ServiceError, ServiceResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
