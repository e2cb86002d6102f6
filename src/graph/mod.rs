//! Graph store adapters
//!
//! The question-answering path only ever sees a [`GraphReader`]: it can read
//! the schema and run guarded read queries. Loading and wiping the graph are
//! maintenance operations on [`GraphAdmin`], which only the request service
//! holds.
//!
//! Two adapters are provided:
//! - [`Neo4jGraph`] talks to a Neo4j server over its HTTP transactional API
//! - [`MemoryGraph`] keeps the mentorship graph in process and evaluates a
//!   read-only Cypher subset (tests, local demos)

mod cypher;
pub mod guard;
pub mod memory;
pub mod neo4j;
pub mod schema;
pub mod seed;
pub mod tier;

pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;
pub use schema::{RelationshipPattern, SchemaDescription};
pub use seed::{MentorKind, PersonRecord, SeedError, SeedResult, SeedSource};
pub use tier::{MentorTier, MentorTiers, TierMismatch};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Label of person nodes
pub const PERSON_LABEL: &str = "Person";
/// Label of project nodes
pub const PROJECT_LABEL: &str = "Project";
/// Person works on a project
pub const WORKS_ON: &str = "WORKS_ON";

/// One result row; column order follows the query's RETURN clause.
pub type Row = IndexMap<String, serde_json::Value>;

/// Graph adapter errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// The query text contains a write keyword and was never executed
    #[error("Query rejected: `{0}` is not allowed in a read-only query")]
    MutationRejected(String),

    /// The store could not parse or evaluate the query
    #[error("Query error: {0}")]
    Query(String),

    /// The store could not be reached or refused the connection
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    /// The adapter was closed explicitly
    #[error("Graph store connection is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl GraphError {
    /// True when the failure is caused by the query text rather than the store
    pub fn is_query_error(&self) -> bool {
        matches!(self, GraphError::MutationRejected(_) | GraphError::Query(_))
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Counters reported by a bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Seed rows processed
    pub rows: usize,
    /// Person and Project nodes created (existing nodes are merged)
    pub nodes_created: usize,
    /// Edges created (existing edges are merged)
    pub relationships_created: usize,
    /// Mentorships whose mentor sits outside the expected tier
    pub tier_mismatches: usize,
}

/// Read side of a graph store, shared by concurrent requests
#[async_trait]
pub trait GraphReader: Send + Sync {
    /// Labels, relationship types and properties currently present
    async fn schema(&self) -> GraphResult<SchemaDescription>;

    /// Execute a read query. Fails closed with [`GraphError::MutationRejected`]
    /// before touching the store when the text contains a write keyword.
    async fn run_query(&self, query: &str) -> GraphResult<Vec<Row>>;
}

/// Maintenance side of a graph store
#[async_trait]
pub trait GraphAdmin: GraphReader {
    /// Merge persons, projects and their edges. Loading the same records
    /// twice creates nothing the second time.
    async fn load(&self, records: &[PersonRecord]) -> GraphResult<LoadSummary>;

    /// Delete every node and edge
    async fn clear(&self) -> GraphResult<()>;

    /// Release the connection; every later call fails with [`GraphError::Closed`]
    async fn close(&self) -> GraphResult<()>;
}
