//! Neo4j adapter over the HTTP transactional endpoint
//!
//! Every call posts to `{url}/db/{database}/tx/commit`. The reqwest client
//! pools connections, so one adapter is shared by all concurrent requests.

use super::seed::{mentorship_pairs, MentorKind, PersonRecord};
use super::{
    guard, GraphAdmin, GraphError, GraphReader, GraphResult, LoadSummary, Row, SchemaDescription,
    PERSON_LABEL, PROJECT_LABEL, WORKS_ON,
};
use crate::config::Neo4jConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: Value,
    #[serde(rename = "includeStats")]
    include_stats: bool,
}

#[derive(Serialize)]
struct Transaction<'a> {
    statements: Vec<Statement<'a>>,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    data: Vec<RowData>,
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Deserialize)]
struct RowData {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

#[derive(Deserialize, Default)]
struct Stats {
    #[serde(default)]
    nodes_created: usize,
    #[serde(default)]
    relationships_created: usize,
}

/// Transaction access mode, sent as the `access-mode` header. Neo4j refuses
/// writes inside a `Read` transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    fn as_str(self) -> &'static str {
        match self {
            AccessMode::Read => "READ",
            AccessMode::Write => "WRITE",
        }
    }
}

/// Rows of one executed statement
struct StatementRows {
    rows: Vec<Row>,
    stats: Stats,
}

/// Neo4j graph store
pub struct Neo4jGraph {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    closed: AtomicBool,
}

impl Neo4jGraph {
    /// Create an adapter with explicit credentials. No request is sent until
    /// the first call.
    pub fn new(config: &Neo4jConfig) -> GraphResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;

        let endpoint = format!(
            "{}/db/{}/tx/commit",
            config.url.trim_end_matches('/'),
            config.database
        );

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> GraphResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(GraphError::Closed)
        } else {
            Ok(())
        }
    }

    /// Run statements in one transaction, unguarded. Only called with
    /// statements built in this module or already checked by the guard.
    async fn execute(&self, mode: AccessMode, statements: &[(&str, Value)]) -> GraphResult<Vec<StatementRows>> {
        self.ensure_open()?;

        let body = Transaction {
            statements: statements
                .iter()
                .map(|(statement, parameters)| Statement {
                    statement: *statement,
                    parameters: parameters.clone(),
                    include_stats: true,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header("access-mode", mode.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GraphError::Unavailable(format!("Neo4j returned {}", resp.status())));
        }

        let result: TxResponse = resp
            .json()
            .await
            .map_err(|e| GraphError::SerializationError(e.to_string()))?;

        if let Some(err) = result.errors.into_iter().next() {
            return Err(classify_error(err));
        }

        Ok(result
            .results
            .into_iter()
            .map(|statement| {
                let rows = statement
                    .data
                    .into_iter()
                    .map(|data| statement.columns.iter().cloned().zip(data.row).collect::<Row>())
                    .collect();
                StatementRows {
                    rows,
                    stats: statement.stats.unwrap_or_default(),
                }
            })
            .collect())
    }
}

fn classify_error(err: Neo4jError) -> GraphError {
    let message = format!("{}: {}", err.code, err.message);
    if err.code.starts_with("Neo.ClientError.Statement") {
        GraphError::Query(message)
    } else {
        // security, transient and database errors all mean the store is unusable
        GraphError::Unavailable(message)
    }
}

/// `["String"]` -> `STRING`, `["Long"]` -> `INTEGER`
fn neo4j_type(types: &Value) -> String {
    let first = types
        .as_array()
        .and_then(|t| t.first())
        .and_then(|t| t.as_str())
        .unwrap_or("Any");
    match first {
        "Long" | "Integer" => "INTEGER".to_string(),
        "Double" | "Float" => "FLOAT".to_string(),
        "StringArray" | "LongArray" | "DoubleArray" | "BooleanArray" => "LIST".to_string(),
        other => other.to_uppercase(),
    }
}

/// ":`WORKS_ON`" -> "WORKS_ON"
fn strip_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').trim_matches('`').to_string()
}

const NODE_PROPERTIES: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName, propertyTypes \
     RETURN nodeLabels, propertyName, propertyTypes";

const REL_PROPERTIES: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName, propertyTypes \
     RETURN relType, propertyName, propertyTypes";

const REL_PATTERNS: &str = "MATCH (a)-[r]->(b) \
     UNWIND labels(a) AS start UNWIND labels(b) AS end \
     RETURN DISTINCT start, type(r) AS rel_type, end";

#[async_trait]
impl GraphReader for Neo4jGraph {
    async fn schema(&self) -> GraphResult<SchemaDescription> {
        let results = self
            .execute(
                AccessMode::Read,
                &[
                    (NODE_PROPERTIES, json!({})),
                    (REL_PROPERTIES, json!({})),
                    (REL_PATTERNS, json!({})),
                ],
            )
            .await?;
        let [nodes, rels, patterns] = <[StatementRows; 3]>::try_from(results)
            .map_err(|_| GraphError::SerializationError("schema statements missing".to_string()))?;

        let mut schema = SchemaDescription::new();
        for row in nodes.rows {
            let labels = row.get("nodeLabels").and_then(Value::as_array).cloned().unwrap_or_default();
            for label in labels.iter().filter_map(Value::as_str) {
                let entry = schema.node_labels.entry(label.to_string()).or_default();
                if let Some(name) = row.get("propertyName").and_then(Value::as_str) {
                    let ty = row.get("propertyTypes").map(neo4j_type).unwrap_or_default();
                    entry.insert(name.to_string(), ty);
                }
            }
        }
        for row in rels.rows {
            let Some(rel_type) = row.get("relType").and_then(Value::as_str) else {
                continue;
            };
            let entry = schema.relationship_types.entry(strip_rel_type(rel_type)).or_default();
            if let Some(name) = row.get("propertyName").and_then(Value::as_str) {
                let ty = row.get("propertyTypes").map(neo4j_type).unwrap_or_default();
                entry.insert(name.to_string(), ty);
            }
        }
        for row in patterns.rows {
            let field = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
            schema.record_relationship(&field("start"), &field("rel_type"), &field("end"));
        }

        Ok(schema)
    }

    async fn run_query(&self, query: &str) -> GraphResult<Vec<Row>> {
        guard::ensure_read_only(query)?;
        debug!("Executing read query: {}", query);
        let mut results = self.execute(AccessMode::Read, &[(query, json!({}))]).await?;
        Ok(results.pop().map(|r| r.rows).unwrap_or_default())
    }
}

#[async_trait]
impl GraphAdmin for Neo4jGraph {
    async fn load(&self, records: &[PersonRecord]) -> GraphResult<LoadSummary> {
        let persons: Vec<Value> = records
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "full_name": r.full_name.trim(),
                    "position": r.position,
                    "department": r.department,
                    "career_mentor": r.mentor_field(MentorKind::Career),
                    "tech_mentor": r.mentor_field(MentorKind::Tech),
                })
            })
            .collect();

        let works_on: Vec<Value> = records
            .iter()
            .flat_map(|r| {
                r.projects
                    .iter()
                    .map(move |p| json!({ "person": r.full_name.trim(), "project": p.trim() }))
            })
            .collect();

        let merge_persons = format!(
            "UNWIND $rows AS row \
             MERGE (p:{person} {{full_name: row.full_name}}) \
             SET p.id = row.id, p.position = row.position, p.department = row.department, \
                 p.career_mentor = row.career_mentor, p.tech_mentor = row.tech_mentor",
            person = PERSON_LABEL
        );
        let mut statements = vec![(merge_persons, json!({ "rows": persons }))];

        for kind in MentorKind::ALL {
            let pairs: Vec<Value> = mentorship_pairs(records, kind)
                .into_iter()
                .map(|(mentor, mentee)| json!({ "mentor": mentor, "mentee": mentee }))
                .collect();
            let statement = format!(
                "UNWIND $pairs AS pair \
                 MERGE (m:{person} {{full_name: pair.mentor}}) \
                 MERGE (p:{person} {{full_name: pair.mentee}}) \
                 MERGE (m)-[:{mentor_edge}]->(p) \
                 MERGE (p)-[:{mentee_edge}]->(m)",
                person = PERSON_LABEL,
                mentor_edge = kind.mentor_edge(),
                mentee_edge = kind.mentee_edge()
            );
            statements.push((statement, json!({ "pairs": pairs })));
        }

        let merge_projects = format!(
            "UNWIND $pairs AS pair \
             MERGE (p:{person} {{full_name: pair.person}}) \
             MERGE (j:{project} {{name: pair.project}}) \
             MERGE (p)-[:{works_on}]->(j)",
            person = PERSON_LABEL,
            project = PROJECT_LABEL,
            works_on = WORKS_ON
        );
        statements.push((merge_projects, json!({ "pairs": works_on })));

        let borrowed: Vec<(&str, Value)> = statements
            .iter()
            .map(|(s, p)| (s.as_str(), p.clone()))
            .collect();
        let results = self.execute(AccessMode::Write, &borrowed).await?;

        let summary = LoadSummary {
            rows: records.len(),
            nodes_created: results.iter().map(|r| r.stats.nodes_created).sum(),
            relationships_created: results.iter().map(|r| r.stats.relationships_created).sum(),
            tier_mismatches: 0,
        };
        info!(
            "Loaded {} rows into Neo4j: {} nodes, {} relationships created",
            summary.rows, summary.nodes_created, summary.relationships_created
        );
        Ok(summary)
    }

    async fn clear(&self) -> GraphResult<()> {
        self.execute(AccessMode::Write, &[("MATCH (n) DETACH DELETE n", json!({}))]).await?;
        info!("Cleared Neo4j graph");
        Ok(())
    }

    async fn close(&self) -> GraphResult<()> {
        self.closed.store(true, Ordering::Release);
        info!("Closed Neo4j adapter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Neo4jConfig {
        Neo4jConfig {
            url: "http://localhost:7474/".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_endpoint() {
        let graph = Neo4jGraph::new(&config()).unwrap();
        assert_eq!(graph.endpoint, "http://localhost:7474/db/neo4j/tx/commit");
    }

    #[tokio::test]
    async fn test_mutation_rejected_before_any_request() {
        // nothing listens on the configured port; a rejection proves no I/O happened
        let graph = Neo4jGraph::new(&config()).unwrap();
        let err = graph.run_query("MATCH (n) DETACH DELETE n").await.unwrap_err();
        assert!(matches!(err, GraphError::MutationRejected(_)));
    }

    #[tokio::test]
    async fn test_closed_adapter_fails() {
        let graph = Neo4jGraph::new(&config()).unwrap();
        graph.close().await.unwrap();
        let err = graph.run_query("MATCH (n) RETURN n").await.unwrap_err();
        assert!(matches!(err, GraphError::Closed));
    }

    #[test]
    fn test_error_classification() {
        let syntax = classify_error(Neo4jError {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: "Invalid input".to_string(),
        });
        assert!(syntax.is_query_error());

        let auth = classify_error(Neo4jError {
            code: "Neo.ClientError.Security.Unauthorized".to_string(),
            message: "bad credentials".to_string(),
        });
        assert!(matches!(auth, GraphError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_commented_mutation_rejected_before_any_request() {
        let graph = Neo4jGraph::new(&config()).unwrap();
        let err = graph
            .run_query("MATCH (n) // it's fine\nDETACH DELETE n //'")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::MutationRejected(_)));
    }

    #[test]
    fn test_access_mode_header_values() {
        assert_eq!(AccessMode::Read.as_str(), "READ");
        assert_eq!(AccessMode::Write.as_str(), "WRITE");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(neo4j_type(&json!(["String"])), "STRING");
        assert_eq!(neo4j_type(&json!(["Long"])), "INTEGER");
        assert_eq!(strip_rel_type(":`WORKS_ON`"), "WORKS_ON");
    }
}
