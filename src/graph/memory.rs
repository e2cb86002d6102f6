//! In-process graph adapter
//!
//! Holds the mentorship graph in memory behind a tokio `RwLock` and answers
//! the read-only Cypher subset in [`super::cypher`].

use super::seed::{MentorKind, PersonRecord};
use super::{
    cypher, guard, GraphAdmin, GraphError, GraphReader, GraphResult, LoadSummary, Row,
    SchemaDescription, PERSON_LABEL, PROJECT_LABEL, WORKS_ON,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub(crate) label: String,
    pub(crate) properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredEdge {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) edge_type: String,
}

/// Nodes, edges and the identity indexes used for merging
#[derive(Debug, Default)]
pub(crate) struct GraphData {
    pub(crate) nodes: Vec<StoredNode>,
    pub(crate) edges: Vec<StoredEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    persons: HashMap<String, usize>,
    projects: HashMap<String, usize>,
    edge_keys: HashSet<(usize, String, usize)>,
}

impl GraphData {
    fn add_node(&mut self, label: &str, key: &str, value: &str) -> usize {
        let mut properties = IndexMap::new();
        properties.insert(key.to_string(), Value::from(value));
        self.nodes.push(StoredNode {
            label: label.to_string(),
            properties,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Person by full name; the bool is true when the node was created
    fn merge_person(&mut self, full_name: &str) -> (usize, bool) {
        if let Some(&idx) = self.persons.get(full_name) {
            return (idx, false);
        }
        let idx = self.add_node(PERSON_LABEL, "full_name", full_name);
        self.persons.insert(full_name.to_string(), idx);
        (idx, true)
    }

    fn merge_project(&mut self, name: &str) -> (usize, bool) {
        if let Some(&idx) = self.projects.get(name) {
            return (idx, false);
        }
        let idx = self.add_node(PROJECT_LABEL, "name", name);
        self.projects.insert(name.to_string(), idx);
        (idx, true)
    }

    fn merge_edge(&mut self, source: usize, edge_type: &str, target: usize) -> bool {
        if !self.edge_keys.insert((source, edge_type.to_string(), target)) {
            return false;
        }
        self.edges.push(StoredEdge {
            source,
            target,
            edge_type: edge_type.to_string(),
        });
        let idx = self.edges.len() - 1;
        self.outgoing[source].push(idx);
        self.incoming[target].push(idx);
        true
    }

    /// `(edge, other endpoint)` pairs around a node
    pub(crate) fn neighbours(&self, node: usize, outgoing: bool, incoming: bool) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        if outgoing {
            found.extend(self.outgoing[node].iter().map(|&e| (e, self.edges[e].target)));
        }
        if incoming {
            found.extend(self.incoming[node].iter().map(|&e| (e, self.edges[e].source)));
        }
        found
    }

    /// Merge seed records; returns (nodes created, relationships created)
    pub(crate) fn load(&mut self, records: &[PersonRecord]) -> (usize, usize) {
        let mut nodes_created = 0;
        let mut rels_created = 0;

        for record in records {
            let full_name = record.full_name.trim();
            let (person, created) = self.merge_person(full_name);
            nodes_created += created as usize;

            let props = &mut self.nodes[person].properties;
            if let Some(id) = record.id {
                props.insert("id".to_string(), Value::from(id));
            }
            props.insert("position".to_string(), Value::from(record.position.as_str()));
            props.insert("department".to_string(), Value::from(record.department.as_str()));
            for kind in MentorKind::ALL {
                props.insert(kind.property().to_string(), Value::from(record.mentor_field(kind)));
            }

            for kind in MentorKind::ALL {
                let Some(mentor_name) = record.mentor(kind) else {
                    continue;
                };
                let (mentor, created) = self.merge_person(mentor_name);
                nodes_created += created as usize;
                rels_created += self.merge_edge(mentor, kind.mentor_edge(), person) as usize;
                rels_created += self.merge_edge(person, kind.mentee_edge(), mentor) as usize;
            }

            for name in &record.projects {
                let (project, created) = self.merge_project(name.trim());
                nodes_created += created as usize;
                rels_created += self.merge_edge(person, WORKS_ON, project) as usize;
            }
        }

        (nodes_created, rels_created)
    }

    fn schema(&self) -> SchemaDescription {
        let mut schema = SchemaDescription::new();
        for node in &self.nodes {
            schema.record_node(&node.label, node.properties.iter());
        }
        for edge in &self.edges {
            schema.record_relationship(
                &self.nodes[edge.source].label,
                &edge.edge_type,
                &self.nodes[edge.target].label,
            );
        }
        schema
    }
}

/// In-memory mentorship graph
#[derive(Debug, Default)]
pub struct MemoryGraph {
    data: RwLock<GraphData>,
    closed: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node_count(&self) -> usize {
        self.data.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.data.read().await.edges.len()
    }

    fn ensure_open(&self) -> GraphResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(GraphError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GraphReader for MemoryGraph {
    async fn schema(&self) -> GraphResult<SchemaDescription> {
        self.ensure_open()?;
        Ok(self.data.read().await.schema())
    }

    async fn run_query(&self, query: &str) -> GraphResult<Vec<Row>> {
        self.ensure_open()?;
        guard::ensure_read_only(query)?;
        let parsed = cypher::parse(query)?;
        let data = self.data.read().await;
        let rows = cypher::execute(&parsed, &data)?;
        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl GraphAdmin for MemoryGraph {
    async fn load(&self, records: &[PersonRecord]) -> GraphResult<LoadSummary> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        let (nodes_created, relationships_created) = data.load(records);
        info!(
            "Loaded {} rows: {} nodes, {} relationships created",
            records.len(),
            nodes_created,
            relationships_created
        );
        Ok(LoadSummary {
            rows: records.len(),
            nodes_created,
            relationships_created,
            tier_mismatches: 0,
        })
    }

    async fn clear(&self) -> GraphResult<()> {
        self.ensure_open()?;
        *self.data.write().await = GraphData::default();
        info!("Cleared in-memory graph");
        Ok(())
    }

    async fn close(&self) -> GraphResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
