//! Graph schema description
//!
//! The schema grounds the query-generation prompt and is used afterwards to
//! reject generated queries that reference labels, relationship types or
//! properties the graph does not have.

use super::guard::strip_literals;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

/// `(start)-[TYPE]->(end)` triple observed in the graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub start: String,
    pub rel_type: String,
    pub end: String,
}

/// Labels, relationship types and property types present in a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Node label -> property key -> type name
    pub node_labels: BTreeMap<String, BTreeMap<String, String>>,
    /// Relationship type -> property key -> type name
    pub relationship_types: BTreeMap<String, BTreeMap<String, String>>,
    /// Distinct relationship patterns
    pub patterns: BTreeSet<RelationshipPattern>,
}

static NODE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(?:[A-Za-z_]\w*)?\s*:\s*`?([A-Za-z_]\w*)`?").expect("static label pattern")
});
static REL_TYPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(?:[A-Za-z_]\w*)?\s*:([^\]]*)\]").expect("static relationship pattern")
});
static PROPERTY_ACCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z_]\w*\.([A-Za-z_]\w*)\b").expect("static property pattern")
});
static INLINE_MAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(?:[A-Za-z_]\w*)?\s*(?::\s*`?\w+`?\s*)?\{([^}]*)\}").expect("static map pattern")
});
static MAP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*:").expect("static key pattern"));

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the graph holds no labels and no relationship types
    pub fn is_empty(&self) -> bool {
        self.node_labels.is_empty() && self.relationship_types.is_empty()
    }

    /// Record a node's label and properties
    pub fn record_node<'a>(
        &mut self,
        label: &str,
        properties: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) {
        let entry = self.node_labels.entry(label.to_string()).or_default();
        for (key, value) in properties {
            if value.is_null() {
                continue;
            }
            entry
                .entry(key.clone())
                .or_insert_with(|| type_name(value).to_string());
        }
    }

    /// Record a relationship type and the labels it connects
    pub fn record_relationship(&mut self, start: &str, rel_type: &str, end: &str) {
        self.relationship_types.entry(rel_type.to_string()).or_default();
        self.patterns.insert(RelationshipPattern {
            start: start.to_string(),
            rel_type: rel_type.to_string(),
            end: end.to_string(),
        });
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.node_labels.contains_key(label)
    }

    pub fn has_relationship_type(&self, rel_type: &str) -> bool {
        self.relationship_types.contains_key(rel_type)
    }

    /// True when any label or relationship type carries the property
    pub fn has_property(&self, key: &str) -> bool {
        self.node_labels
            .values()
            .chain(self.relationship_types.values())
            .any(|props| props.contains_key(key))
    }

    /// Check that every label, relationship type and property key the query
    /// references exists in this schema. Returns the first unknown element.
    pub fn check_references(&self, query: &str) -> Result<(), String> {
        let text = strip_literals(query).map_err(|e| e.to_string())?;

        for caps in NODE_LABEL.captures_iter(&text) {
            let label = &caps[1];
            if !self.has_label(label) {
                return Err(format!("unknown label `{}`", label));
            }
        }

        for caps in REL_TYPES.captures_iter(&text) {
            for alternative in caps[1].split('|') {
                let rel_type: String = alternative
                    .trim()
                    .trim_start_matches(':')
                    .trim()
                    .trim_matches('`')
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if rel_type.is_empty() {
                    continue;
                }
                if !self.has_relationship_type(&rel_type) {
                    return Err(format!("unknown relationship type `{}`", rel_type));
                }
            }
        }

        for caps in PROPERTY_ACCESS.captures_iter(&text) {
            let key = &caps[1];
            if !self.has_property(key) {
                return Err(format!("unknown property `{}`", key));
            }
        }

        for caps in INLINE_MAP.captures_iter(&text) {
            for key in MAP_KEY.captures_iter(&caps[1]) {
                if !self.has_property(&key[1]) {
                    return Err(format!("unknown property `{}`", &key[1]));
                }
            }
        }

        Ok(())
    }
}

/// Type name used in schema text, following Neo4j's naming
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(n) if n.is_i64() || n.is_u64() => "INTEGER",
        Value::Number(_) => "FLOAT",
        Value::String(_) => "STRING",
        Value::Array(_) => "LIST",
        Value::Object(_) => "MAP",
    }
}

fn write_properties(f: &mut fmt::Formatter<'_>, props: &BTreeMap<String, String>) -> fmt::Result {
    let rendered: Vec<String> = props
        .iter()
        .map(|(key, ty)| format!("{}: {}", key, ty))
        .collect();
    write!(f, "{{{}}}", rendered.join(", "))
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties:")?;
        for (label, props) in &self.node_labels {
            write!(f, "{} ", label)?;
            write_properties(f, props)?;
            writeln!(f)?;
        }

        writeln!(f, "Relationship properties:")?;
        for (rel_type, props) in self.relationship_types.iter().filter(|(_, p)| !p.is_empty()) {
            write!(f, "{} ", rel_type)?;
            write_properties(f, props)?;
            writeln!(f)?;
        }

        writeln!(f, "The relationships:")?;
        for pattern in &self.patterns {
            writeln!(f, "(:{})-[:{}]->(:{})", pattern.start, pattern.rel_type, pattern.end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mentorship_schema() -> SchemaDescription {
        let mut schema = SchemaDescription::new();
        let person: Vec<(String, Value)> = vec![
            ("id".to_string(), json!(1)),
            ("full_name".to_string(), json!("Ada Lovelace")),
            ("position".to_string(), json!("Developer")),
        ];
        schema.record_node("Person", person.iter().map(|(k, v)| (k, v)));
        let project = [("name".to_string(), json!("Inventory Management System"))];
        schema.record_node("Project", project.iter().map(|(k, v)| (k, v)));
        schema.record_relationship("Person", "IS_TECH_MENTOR_OF", "Person");
        schema.record_relationship("Person", "WORKS_ON", "Project");
        schema
    }

    #[test]
    fn test_empty_schema() {
        let schema = SchemaDescription::new();
        assert!(schema.is_empty());
        assert!(!mentorship_schema().is_empty());
    }

    #[test]
    fn test_display_lists_labels_and_patterns() {
        let text = mentorship_schema().to_string();
        assert!(text.contains("Person {full_name: STRING, id: INTEGER, position: STRING}"));
        assert!(text.contains("Project {name: STRING}"));
        assert!(text.contains("(:Person)-[:WORKS_ON]->(:Project)"));
    }

    #[test]
    fn test_check_references_accepts_known_elements() {
        let schema = mentorship_schema();
        let query = "MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(p:Person {full_name: 'Ada Lovelace'}) \
                     RETURN m.full_name AS mentor";
        assert_eq!(schema.check_references(query), Ok(()));
    }

    #[test]
    fn test_check_references_rejects_unknown_elements() {
        let schema = mentorship_schema();
        assert_eq!(
            schema.check_references("MATCH (e:Employee) RETURN e"),
            Err("unknown label `Employee`".to_string())
        );
        assert_eq!(
            schema.check_references("MATCH (a:Person)-[:REPORTS_TO]->(b:Person) RETURN b"),
            Err("unknown relationship type `REPORTS_TO`".to_string())
        );
        assert_eq!(
            schema.check_references("MATCH (a:Person) RETURN a.salary"),
            Err("unknown property `salary`".to_string())
        );
        assert_eq!(
            schema.check_references("MATCH (a:Person {email: 'x'}) RETURN a"),
            Err("unknown property `email`".to_string())
        );
    }

    #[test]
    fn test_check_references_ignores_literal_contents() {
        let schema = mentorship_schema();
        let query = "MATCH (p:Project) WHERE p.name = 'v2.0 (beta:Release)' RETURN p.name";
        assert_eq!(schema.check_references(query), Ok(()));
    }

    #[test]
    fn test_relationship_alternatives() {
        let schema = mentorship_schema();
        assert!(schema
            .check_references("MATCH (a:Person)-[r:IS_TECH_MENTOR_OF|WORKS_ON]->(b) RETURN b")
            .is_ok());
        assert!(schema
            .check_references("MATCH (a:Person)-[:IS_TECH_MENTOR_OF|:MANAGES]->(b) RETURN b")
            .is_err());
    }
}
