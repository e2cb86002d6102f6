//! Prompt templates and model-output cleanup

use super::rephrase::CanonicalTemplate;
use super::{NLQError, NLQResult};
use crate::graph::{guard, Row, SchemaDescription};
use regex::Regex;
use std::sync::LazyLock;

/// Opening of every query-generation prompt
pub const GENERATION_TASK: &str = "Generate a Cypher query for a Neo4j graph database.";
/// Section holding the rows in an answer prompt
pub const RESULTS_SECTION: &str = "<Query Results>";
/// Section listing the canonical forms in a rephrase prompt
pub const CANONICAL_SECTION: &str = "<Canonical questions>";

const GENERATION_INSTRUCTIONS: &str = "\
Use only the node labels, relationship types and properties in the schema.
Do not use any other labels, relationship types or properties.
People are matched on their `full_name` property, projects on `name`.";

const GENERATION_NOTE: &str = "\
Do not include any explanations or apologies in your response.
Respond with a single Cypher statement and nothing else.
Never write a statement that creates, updates or deletes data.
Make sure the direction of each relationship is correct:
a mentor points to a mentee with IS_TECH_MENTOR_OF or IS_CAREER_MENTOR_OF,
a mentee points to a mentor with IS_TECH_MENTEE_OF or IS_CAREER_MENTEE_OF.
Alias every returned value.";

const GENERATION_EXAMPLES: &str = "\
# Who is the tech mentor of Ada Lovelace?
MATCH (mentor:Person)-[:IS_TECH_MENTOR_OF]->(:Person {full_name: 'Ada Lovelace'})
RETURN mentor.full_name AS tech_mentor
# Who are the career mentees of Grace Hopper?
MATCH (:Person {full_name: 'Grace Hopper'})-[:IS_CAREER_MENTOR_OF]->(mentee:Person)
RETURN mentee.full_name AS career_mentee
# Who works on the Inventory Management System?
MATCH (person:Person)-[:WORKS_ON]->(:Project {name: 'Inventory Management System'})
RETURN person.full_name AS member ORDER BY member
# How many people work in the Engineering department?
MATCH (person:Person) WHERE person.department = 'Engineering'
RETURN count(person) AS headcount";

const ANSWER_TASK: &str = "\
You are an assistant that takes the results of a Cypher query and forms a
human-readable answer. The query results were produced from the user's
question and are authoritative: never question them or correct them with
your own knowledge. Make the answer sound like a reply to the question.";

const ANSWER_NOTE: &str = "\
Answer with a single plain sentence using only the query results.
Do not restate the question.
Add nothing before or after the answer: no greeting, no commentary.
Never claim a lack of information when results are present.
Names may contain commas or punctuation; keep each full name intact.";

const REPHRASE_TASK: &str = "\
Rewrite the user's question as exactly one of the canonical questions below,
replacing <name> with the person or project it is about. If none fits,
repeat the question unchanged. Respond with the question only.";

/// A generated query that failed validation, fed back into the next attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub query: String,
    pub reason: String,
}

pub fn render_generation(question: &str, schema: &SchemaDescription, rejection: Option<&Rejection>) -> String {
    let mut prompt = format!(
        "<Task>\n{}\n</Task>\n<Instructions>\n{}\n</Instructions>\n<Schema>\n{}</Schema>\n<Note>\n{}\n</Note>\n<Examples>\n{}\n</Examples>\n",
        GENERATION_TASK, GENERATION_INSTRUCTIONS, schema, GENERATION_NOTE, GENERATION_EXAMPLES
    );

    if let Some(rejection) = rejection {
        prompt.push_str(&format!(
            "<Previous Attempt>\nThis query was rejected: {}\n{}\nWrite a corrected query.\n</Previous Attempt>\n",
            rejection.reason, rejection.query
        ));
    }

    prompt.push_str(&format!("<Question>\n{}\n</Question>\n", question.trim()));
    prompt
}

/// Answer prompt; only the first `top_k` rows are included
pub fn render_answer(question: &str, rows: &[Row], top_k: usize) -> NLQResult<String> {
    let shown = &rows[..rows.len().min(top_k)];
    let context =
        serde_json::to_string_pretty(shown).map_err(|e| NLQError::SerializationError(e.to_string()))?;

    Ok(format!(
        "<Task>\n{}\n</Task>\n{}\n{}\n</Query Results>\n<Question>\n{}\n</Question>\n<Note>\n{}\n</Note>\n",
        ANSWER_TASK,
        RESULTS_SECTION,
        context,
        question.trim(),
        ANSWER_NOTE
    ))
}

pub fn render_rephrase(question: &str) -> String {
    let canonical: Vec<String> = CanonicalTemplate::ALL
        .iter()
        .map(|t| format!("- {}", t.render("<name>")))
        .collect();

    format!(
        "<Task>\n{}\n</Task>\n{}\n{}\n</Canonical questions>\n<Question>\n{}\n</Question>\n",
        REPHRASE_TASK,
        CANONICAL_SECTION,
        canonical.join("\n"),
        question.trim()
    )
}

/// Extract a Cypher query from an LLM response that may contain markdown
/// fences, explanations, or multiple code blocks.
pub fn extract_cypher(response: &str) -> String {
    let trimmed = response.trim();

    // A block tagged `cypher` wins over untagged or other-language blocks
    let blocks = fenced_blocks(trimmed);
    if let Some((_, body)) = blocks
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case("cypher"))
        .or_else(|| blocks.first())
    {
        return body.trim().to_string();
    }

    // No fences: take the first run of clause lines, starting at MATCH or UNWIND
    let mut lines: Vec<&str> = Vec::new();
    for line in trimmed.lines().map(str::trim) {
        if lines.is_empty() {
            if STATEMENT_START.is_match(line) {
                lines.push(line);
            }
            continue;
        }

        let continues_where = lines
            .last()
            .is_some_and(|prev| WHERE_LINE.is_match(prev) || BOOLEAN_LINE.is_match(prev));
        let is_clause = CLAUSE_START.is_match(line) || (continues_where && BOOLEAN_LINE.is_match(line));
        if !is_clause || line.ends_with(&['.', ':', '!'][..]) {
            break;
        }
        lines.push(line);
    }
    if !lines.is_empty() {
        return lines.join(" ");
    }

    trimmed.trim_matches('`').trim().to_string()
}

static STATEMENT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(OPTIONAL\s+MATCH|MATCH|UNWIND)\b").expect("static clause pattern"));

static CLAUSE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(OPTIONAL\s+MATCH|MATCH|UNWIND|WHERE|WITH|RETURN|ORDER\s+BY|SKIP|LIMIT)\b")
        .expect("static clause pattern")
});

static WHERE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").expect("static clause pattern"));

/// `AND`/`OR` only continue a WHERE clause split across lines
static BOOLEAN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(AND|OR|XOR|NOT)\b").expect("static clause pattern"));

/// `(language tag, body)` of every closed ``` fence, in order
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(newline) = after.find('\n') else {
            break;
        };
        let body = &after[newline + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push((after[..newline].trim(), &body[..close]));
        rest = &body[close + 3..];
    }

    blocks
}

/// Reject text holding more than one statement. A single trailing `;` is
/// tolerated and removed.
pub fn single_statement(query: &str) -> NLQResult<String> {
    let stripped = guard::strip_literals(query).map_err(|e| NLQError::InvalidQuery(e.to_string()))?;
    let body = stripped.trim().trim_end_matches(';');
    if body.contains(';') {
        return Err(NLQError::InvalidQuery("more than one statement".to_string()));
    }

    let query = query.trim();
    Ok(query.strip_suffix(';').unwrap_or(query).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_cypher_from_fence() {
        let response = "Here is the query:\n```cypher\nMATCH (p:Person) RETURN p.full_name\n```\nHope it helps.";
        assert_eq!(extract_cypher(response), "MATCH (p:Person) RETURN p.full_name");
    }

    #[test]
    fn test_extract_cypher_from_prose() {
        let response = "Sure!\nMATCH (p:Person)\nWHERE p.department = 'Finance'\nRETURN p.full_name\nThis lists Finance.";
        assert_eq!(
            extract_cypher(response),
            "MATCH (p:Person) WHERE p.department = 'Finance' RETURN p.full_name"
        );
    }

    #[test]
    fn test_extract_cypher_prefers_cypher_block() {
        let response = "Schema check:\n```text\nPerson, Project\n```\nQuery:\n```cypher\nMATCH (j:Project) RETURN j.name\n```";
        assert_eq!(extract_cypher(response), "MATCH (j:Project) RETURN j.name");

        let untagged = "```\nMATCH (n) RETURN n\n```";
        assert_eq!(extract_cypher(untagged), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_extract_cypher_ignores_prose_that_looks_like_keywords() {
        let response = "With this query you get the mentors:\n\
                        MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(p:Person)\n\
                        WHERE p.department = 'Finance'\n\
                        AND p.position = 'Accountant'\n\
                        RETURN m.full_name AS mentor\n\
                        Or you could filter by position.\n\
                        Matching is case-sensitive.";
        assert_eq!(
            extract_cypher(response),
            "MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(p:Person) WHERE p.department = 'Finance' \
             AND p.position = 'Accountant' RETURN m.full_name AS mentor"
        );
    }

    #[test]
    fn test_extract_cypher_stops_at_trailing_prose() {
        let response = "MATCH (p:Person)\nRETURN p.full_name\nOrdered output is not guaranteed.\nLIMIT 5";
        assert_eq!(extract_cypher(response), "MATCH (p:Person) RETURN p.full_name");
    }

    #[test]
    fn test_single_statement() {
        assert_eq!(
            single_statement("MATCH (n) RETURN n;").unwrap(),
            "MATCH (n) RETURN n"
        );
        assert_eq!(
            single_statement("MATCH (n {name: 'a;b'}) RETURN n").unwrap(),
            "MATCH (n {name: 'a;b'}) RETURN n"
        );
        assert!(matches!(
            single_statement("MATCH (n) RETURN n; MATCH (m) RETURN m"),
            Err(NLQError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_generation_prompt_sections() {
        let mut schema = SchemaDescription::new();
        schema.record_relationship("Person", "WORKS_ON", "Project");
        let prompt = render_generation("Who works on Apollo?", &schema, None);
        assert!(prompt.contains(GENERATION_TASK));
        assert!(prompt.contains("(:Person)-[:WORKS_ON]->(:Project)"));
        assert!(prompt.ends_with("<Question>\nWho works on Apollo?\n</Question>\n"));
        assert!(!prompt.contains("<Previous Attempt>"));

        let rejection = Rejection {
            query: "MATCH (e:Employee) RETURN e".to_string(),
            reason: "unknown label `Employee`".to_string(),
        };
        let prompt = render_generation("Who works on Apollo?", &schema, Some(&rejection));
        assert!(prompt.contains("rejected: unknown label `Employee`"));
        assert!(prompt.contains("MATCH (e:Employee) RETURN e"));
    }

    #[test]
    fn test_answer_prompt_caps_rows() {
        let rows: Vec<Row> = (0..5)
            .map(|i| {
                let mut row = Row::new();
                row.insert("n".to_string(), json!(format!("person-{}", i)));
                row
            })
            .collect();
        let prompt = render_answer("Who?", &rows, 2).unwrap();
        assert!(prompt.contains(RESULTS_SECTION));
        assert!(prompt.contains("person-1"));
        assert!(!prompt.contains("person-2"));
    }

    #[test]
    fn test_answer_prompt_asks_for_one_plain_sentence() {
        let prompt = render_answer("Who mentors Ada?", &[], 10).unwrap();
        assert!(prompt.contains("single plain sentence"));
        assert!(prompt.contains("Do not restate the question."));
        assert!(prompt.contains("no commentary"));
        assert!(!prompt.contains("one or two sentences"));
    }

    #[test]
    fn test_rephrase_prompt_lists_templates() {
        let prompt = render_rephrase("who guides ada on tech stuff");
        assert!(prompt.contains(CANONICAL_SECTION));
        assert!(prompt.contains("Who is the tech mentor of <name>?"));
        assert!(prompt.contains("What is the department of <name>?"));
    }
}
