//! Seed data for populating the mentorship graph
//!
//! The seed is a CSV table with a header row and the columns
//! `id, full_name, position, department, career_mentor, tech_mentor, project`.
//! The project column may hold a single name, nothing, `None`, or a
//! serialized list such as `['Data Analytics Dashboard', 'Market Research Tool']`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Columns every seed table must carry
pub const SEED_COLUMNS: &[&str] = &[
    "id",
    "full_name",
    "position",
    "department",
    "career_mentor",
    "tech_mentor",
    "project",
];

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch seed from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Seed is missing column `{0}`")]
    MissingColumn(String),

    #[error("Malformed seed at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

pub type SeedResult<T> = Result<T, SeedError>;

/// Where the seed table comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedSource {
    Url(String),
    File(PathBuf),
}

impl SeedSource {
    /// `http://` and `https://` locations are URLs, anything else a path
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            SeedSource::Url(location.to_string())
        } else {
            SeedSource::File(PathBuf::from(location))
        }
    }

    /// Fetch the raw seed text
    pub async fn fetch(&self) -> SeedResult<String> {
        match self {
            SeedSource::Url(url) => {
                debug!("Fetching seed from {}", url);
                let fetch_err = |reason: String| SeedError::Fetch {
                    url: url.clone(),
                    reason,
                };
                let resp = reqwest::get(url).await.map_err(|e| fetch_err(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(fetch_err(format!("HTTP {}", resp.status())));
                }
                resp.text().await.map_err(|e| fetch_err(e.to_string()))
            }
            SeedSource::File(path) => {
                debug!("Reading seed from {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
        }
    }
}

impl std::fmt::Display for SeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedSource::Url(url) => write!(f, "{}", url),
            SeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Which mentorship a mentor field describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MentorKind {
    Career,
    Tech,
}

impl MentorKind {
    pub const ALL: [MentorKind; 2] = [MentorKind::Career, MentorKind::Tech];

    /// Edge from mentor to mentee
    pub fn mentor_edge(self) -> &'static str {
        match self {
            MentorKind::Career => "IS_CAREER_MENTOR_OF",
            MentorKind::Tech => "IS_TECH_MENTOR_OF",
        }
    }

    /// Inverse edge from mentee to mentor
    pub fn mentee_edge(self) -> &'static str {
        match self {
            MentorKind::Career => "IS_CAREER_MENTEE_OF",
            MentorKind::Tech => "IS_TECH_MENTEE_OF",
        }
    }

    /// Person property holding the raw mentor name
    pub fn property(self) -> &'static str {
        match self {
            MentorKind::Career => "career_mentor",
            MentorKind::Tech => "tech_mentor",
        }
    }
}

/// One seed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: Option<i64>,
    pub full_name: String,
    pub position: String,
    pub department: String,
    pub career_mentor: String,
    pub tech_mentor: String,
    pub projects: Vec<String>,
}

impl PersonRecord {
    pub fn new(id: i64, full_name: &str, position: &str, department: &str) -> Self {
        Self {
            id: Some(id),
            full_name: full_name.to_string(),
            position: position.to_string(),
            department: department.to_string(),
            career_mentor: String::new(),
            tech_mentor: String::new(),
            projects: Vec::new(),
        }
    }

    pub fn with_mentor(mut self, kind: MentorKind, name: &str) -> Self {
        match kind {
            MentorKind::Career => self.career_mentor = name.to_string(),
            MentorKind::Tech => self.tech_mentor = name.to_string(),
        }
        self
    }

    pub fn with_project(mut self, project: &str) -> Self {
        self.projects.push(project.to_string());
        self
    }

    /// Raw mentor field, trimmed
    pub fn mentor_field(&self, kind: MentorKind) -> &str {
        match kind {
            MentorKind::Career => self.career_mentor.trim(),
            MentorKind::Tech => self.tech_mentor.trim(),
        }
    }

    /// Mentor that should get an edge: empty fields and self-references are skipped
    pub fn mentor(&self, kind: MentorKind) -> Option<&str> {
        let name = self.mentor_field(kind);
        if name.is_empty() || name == self.full_name.trim() {
            None
        } else {
            Some(name)
        }
    }
}

/// Split a project field into individual project names
pub fn split_projects(field: &str) -> Vec<String> {
    let cleaned: String = field
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();

    let mut projects: Vec<String> = Vec::new();
    for name in cleaned.split(',').map(str::trim) {
        if name.is_empty() || name == "None" {
            continue;
        }
        if !projects.iter().any(|p| p == name) {
            projects.push(name.to_string());
        }
    }
    projects
}

/// One CSV record and the line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Split CSV text into records. Fields may be double-quoted; `""` inside a
/// quoted field is a literal quote, and quoted fields may span lines. Blank
/// lines are skipped.
pub fn parse_csv(text: &str) -> SeedResult<Vec<CsvRecord>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(CsvRecord {
                        line: record_line,
                        fields: std::mem::take(&mut record),
                    });
                } else {
                    record.clear();
                }
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(SeedError::Malformed {
            line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(CsvRecord {
            line: record_line,
            fields: record,
        });
    }

    Ok(records)
}

/// Parse the seed table into person records
pub fn parse_records(text: &str) -> SeedResult<Vec<PersonRecord>> {
    let mut rows = parse_csv(text)?.into_iter();
    let header = match rows.next() {
        Some(header) => header.fields,
        None => return Ok(Vec::new()),
    };

    let column = |name: &str| -> SeedResult<usize> {
        header
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
            .ok_or_else(|| SeedError::MissingColumn(name.to_string()))
    };
    let idx: Vec<usize> = SEED_COLUMNS.iter().map(|c| column(c)).collect::<SeedResult<_>>()?;

    let mut records = Vec::new();
    for CsvRecord { line, fields } in rows {
        let cell = |i: usize| fields.get(idx[i]).map(|s| s.trim()).unwrap_or("");

        let full_name = cell(1);
        if full_name.is_empty() {
            return Err(SeedError::Malformed {
                line,
                reason: "empty full_name".to_string(),
            });
        }

        let id = match cell(0) {
            "" => None,
            raw => Some(raw.parse::<i64>().map_err(|_| SeedError::Malformed {
                line,
                reason: format!("invalid id `{}`", raw),
            })?),
        };

        records.push(PersonRecord {
            id,
            full_name: full_name.to_string(),
            position: cell(2).to_string(),
            department: cell(3).to_string(),
            career_mentor: cell(4).to_string(),
            tech_mentor: cell(5).to_string(),
            projects: split_projects(cell(6)),
        });
    }

    Ok(records)
}

/// `(mentor, mentee)` pairs of one kind that produce edges
pub fn mentorship_pairs(records: &[PersonRecord], kind: MentorKind) -> Vec<(&str, &str)> {
    records
        .iter()
        .filter_map(|r| r.mentor(kind).map(|m| (m, r.full_name.trim())))
        .collect()
}
