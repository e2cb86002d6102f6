//! Service configuration
//!
//! Loaded from a YAML file, then overridden from the environment by the
//! binary entry point. Library code only ever receives these structs; it never
//! reads the environment itself.

use crate::graph::MentorTiers;
use crate::nlq::ModelChoice;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub graph: GraphConfig,
    pub seed: SeedConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    pub mentor_tiers: MentorTiers,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,
    /// Port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    #[default]
    Memory,
    Neo4j,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub neo4j: Neo4jConfig,
}

/// Neo4j HTTP endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    /// HTTP base URL, e.g. `http://localhost:7474`
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// URL or file path of the seed CSV
    pub source: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            source: "data/employees.csv".to_string(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LLMProvider {
    OpenAI,
    Ollama,
}

/// Configuration of one model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The LLM provider to use
    pub provider: LLMProvider,
    /// Model name (e.g., "gpt-4o-mini", "llama3.1")
    pub model: String,
    /// API key, required for OpenAI
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL; provider default when unset
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// System prompt sent with every request
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    /// HTTP timeout of the client
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl ModelConfig {
    pub fn ollama(model: &str) -> Self {
        Self {
            provider: LLMProvider::Ollama,
            model: model.to_string(),
            api_key: None,
            api_base_url: None,
            system_prompt: None,
            temperature: 0.0,
            timeout_secs: default_request_timeout(),
        }
    }

    pub fn openai(model: &str, api_key: Option<String>) -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: model.to_string(),
            api_key,
            api_base_url: None,
            system_prompt: None,
            temperature: 0.0,
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Backend per model choice; a choice without a backend is unavailable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub llama: Option<ModelConfig>,
    pub openai: Option<ModelConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            llama: Some(ModelConfig::ollama("llama3.1")),
            openai: None,
        }
    }
}

impl ModelsConfig {
    pub fn get(&self, choice: ModelChoice) -> Option<&ModelConfig> {
        match choice {
            ModelChoice::Llama => self.llama.as_ref(),
            ModelChoice::OpenAI => self.openai.as_ref(),
        }
    }
}

/// Question-answering pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the rephrasing pass unless the request says otherwise
    pub rephrase: bool,
    /// Query generation attempts per question; 2 allows one repair
    pub max_query_attempts: usize,
    /// Rows passed on to answer synthesis
    pub top_k: usize,
    /// Bound on each model call
    pub model_timeout_secs: u64,
    /// Bound on each query execution
    pub query_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rephrase: false,
            max_query_attempts: 2,
            top_k: 100,
            model_timeout_secs: 60,
            query_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply environment overrides through `lookup`:
    /// `NEO4J_URI` (also selects the Neo4j backend), `NEO4J_USERNAME`,
    /// `NEO4J_PASSWORD`, `OLLAMA_BASE_URL`, `OPENAI_API_KEY` (enables the
    /// OpenAI backend with `gpt-4o-mini` when none is configured) and
    /// `MENTORGRAPH_SEED`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("NEO4J_URI") {
            self.graph.backend = GraphBackend::Neo4j;
            self.graph.neo4j.url = url;
        }
        if let Some(username) = lookup("NEO4J_USERNAME") {
            self.graph.neo4j.username = username;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.neo4j.password = password;
        }
        if let Some(base_url) = lookup("OLLAMA_BASE_URL") {
            if let Some(llama) = self.models.llama.as_mut() {
                llama.api_base_url = Some(base_url);
            }
        }
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            match self.models.openai.as_mut() {
                Some(openai) => openai.api_key = Some(api_key),
                None => self.models.openai = Some(ModelConfig::openai("gpt-4o-mini", Some(api_key))),
            }
        }
        if let Some(seed) = lookup("MENTORGRAPH_SEED") {
            self.seed.source = seed;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.pipeline.max_query_attempts == 0 {
            return Err(ConfigError::Invalid("pipeline.max_query_attempts must be at least 1".to_string()));
        }
        if self.pipeline.top_k == 0 {
            return Err(ConfigError::Invalid("pipeline.top_k must be at least 1".to_string()));
        }
        if self.models.llama.is_none() && self.models.openai.is_none() {
            return Err(ConfigError::Invalid("no model backend configured".to_string()));
        }
        if let Some(openai) = &self.models.openai {
            if openai.provider == LLMProvider::OpenAI && openai.api_key.is_none() {
                return Err(ConfigError::Invalid("models.openai requires an api_key".to_string()));
            }
        }
        if self.seed.source.trim().is_empty() {
            return Err(ConfigError::Invalid("seed.source is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.graph.backend, GraphBackend::Memory);
        assert_eq!(config.pipeline.max_query_attempts, 2);
        assert!(config.models.get(ModelChoice::Llama).is_some());
        assert!(config.models.get(ModelChoice::OpenAI).is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            "graph:\n  backend: neo4j\n  neo4j:\n    password: hunter2\npipeline:\n  rephrase: true\n",
        )
        .unwrap();
        assert_eq!(config.graph.backend, GraphBackend::Neo4j);
        assert_eq!(config.graph.neo4j.password, "hunter2");
        assert_eq!(config.graph.neo4j.database, "neo4j");
        assert!(config.pipeline.rephrase);
        assert_eq!(config.pipeline.top_k, 100);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "models:\n  openai:\n    provider: OpenAI\n    model: gpt-4o\n    api_key: sk-test\nmentor_tiers:\n  top_positions: [Founder]"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        let openai = config.models.get(ModelChoice::OpenAI).unwrap();
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.timeout_secs, 60);
        assert_eq!(config.mentor_tiers.top_positions, vec!["Founder"]);
        // untouched tier lists keep their defaults
        assert_eq!(config.mentor_tiers.head_positions, vec!["Department Head"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEO4J_URI", "http://db:7474"),
            ("NEO4J_PASSWORD", "pw"),
            ("OPENAI_API_KEY", "sk-env"),
            ("NEO4J_USERNAME", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.graph.backend, GraphBackend::Neo4j);
        assert_eq!(config.graph.neo4j.url, "http://db:7474");
        assert_eq!(config.graph.neo4j.password, "pw");
        assert_eq!(config.graph.neo4j.username, "neo4j");
        assert_eq!(
            config.models.get(ModelChoice::OpenAI).and_then(|m| m.api_key.as_deref()),
            Some("sk-env")
        );
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.pipeline.max_query_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.models.openai = Some(ModelConfig::openai("gpt-4o-mini", None));
        assert!(config.validate().is_err());
    }
}
