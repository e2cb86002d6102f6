//! NLQ Client for LLM interactions

use crate::config::{LLMProvider, ModelConfig, ModelsConfig};
use crate::nlq::{ModelChoice, NLQError, NLQResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Text-to-text capability of a model backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Complete a prompt
    async fn complete(&self, prompt: &str) -> NLQResult<String>;
}

/// HTTP client for one configured model backend
pub struct NLQClient {
    client: Client,
    config: ModelConfig,
    api_base_url: String,
    name: String,
}

impl NLQClient {
    pub fn new(config: &ModelConfig) -> NLQResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NLQError::ConfigError(e.to_string()))?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| match config.provider {
                LLMProvider::OpenAI => "https://api.openai.com/v1".to_string(),
                LLMProvider::Ollama => "http://localhost:11434".to_string(),
            })
            .trim_end_matches('/')
            .to_string();

        if config.provider == LLMProvider::OpenAI && config.api_key.is_none() {
            return Err(NLQError::ConfigError("OpenAI requires API key".to_string()));
        }

        Ok(Self {
            client,
            config: config.clone(),
            api_base_url,
            name: format!("{:?}/{}", config.provider, config.model),
        })
    }

    fn system_prompt(&self) -> String {
        self.config
            .system_prompt
            .clone()
            .unwrap_or_else(|| "You are a Cypher expert and a concise assistant.".to_string())
    }

    async fn openai_chat(&self, prompt: &str) -> NLQResult<String> {
        #[derive(Serialize)]
        struct Message {
            role: String,
            content: String,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: Option<String>,
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| NLQError::ConfigError("OpenAI requires API key".to_string()))?;

        let url = format!("{}/chat/completions", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&Request {
                model: &self.config.model,
                messages: vec![
                    Message {
                        role: "system".to_string(),
                        content: self.system_prompt(),
                    },
                    Message {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    },
                ],
                temperature: self.config.temperature,
            })
            .send()
            .await
            .map_err(|e| NLQError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NLQError::BackendUnavailable(format!("OpenAI error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| NLQError::SerializationError(e.to_string()))?;
        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn ollama_generate(&self, prompt: &str) -> NLQResult<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
            system: String,
            stream: bool,
            options: Options,
        }

        #[derive(Deserialize)]
        struct Response {
            response: String,
        }

        let url = format!("{}/api/generate", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                prompt,
                system: self.system_prompt(),
                stream: false,
                options: Options {
                    temperature: self.config.temperature,
                },
            })
            .send()
            .await
            .map_err(|e| NLQError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NLQError::BackendUnavailable(format!("Ollama error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| NLQError::SerializationError(e.to_string()))?;
        Ok(result.response)
    }
}

#[async_trait]
impl LanguageModel for NLQClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> NLQResult<String> {
        match self.config.provider {
            LLMProvider::OpenAI => self.openai_chat(prompt).await,
            LLMProvider::Ollama => self.ollama_generate(prompt).await,
        }
    }
}

/// Model backends keyed by request choice
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<ModelChoice, Arc<dyn LanguageModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an HTTP client for every configured choice
    pub fn from_config(config: &ModelsConfig) -> NLQResult<Self> {
        let mut registry = Self::new();
        for choice in [ModelChoice::Llama, ModelChoice::OpenAI] {
            if let Some(model) = config.get(choice) {
                registry.register(choice, Arc::new(NLQClient::new(model)?));
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, choice: ModelChoice, model: Arc<dyn LanguageModel>) {
        self.models.insert(choice, model);
    }

    pub fn get(&self, choice: ModelChoice) -> NLQResult<Arc<dyn LanguageModel>> {
        self.models
            .get(&choice)
            .cloned()
            .ok_or_else(|| NLQError::ConfigError(format!("model `{}` is not configured", choice)))
    }

    pub fn available(&self) -> Vec<ModelChoice> {
        let mut choices: Vec<ModelChoice> = self.models.keys().copied().collect();
        choices.sort_by_key(|c| c.as_str());
        choices
    }
}
