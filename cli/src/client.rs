//! RemoteClient for a running Mentorgraph server

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error body
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Serialize)]
struct QuestionBody<'a> {
    question: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rephrase: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub models: Vec<String>,
    pub graph: GraphSummary,
}

/// HTTP client for the question-answering API
pub struct RemoteClient {
    http_base_url: String,
    http_client: Client,
}

impl RemoteClient {
    pub fn new(http_base_url: &str) -> Self {
        Self {
            http_base_url: http_base_url.trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.http_base_url, path)
    }

    pub async fn ask(&self, question: &str, model: &str, rephrase: Option<bool>) -> ClientResult<String> {
        let response = self
            .http_client
            .post(self.url("/generate_response"))
            .json(&QuestionBody {
                question,
                model,
                rephrase,
            })
            .send()
            .await?;
        let body: ResponseBody = Self::decode(response).await?;
        Ok(body.response)
    }

    pub async fn rephrase(&self, question: &str, model: &str) -> ClientResult<String> {
        let response = self
            .http_client
            .post(self.url("/rephrase_prompt"))
            .json(&QuestionBody {
                question,
                model,
                rephrase: None,
            })
            .send()
            .await?;
        let body: ResponseBody = Self::decode(response).await?;
        Ok(body.response)
    }

    /// Load the seed data; returns the schema text
    pub async fn populate(&self) -> ClientResult<String> {
        let response = self.http_client.get(self.url("/populate_data")).send().await?;
        let body: ResultBody = Self::decode(response).await?;
        Ok(body.result)
    }

    /// Delete everything; returns the schema text
    pub async fn reset(&self) -> ClientResult<String> {
        let response = self.http_client.get(self.url("/delete_data")).send().await?;
        let body: ResultBody = Self::decode(response).await?;
        Ok(body.result)
    }

    pub async fn status(&self) -> ClientResult<ServerStatus> {
        let response = self.http_client.get(self.url("/api/status")).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| body.get("error").and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or(text);
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}
