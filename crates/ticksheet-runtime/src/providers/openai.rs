//! OpenAI-compatible chat-completions oracle.
//!
//! Works against any endpoint speaking the `/v1/chat/completions` shape.
//! Enabled with the `openai` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiCredential, Oracle, OracleConfig, OracleError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Oracle backed by an OpenAI-compatible HTTP API.
pub struct OpenAiOracle {
    client: reqwest::Client,
    credential: ApiCredential,
    base_url: String,
    config: OracleConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiOracle {
    /// Create an oracle from the `OPENAI_API_KEY` environment variable.
    pub fn from_env(config: OracleConfig) -> Result<Self, OracleError> {
        let credential = ApiCredential::from_env("OPENAI_API_KEY", "OpenAI API key")?;
        Ok(Self::new(credential, DEFAULT_BASE_URL, config))
    }

    /// Create an oracle with an explicit credential and base URL.
    pub fn new(credential: ApiCredential, base_url: impl Into<String>, config: OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            credential,
            base_url: base_url.into(),
            config,
        }
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            model = %self.config.model,
            temperature,
            prompt_tokens = self.estimate_tokens(prompt),
            "oracle request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.config.timeout)
                } else {
                    OracleError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(OracleError::AuthError);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::HttpError(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiOracle")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .field("credential", &self.credential)
            .finish()
    }
}
