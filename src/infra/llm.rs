//! OpenAI-compatible chat completion backend for page generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::application::generator::{
    GenerationRequest, GeneratorError, SYSTEM_PROMPT, build_prompt, extract_markup,
};
use crate::application::repos::ArtifactGenerator;
use crate::config::{GeneratorSettings, Secret};
use crate::infra::error::InfraError;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatCompletionGenerator {
    client: Client,
    endpoint: Url,
    api_key: Secret,
    model: String,
}

impl ChatCompletionGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self, InfraError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| InfraError::configuration("generator.api_key is required"))?;
        Self::with_endpoint(
            settings.endpoint.clone(),
            api_key,
            settings.model.clone(),
            settings.timeout,
        )
    }

    pub fn with_endpoint(
        endpoint: Url,
        api_key: Secret,
        model: String,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }

    fn completions_url(&self) -> Result<Url, GeneratorError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| GeneratorError::Request("endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["chat", "completions"]);
        Ok(url)
    }
}

#[async_trait]
impl ArtifactGenerator for ChatCompletionGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError> {
        let prompt = build_prompt(request);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.completions_url()?)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| GeneratorError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| GeneratorError::Request(err.to_string()))?;
        let parsed: ChatCompletionResponse =
            serde_json::from_slice(&bytes).map_err(|err| GeneratorError::Decode(err.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::EmptyOutput)?;

        debug!(
            target = "pagesmith::generator",
            model = %self.model,
            revision = request.is_revision(),
            chars = content.len(),
            "chat completion received"
        );

        extract_markup(&content)
    }
}
