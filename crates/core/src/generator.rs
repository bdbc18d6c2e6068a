use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::retry::RetryPolicy;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Non-streaming client for Ollama's `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: Url,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.base_url)?.join("api/generate")?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: GenerateResponse = response.json().await?;
        debug!(model = %self.model, eval_count = ?payload.eval_count, "generation finished");
        answer_text(payload)
    }
}

fn answer_text(payload: GenerateResponse) -> Result<String, GenerationError> {
    match payload.response {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(GenerationError::EmptyResponse),
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.retry.run(move || self.generate_once(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_disables_streaming() {
        let body = serde_json::to_value(GenerateRequest {
            model: "midm",
            prompt: "hello",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        })
        .unwrap();

        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["model"], "midm");
    }

    #[test]
    fn blank_or_missing_response_is_an_error() {
        let blank: GenerateResponse =
            serde_json::from_str(r#"{"response": "  \n", "done": true}"#).unwrap();
        assert!(matches!(answer_text(blank), Err(GenerationError::EmptyResponse)));

        let missing: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(matches!(answer_text(missing), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn response_text_is_trimmed() {
        let payload: GenerateResponse =
            serde_json::from_str(r#"{"response": " 500 units.\n", "eval_count": 4}"#).unwrap();
        assert_eq!(answer_text(payload).unwrap(), "500 units.");
    }

    #[test]
    fn client_builds_endpoint_from_base_url() {
        let client = OllamaClient::new(&LlmConfig::default()).unwrap();
        assert_eq!(client.endpoint.as_str(), "http://127.0.0.1:11434/api/generate");
        assert_eq!(client.model(), crate::config::DEFAULT_MODEL);
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let config = LlmConfig {
            base_url: "::not a url".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(OllamaClient::new(&config), Err(GenerationError::Url(_))));
    }
}
