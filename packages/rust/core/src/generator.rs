//! External text-generation capability.
//!
//! The enrichment loop only sees [`ContentGenerator`]: a prompt and an output
//! budget go in, plain text comes out. [`OpenRouterGenerator`] implements it over
//! the OpenRouter chat-completions API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use catalogsync_markup::strip_reasoning_markers;
use catalogsync_shared::{CatalogSyncError, GenerationConfig, OpenRouterConfig, Result};

/// One request to the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// Produces text for a prompt.
///
/// Any failure, including an empty answer, is reported as
/// [`CatalogSyncError::Generation`].
#[allow(async_fn_in_trait)]
pub trait ContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

impl<G: ContentGenerator> ContentGenerator for &G {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request).await
    }
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenRouter (or any compatible endpoint).
#[derive(Debug, Clone)]
pub struct OpenRouterGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl OpenRouterGenerator {
    /// Build a client. `model` overrides `openrouter.default_model` when given.
    pub fn new(
        openrouter: &OpenRouterConfig,
        generation: &GenerationConfig,
        api_key: String,
        model: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(openrouter.timeout_secs))
            .user_agent(concat!("catalogsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogSyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&openrouter.base_url),
            api_key,
            model: model.unwrap_or_else(|| openrouter.default_model.clone()),
            temperature: generation.temperature,
            system_prompt: generation.system_prompt.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ContentGenerator for OpenRouterGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogSyncError::Generation(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CatalogSyncError::Generation(format!(
                "HTTP {status}: {}",
                truncate(&text, 200)
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CatalogSyncError::Generation(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|c| strip_reasoning_markers(&c))
            .unwrap_or_default();

        if content.is_empty() {
            return Err(CatalogSyncError::Generation("empty content".into()));
        }
        debug!(model = %self.model, chars = content.chars().count(), "generated");
        Ok(content)
    }
}

/// Resolve `{base}/chat/completions`, accepting a base that already ends in it.
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(base_url: &str) -> OpenRouterGenerator {
        let openrouter = OpenRouterConfig {
            base_url: base_url.to_string(),
            ..OpenRouterConfig::default()
        };
        OpenRouterGenerator::new(
            &openrouter,
            &GenerationConfig::default(),
            "test-key".into(),
            Some("test/model".into()),
        )
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "Write an SEO title".into(),
            max_tokens: 150,
        }
    }

    #[test]
    fn endpoint_resolution() {
        assert_eq!(
            chat_endpoint("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:1234/v1/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn model_override() {
        assert_eq!(generator("http://localhost").model(), "test/model");
    }

    #[tokio::test]
    async fn generates_and_strips_reasoning_markers() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer test-key"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "model": "test/model",
                "max_tokens": 150
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "<think></think>\n Great Tool 500W "}}]
            })))
            .mount(&server)
            .await;

        let text = generator(&server.uri()).generate(&request()).await.unwrap();
        assert_eq!(text, "Great Tool 500W");
    }

    #[tokio::test]
    async fn non_success_status_is_generation_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).generate(&request()).await.unwrap_err();
        match err {
            CatalogSyncError::Generation(msg) => assert!(msg.contains("429"), "{msg}"),
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_content_is_generation_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "<think></think>"}}]
            })))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(matches!(err, CatalogSyncError::Generation(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_generation_error() {
        let err = generator("http://127.0.0.1:9")
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogSyncError::Generation(_)));
    }
}
