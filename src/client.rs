//! Transport to the vision model: one OpenAI-style chat completion per page.
//!
//! [`ExtractionClient`] is the seam the pipeline talks to. The production
//! implementation, [`OpenAiCompatClient`], speaks the `chat/completions` wire
//! format over `reqwest`, so it works against DeepInfra, OpenAI, vLLM, LiteLLM
//! or any other gateway exposing that route. Tests substitute their own
//! implementation.
//!
//! The client makes exactly one HTTP call per method call. Retrying is the
//! pipeline's job (see [`crate::pipeline::llm`]); the client only classifies
//! failures into [`ClientError`] kinds.

use crate::config::ApiConfig;
use crate::error::{ClientError, PdfTextError};
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Everything needed to ask the model for one page's text.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-indexed.
    pub page_num: usize,
    pub image: EncodedImage,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A successful model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Reply text, trimmed.
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Something that can turn a page image into text.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// One remote call for one page. No retries.
    async fn extract_page(&self, request: &PageRequest) -> Result<Completion, ClientError>;

    /// Cheap round trip that proves the endpoint and credentials work.
    async fn verify(&self) -> Result<(), ClientError>;
}

// ── Wire format ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
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

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn page_request_body<'a>(model: &'a str, request: &'a PageRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            WireMessage {
                role: "system",
                content: WireContent::Text(&request.system_prompt),
            },
            WireMessage {
                role: "user",
                content: WireContent::Parts(vec![
                    ContentPart::Text {
                        text: &request.user_prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.data_uri(),
                        },
                    },
                ]),
            },
        ],
        max_tokens: request.max_tokens,
        temperature: Some(request.temperature),
    }
}

fn verify_request_body(model: &str) -> ChatRequest<'_> {
    ChatRequest {
        model,
        messages: vec![WireMessage {
            role: "user",
            content: WireContent::Text("Test"),
        }],
        max_tokens: 10,
        temperature: None,
    }
}

/// Pull the reply text and token usage out of a 2xx body.
fn parse_completion(body: &str) -> Result<Completion, ClientError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::InvalidResponse(format!("malformed JSON: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponse("no choices in response".into()))?;
    let usage = response.usage.unwrap_or_default();

    Ok(Completion {
        text: choice.message.content.unwrap_or_default().trim().to_string(),
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    })
}

/// Human-readable detail from an error body: the `error.message` field when
/// present, otherwise the first 200 characters.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => body.trim().chars().take(200).collect(),
    }
}

// ── Production client ─────────────────────────────────────────────────────

/// [`ExtractionClient`] for any OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    api: ApiConfig,
}

impl OpenAiCompatClient {
    pub fn new(api: ApiConfig) -> Result<Self, PdfTextError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| PdfTextError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, api })
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    fn transport_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                secs: self.api.timeout_secs,
            }
        } else {
            ClientError::Transient(e.to_string())
        }
    }

    /// POST `body` and return the raw 2xx response text.
    async fn post(&self, body: &ChatRequest<'_>) -> Result<String, ClientError> {
        let url = self.api.chat_completions_url();
        trace!(%url, model = %self.api.model, "POST chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), error_detail(&text)));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExtractionClient for OpenAiCompatClient {
    async fn extract_page(&self, request: &PageRequest) -> Result<Completion, ClientError> {
        let body = page_request_body(&self.api.model, request);
        let text = self.post(&body).await?;
        let completion = parse_completion(&text)?;
        debug!(
            "Page {}: {} chars back, {} prompt / {} completion tokens",
            request.page_num,
            completion.text.len(),
            completion.prompt_tokens,
            completion.completion_tokens
        );
        Ok(completion)
    }

    async fn verify(&self) -> Result<(), ClientError> {
        let body = verify_request_body(&self.api.model);
        self.post(&body).await?;
        debug!("Endpoint {} reachable", self.api.base_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> PageRequest {
        PageRequest {
            page_num: 3,
            image: EncodedImage {
                base64: "QUJD".into(),
                mime_type: "image/jpeg".into(),
            },
            system_prompt: "SYS".into(),
            user_prompt: "Extract text from page 3.".into(),
            max_tokens: 4096,
            temperature: 0.3,
        }
    }

    #[test]
    fn page_body_matches_wire_format() {
        let req = request();
        let body = serde_json::to_value(page_request_body("vision-model", &req)).unwrap();

        assert_eq!(body["model"], "vision-model");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "SYS"}));

        let user = &body["messages"][1];
        assert_eq!(user["role"], "user");
        assert_eq!(
            user["content"][0],
            json!({"type": "text", "text": "Extract text from page 3."})
        );
        assert_eq!(
            user["content"][1],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,QUJD"}})
        );
        let t = body["temperature"].as_f64().unwrap();
        assert!((t - 0.3).abs() < 1e-6);
    }

    #[test]
    fn verify_body_is_tiny() {
        let body = serde_json::to_value(verify_request_body("m")).unwrap();
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["messages"][0]["content"], "Test");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parses_content_and_usage() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "  Hello\nWorld \n"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 7, "total_tokens": 127}
        })
        .to_string();
        let c = parse_completion(&body).unwrap();
        assert_eq!(c.text, "Hello\nWorld");
        assert_eq!((c.prompt_tokens, c.completion_tokens), (120, 7));
    }

    #[test]
    fn missing_usage_counts_zero() {
        let body = json!({"choices": [{"message": {"content": "x"}}]}).to_string();
        let c = parse_completion(&body).unwrap();
        assert_eq!((c.prompt_tokens, c.completion_tokens), (0, 0));
    }

    #[test]
    fn empty_choices_is_invalid_response() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
        assert!(err.is_transient());

        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[test]
    fn error_detail_prefers_message_field() {
        assert_eq!(
            error_detail(r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#),
            "Invalid API key"
        );
        let long = "x".repeat(500);
        assert_eq!(error_detail(&long).len(), 200);
    }
}
