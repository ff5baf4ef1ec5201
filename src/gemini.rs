use crate::config::Config;
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Gemini `generateContent` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// The JSON object the model is instructed to return
#[derive(Debug, Deserialize)]
struct TranslatedPayload {
    #[serde(default)]
    translated_title: String,
    #[serde(default)]
    translated_body: String,
}

/// Input for one translation of a post into one locale.
#[derive(Debug, Clone, Copy)]
pub struct TranslateRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub source_locale: &'a str,
    pub target_locale: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
}

/// Translated title and HTML body, both trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Transport,
    Status,
    Parse,
}

/// A failed translation attempt. Every variant is retried.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The URL is stripped from the source error since it carries the key
    #[error("gemini request failed: {0}")]
    Transport(reqwest::Error),
    #[error("gemini request failed: status={status}")]
    Status { status: u16, body: String },
    #[error("gemini response could not be parsed: {0}")]
    Parse(String),
}

impl EngineError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::Transport(_) => EngineErrorKind::Transport,
            EngineError::Status { .. } => EngineErrorKind::Status,
            EngineError::Parse(_) => EngineErrorKind::Parse,
        }
    }
}

/// Something that can translate a post's title and body.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(
        &self,
        request: &TranslateRequest<'_>,
    ) -> Result<TranslatedContent, EngineError>;
}

/// Build the single instruction prompt sent to the model
fn build_prompt(request: &TranslateRequest<'_>) -> String {
    let input = serde_json::json!({
        "source_locale": request.source_locale,
        "target_locale": request.target_locale,
        "title": request.title,
        "body": request.body,
    });

    format!(
        "You are a translation engine for blog content. \
         Translate title and HTML body faithfully from source_locale to target_locale. \
         Preserve HTML tags, links, and code blocks in body. \
         Return only JSON with keys translated_title and translated_body.\n{}",
        input
    )
}

fn build_request_body(prompt: String) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            temperature: 0.2,
        },
    }
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Unwrap the Gemini envelope and validate the translated payload
fn parse_translation(response_body: &str) -> Result<TranslatedContent, EngineError> {
    let response: GenerateResponse = serde_json::from_str(response_body)
        .map_err(|e| EngineError::Parse(format!("invalid response envelope: {}", e)))?;

    let text = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .and_then(|content| content.parts.first())
        .map(|part| part.text.as_str())
        .ok_or_else(|| EngineError::Parse("empty gemini candidates".to_string()))?;

    let payload: TranslatedPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| EngineError::Parse(format!("invalid translation payload: {}", e)))?;

    let title = payload.translated_title.trim();
    let body = payload.translated_body.trim();
    if title.is_empty() || body.is_empty() {
        return Err(EngineError::Parse(
            "gemini translation returned empty title/body".to_string(),
        ));
    }

    Ok(TranslatedContent {
        title: title.to_string(),
        body: body.to_string(),
    })
}

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Build a client from the process configuration
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(
            http,
            config.gemini_api_url.clone(),
            RetryConfig::new(3, config.retry_backoff_unit).with_max_delay(Duration::from_secs(60)),
        ))
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// One request/response cycle, without retries
    async fn attempt(
        &self,
        url: &str,
        api_key: &str,
        body: &GenerateRequest,
    ) -> Result<TranslatedContent, EngineError> {
        let response = self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.without_url()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.without_url()))?;

        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_translation(&text)
    }
}

#[async_trait]
impl TranslationEngine for GeminiClient {
    async fn translate(
        &self,
        request: &TranslateRequest<'_>,
    ) -> Result<TranslatedContent, EngineError> {
        let url = self.endpoint(request.model);
        let body = build_request_body(build_prompt(request));

        with_retry(
            &self.retry,
            &format!("Gemini translation to {}", request.target_locale),
            || self.attempt(&url, request.api_key, &body),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Helper Functions ====================

    fn request<'a>() -> TranslateRequest<'a> {
        TranslateRequest {
            title: "こんにちは",
            body: "<p>世界</p>",
            source_locale: "ja",
            target_locale: "en",
            model: "gemini-1.5-flash",
            api_key: "test-key",
        }
    }

    fn create_gemini_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {
                    "content": {
                        "role": "model",
                        "parts": [{ "text": text }]
                    },
                    "finishReason": "STOP"
                }
            ]
        })
    }

    fn test_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            server.uri(),
            RetryConfig::new(3, Duration::from_millis(5)),
        )
    }

    const MODEL_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    // ==================== Prompt Tests ====================

    #[test]
    fn test_build_prompt_embeds_json_payload() {
        let prompt = build_prompt(&request());

        assert!(prompt.contains("translation engine for blog content"));
        assert!(prompt.contains("Preserve HTML tags"));
        assert!(prompt.contains("translated_title and translated_body"));

        let json_line = prompt.lines().last().unwrap();
        let payload: serde_json::Value = serde_json::from_str(json_line).unwrap();
        assert_eq!(payload["source_locale"], "ja");
        assert_eq!(payload["target_locale"], "en");
        assert_eq!(payload["title"], "こんにちは");
        assert_eq!(payload["body"], "<p>世界</p>");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(build_request_body("hi".to_string())).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }],
                "generationConfig": { "responseMimeType": "application/json", "temperature": 0.2 }
            })
        );
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn test_parse_plain_json() {
        let envelope = create_gemini_response(
            r#"{"translated_title":" Hello ","translated_body":"<p>World</p>\n"}"#,
        );

        let result = parse_translation(&envelope.to_string()).unwrap();
        assert_eq!(result.title, "Hello");
        assert_eq!(result.body, "<p>World</p>");
    }

    #[test]
    fn test_parse_fenced_json() {
        let envelope = create_gemini_response(
            "```json\n{\"translated_title\":\"Hello\",\"translated_body\":\"<p>World</p>\"}\n```",
        );

        let result = parse_translation(&envelope.to_string()).unwrap();
        assert_eq!(result.title, "Hello");

        let bare_fence = create_gemini_response(
            "```\n{\"translated_title\":\"Hi\",\"translated_body\":\"<p>x</p>\"}```",
        );
        assert_eq!(parse_translation(&bare_fence.to_string()).unwrap().title, "Hi");
    }

    #[test]
    fn test_parse_rejects_malformed_envelope() {
        let err = parse_translation("not json").unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Parse);
    }

    #[test]
    fn test_parse_rejects_missing_candidates() {
        for body in [
            r#"{"candidates":[]}"#,
            r#"{}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
        ] {
            let err = parse_translation(body).unwrap_err();
            assert!(err.to_string().contains("empty gemini candidates"), "{}", body);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_inner_json() {
        let envelope = create_gemini_response("Sure! Here is the translation: Hello");
        let err = parse_translation(&envelope.to_string()).unwrap_err();
        assert!(err.to_string().contains("invalid translation payload"));
    }

    #[test]
    fn test_parse_rejects_blank_fields() {
        let envelope =
            create_gemini_response(r#"{"translated_title":"   ","translated_body":"<p>x</p>"}"#);
        let err = parse_translation(&envelope.to_string()).unwrap_err();
        assert!(err.to_string().contains("empty title/body"));

        let missing_body = create_gemini_response(r#"{"translated_title":"Hello"}"#);
        assert!(parse_translation(&missing_body.to_string()).is_err());
    }

    // ==================== HTTP Tests with Wiremock ====================

    #[tokio::test]
    async fn test_translate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_gemini_response(
                r#"{"translated_title":"Hello","translated_body":"<p>World</p>"}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .translate(&request())
            .await
            .expect("Should succeed");

        assert_eq!(
            result,
            TranslatedContent {
                title: "Hello".to_string(),
                body: "<p>World</p>".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_translate_exhausts_three_attempts_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .translate(&request())
            .await
            .unwrap_err();

        match err {
            EngineError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_translate_retries_client_errors_too() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .translate(&request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::Status);
    }

    #[tokio::test]
    async fn test_translate_recovers_after_parse_failure() {
        let mock_server = MockServer::start().await;

        // First response is unusable, second is fine
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_gemini_response(r#"{"translated_title":""}"#)),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_gemini_response(
                r#"{"translated_title":"Hello","translated_body":"<p>World</p>"}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .translate(&request())
            .await
            .expect("Should succeed on retry");

        assert_eq!(result.title, "Hello");
    }

    #[tokio::test]
    async fn test_translate_transport_error_uses_every_attempt() {
        // Reserve a port, then release it so connections are refused
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = GeminiClient::new(
            reqwest::Client::new(),
            format!("http://127.0.0.1:{}", port),
            RetryConfig::new(3, Duration::from_millis(40)),
        );

        let start = std::time::Instant::now();
        let err = client.translate(&request()).await.unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::Transport);
        // Backoff after attempts 1 and 2: 40ms + 80ms
        assert!(
            start.elapsed() >= Duration::from_millis(120),
            "Expected 3 attempts, finished after {:?}",
            start.elapsed()
        );
        assert!(!err.to_string().contains("test-key"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_ignored() {
        let client = GeminiClient::new(
            reqwest::Client::new(),
            "http://localhost:1234/",
            RetryConfig::engine_call(),
        );
        assert_eq!(
            client.endpoint("gemini-2.0-flash"),
            "http://localhost:1234/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
