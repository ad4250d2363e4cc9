//! Google Gemini 生成服务

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::infrastructure::config::GeminiConfig;
use super::sse_lines::SseLineBuffer;
use super::{FragmentStream, GenerationProvider, ProviderError};

pub const PROVIDER_NAME: &str = "gemini";

/// Google Gemini 生成服务
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

impl GenerateResponse {
    /// 拼接首个候选的全部文本片段
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiProvider {
    /// 创建服务实例；缺少 API Key 时立即失败
    pub fn new(config: &GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "GEMINI_API_KEY is missing in environment".to_string(),
            ));
        }

        // 不设置整体超时：流式响应可能持续较久，超时由调用方控制
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn request_body(prompt: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        }
    }

    async fn post(&self, url: &str, prompt: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .query(query)
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Gemini 返回错误: HTTP {}", status);
            return Err(upstream_error(status.as_u16(), &body));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate_content(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.endpoint("generateContent");
        let response = self.post(&url, prompt, &[]).await?;

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Transport(format!("解析 Gemini 响应失败: {}", e)))?;

        if let Some(err) = parsed.error {
            return Err(ProviderError::Upstream {
                status: err.code.unwrap_or(500),
                message: err.message,
            });
        }

        let text = parsed.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("Gemini 生成完成: {} 字符", text.len());
        Ok(text)
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn stream_content(&self, prompt: &str) -> Result<FragmentStream, ProviderError> {
        let url = self.endpoint("streamGenerateContent");
        let response = self.post(&url, prompt, &[("alt", "sse")]).await?;

        debug!("Gemini 流式响应已建立");
        Ok(fragment_stream(response.bytes_stream()))
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn upstream_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .map(|err| err.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    ProviderError::Upstream { status, message }
}

/// 解析一条流式事件负载；没有文本的事件返回 `None`，无法解析的事件视为流失败
fn parse_fragment(payload: &str) -> Option<Result<String, ProviderError>> {
    match serde_json::from_str::<GenerateResponse>(payload) {
        Ok(parsed) => {
            if let Some(err) = parsed.error {
                return Some(Err(ProviderError::Upstream {
                    status: err.code.unwrap_or(500),
                    message: err.message,
                }));
            }
            let text = parsed.text();
            (!text.is_empty()).then_some(Ok(text))
        }
        Err(e) => {
            warn!("无法解析的 Gemini 流式事件，终止流: {}", e);
            Some(Err(ProviderError::Stream(format!("malformed stream event: {}", e))))
        }
    }
}

struct StreamState {
    body: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<String, ProviderError>>,
    finished: bool,
}

/// 把上游SSE字节流转换成文本片段序列；出错后序列结束
fn fragment_stream<S>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        lines: SseLineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let fragments = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for payload in state.lines.push(&chunk) {
                        if let Some(item) = parse_fragment(&payload) {
                            state.pending.push_back(item);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(ProviderError::Stream(e.to_string())));
                }
                None => {
                    if let Some(item) = state.lines.finish().as_deref().and_then(parse_fragment) {
                        state.pending.push_back(item);
                    }
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://example.invalid/v1beta/".to_string(),
        }
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let err = GeminiProvider::new(&config("  ")).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn test_endpoint_format() {
        let provider = GeminiProvider::new(&config("secret-123")).unwrap();
        assert_eq!(
            provider.endpoint("generateContent"),
            "https://example.invalid/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(!format!("{:?}", provider).contains("secret-123"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), "Hello world");
    }

    #[test]
    fn test_upstream_error_extracts_message() {
        let err = upstream_error(403, r#"{"error":{"code":403,"message":"API key not valid"}}"#);
        match err {
            ProviderError::Upstream { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fragment_stream_parses_chunked_sse() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel")),
            Ok(Bytes::from_static(b"lo\"}]}}]}\r\n\r\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"\"}]}}]}\n\n")),
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" world\"}]}}]}\n\n")),
        ];

        let fragments: Vec<String> = fragment_stream(stream::iter(chunks))
            .map(|item| item.unwrap())
            .collect()
            .await;

        // 空文本事件被跳过
        assert_eq!(fragments, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_fragment_stream_ends_after_error_event() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n")),
            Ok(Bytes::from_static(b"data: {\"error\":{\"code\":429,\"message\":\"quota\"}}\n")),
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"b\"}]}}]}\n")),
        ];

        let items: Vec<_> = fragment_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("a"));
        assert!(matches!(items[1], Err(ProviderError::Upstream { status: 429, .. })));
    }

    #[tokio::test]
    async fn test_fragment_stream_fails_on_malformed_event() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n")),
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\n")),
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"c\"}]}}]}\n")),
        ];

        let items: Vec<_> = fragment_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("a"));
        assert!(matches!(items[1], Err(ProviderError::Stream(_))));
    }

    #[tokio::test]
    async fn test_fragment_stream_keeps_multibyte_text_across_chunks() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"caf\xC3")),
            Ok(Bytes::from_static(b"\xA9\"}]}}]}\n\n")),
        ];

        let items: Vec<_> = fragment_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().ok(), Some("caf\u{e9}"));
    }
}
