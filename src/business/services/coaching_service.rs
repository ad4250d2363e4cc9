//! 教练请求编排
//!
//! 所有能力共用同一流程：派生缓存键 -> 查缓存 -> 组装提示词 -> 调用生成服务 -> 解析 -> 写缓存。
//! 整段模式返回结构化负载；流式模式把生成片段逐个包装成SSE帧，流式结果不写缓存。

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::business::domain::{Capability, ChatReply, CoachingPayload};
use crate::business::services::metrics::RequestMetrics;
use crate::business::services::prompt_service;
use crate::business::services::provider::{FragmentStream, ProviderError, SharedProviderRegistry};
use crate::cache_key;
use crate::infrastructure::cache::SharedResponseCache;
use crate::infrastructure::config::GenerationConfig;
use crate::shared::constants::sse::{DONE_SENTINEL, STREAM_FAILED_MESSAGE};
use crate::shared::constants::PROMPT_VERSION;
use crate::shared::types::UserContext;

/// 生成流程错误
///
/// 超时归入 `Provider(ProviderError::Timeout)`
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 去掉代码围栏后仍不是合法JSON
    #[error("生成结果不是合法JSON: {0}")]
    Parse(#[source] serde_json::Error),

    /// 合法JSON但不是对象
    #[error("生成结果不是JSON对象")]
    NotAnObject,

    /// 不符合能力对应的结构
    #[error("生成结果不符合 {capability} 的结构: {source}")]
    Schema {
        capability: Capability,
        #[source]
        source: serde_json::Error,
    },
}

/// 去掉模型输出中的 Markdown 代码围栏
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// 解析生成的JSON对象并附加提示词版本
pub fn parse_generated_json(raw: &str) -> Result<Map<String, Value>, GenerationError> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(&cleaned).map_err(GenerationError::Parse)? {
        Value::Object(mut object) => {
            object.insert("prompt_version".to_string(), Value::String(PROMPT_VERSION.to_string()));
            Ok(object)
        }
        _ => Err(GenerationError::NotAnObject),
    }
}

/// 解析并按能力对应的结构解码
pub fn parse_generated_payload(capability: Capability, raw: &str) -> Result<CoachingPayload, GenerationError> {
    let object = parse_generated_json(raw)?;
    capability
        .decode(Value::Object(object))
        .map_err(|source| GenerationError::Schema { capability, source })
}

/// 一次教练请求的输入
#[derive(Debug, Clone, Copy)]
pub struct CoachingTask<'a> {
    pub capability: Capability,
    pub context: &'a UserContext,
    /// 教学的动作名或对话消息
    pub subject: Option<&'a str>,
}

impl<'a> CoachingTask<'a> {
    pub fn new(capability: Capability, context: &'a UserContext) -> Self {
        Self {
            capability,
            context,
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: &'a str) -> Self {
        self.subject = Some(subject);
        self
    }

    /// 缓存键：能力区分符 + 提示词版本 + 各能力选定的标量
    ///
    /// 对话不缓存，返回 `None`
    pub fn cache_key(&self) -> Option<String> {
        let ctx = self.context;
        let discriminator = self.capability.discriminator();

        let key = match self.capability {
            Capability::WorkoutPlan => {
                cache_key!(discriminator, PROMPT_VERSION, ctx.goal_type_str(), ctx.streak, ctx.bmi)
            }
            Capability::ProgressAnalysis => {
                cache_key!(discriminator, PROMPT_VERSION, ctx.streak, ctx.workout_history.len())
            }
            Capability::Recommendations => {
                cache_key!(discriminator, PROMPT_VERSION, ctx.streak, ctx.missed_days)
            }
            Capability::TeachMe => {
                cache_key!(discriminator, PROMPT_VERSION, self.subject, ctx.streak, ctx.bmi)
            }
            Capability::Chat => return None,
        };
        Some(key)
    }

    pub fn prompt(&self) -> String {
        prompt_service::build_prompt(self.capability, self.context, self.subject.unwrap_or_default())
    }
}

/// SSE 帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Text(String),
    Failed,
    Done,
}

impl SseFrame {
    /// 编码为 `data: <payload>\n\n`
    pub fn encode(&self) -> Bytes {
        let payload = match self {
            SseFrame::Text(text) => json!({ "text": text }).to_string(),
            SseFrame::Failed => json!({ "error": STREAM_FAILED_MESSAGE }).to_string(),
            SseFrame::Done => DONE_SENTINEL.to_string(),
        };
        Bytes::from(format!("data: {}\n\n", payload))
    }
}

enum StreamPhase {
    Opening {
        providers: SharedProviderRegistry,
        prompt: String,
    },
    Streaming(FragmentStream),
    Finished,
}

struct StreamState {
    phase: StreamPhase,
    capability: Capability,
    metrics: Arc<RequestMetrics>,
    open_timeout: Duration,
    idle_timeout: Duration,
}

async fn open_stream(
    providers: &SharedProviderRegistry,
    prompt: &str,
    open_timeout: Duration,
) -> Result<FragmentStream, ProviderError> {
    let provider = providers.active().await?;
    tokio::time::timeout(open_timeout, provider.stream_content(prompt))
        .await
        .map_err(|_| ProviderError::Timeout(open_timeout))?
}

/// 教练服务
#[derive(Clone)]
pub struct CoachingService {
    cache: SharedResponseCache<CoachingPayload>,
    providers: SharedProviderRegistry,
    timeout: Duration,
    stream_idle_timeout: Duration,
}

pub type SharedCoachingService = Arc<CoachingService>;

impl CoachingService {
    pub fn new(
        cache: SharedResponseCache<CoachingPayload>,
        providers: SharedProviderRegistry,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            cache,
            providers,
            timeout: config.timeout(),
            stream_idle_timeout: config.stream_idle_timeout(),
        }
    }

    pub fn cache(&self) -> &SharedResponseCache<CoachingPayload> {
        &self.cache
    }

    pub fn providers(&self) -> &SharedProviderRegistry {
        &self.providers
    }

    /// 整段模式
    ///
    /// 命中缓存时直接返回；未命中时生成、解析并写入缓存。失败不写缓存。
    #[instrument(skip(self, task, metrics), fields(capability = %task.capability))]
    pub async fn run_buffered(
        &self,
        task: &CoachingTask<'_>,
        metrics: &RequestMetrics,
    ) -> Result<CoachingPayload, GenerationError> {
        metrics.set_prompt_version(PROMPT_VERSION);
        let key = task.cache_key();

        if let Some(key) = key.as_deref() {
            if let Some(cached) = self.cache.get(key).await {
                if cached.capability() == task.capability {
                    metrics.mark_cache_hit();
                    debug!("🎯 命中缓存: {}", key);
                    return Ok(cached);
                }
                warn!("⚠️ 缓存键 {} 冲突: 缓存的是 {}，按未命中处理", key, cached.capability());
            }
        }

        let prompt = task.prompt();
        let provider = self.providers.active().await?;
        let raw = tokio::time::timeout(self.timeout, provider.generate_content(&prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let payload = match task.capability {
            Capability::Chat => CoachingPayload::Chat(ChatReply {
                reply: raw,
                prompt_version: PROMPT_VERSION.to_string(),
            }),
            capability => parse_generated_payload(capability, &raw).map_err(|e| {
                warn!("❌ 解析 {} 生成结果失败: {}", capability, e);
                debug!("原始输出: {}", raw);
                e
            })?,
        };

        if let Some(key) = key {
            self.cache.set(key, payload.clone(), None).await;
        }

        info!("✅ {} 生成完成 (provider={})", task.capability, provider.name());
        Ok(payload)
    }

    /// 流式模式
    ///
    /// 每个片段一个文本帧；正常结束后发送 `[DONE]`；失败时发送一个错误帧并结束，不再发送 `[DONE]`。
    /// 打开流本身失败也表现为单个错误帧。
    pub fn stream(
        &self,
        task: &CoachingTask<'_>,
        metrics: Arc<RequestMetrics>,
    ) -> impl Stream<Item = SseFrame> + Send + 'static {
        metrics.set_prompt_version(PROMPT_VERSION);

        let state = StreamState {
            phase: StreamPhase::Opening {
                providers: Arc::clone(&self.providers),
                prompt: task.prompt(),
            },
            capability: task.capability,
            metrics,
            open_timeout: self.timeout,
            idle_timeout: self.stream_idle_timeout,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                match std::mem::replace(&mut state.phase, StreamPhase::Finished) {
                    StreamPhase::Opening { providers, prompt } => {
                        match open_stream(&providers, &prompt, state.open_timeout).await {
                            Ok(fragments) => state.phase = StreamPhase::Streaming(fragments),
                            Err(e) => {
                                error!("❌ 打开 {} 生成流失败: {}", state.capability, e);
                                return Some((SseFrame::Failed, state));
                            }
                        }
                    }
                    StreamPhase::Streaming(mut fragments) => {
                        match tokio::time::timeout(state.idle_timeout, fragments.next()).await {
                            Ok(Some(Ok(text))) if text.is_empty() => {
                                state.phase = StreamPhase::Streaming(fragments);
                            }
                            Ok(Some(Ok(text))) => {
                                state.metrics.mark_first_fragment();
                                state.phase = StreamPhase::Streaming(fragments);
                                return Some((SseFrame::Text(text), state));
                            }
                            Ok(Some(Err(e))) => {
                                error!("❌ {} 生成流中断: {}", state.capability, e);
                                return Some((SseFrame::Failed, state));
                            }
                            Ok(None) => {
                                debug!("{} 生成流完成", state.capability);
                                return Some((SseFrame::Done, state));
                            }
                            Err(_) => {
                                let e = ProviderError::Timeout(state.idle_timeout);
                                error!("❌ {} 生成流中断: {}", state.capability, e);
                                return Some((SseFrame::Failed, state));
                            }
                        }
                    }
                    StreamPhase::Finished => return None,
                }
            }
        })
    }
}

impl std::fmt::Debug for CoachingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoachingService")
            .field("timeout", &self.timeout)
            .field("stream_idle_timeout", &self.stream_idle_timeout)
            .finish_non_exhaustive()
    }
}
