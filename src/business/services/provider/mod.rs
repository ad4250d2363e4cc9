//! 文本生成服务抽象
//!
//! 生成后端通过 [`GenerationProvider`] 接入，支持整段生成与增量（流式）生成两种模式。
//! 具体实现由 [`ProviderRegistry`] 按名称构造，同一时间只保留一个激活实例。

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

pub mod claude;
pub mod gemini;
pub mod registry;
mod sse_lines;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use registry::{ProviderConstructor, ProviderRegistry, SharedProviderRegistry};

/// 增量生成的文本片段序列
///
/// 有序、只进、不可重启；每个元素都是非空片段。
/// 序列中途出现 `Err` 表示上游失败，已交付的片段不会被撤回。
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// 生成服务错误
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 缺少凭据等配置
    #[error("生成服务未配置: {0}")]
    NotConfigured(String),

    /// 占位实现
    #[error("生成服务 {0} 尚未实现")]
    NotImplemented(&'static str),

    /// 注册表中不存在该名称
    #[error("未知的生成服务: {0}")]
    UnknownProvider(String),

    /// 网络/传输层错误
    #[error("请求生成服务失败: {0}")]
    Transport(String),

    /// 上游返回非成功状态
    #[error("生成服务返回错误 (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    /// 上游返回了成功状态但没有可用文本
    #[error("生成服务返回空内容")]
    EmptyResponse,

    /// 流读取失败
    #[error("读取生成流失败: {0}")]
    Stream(String),

    /// 超过等待时间
    #[error("等待生成服务超时 ({0:?})")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Transport(format!("请求超时: {}", err))
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// 文本生成服务接口
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// 注册表中的名称
    fn name(&self) -> &'static str;

    /// 整段生成
    async fn generate_content(&self, prompt: &str) -> Result<String, ProviderError>;

    /// 增量生成
    ///
    /// 打开流失败直接返回 `Err`；打开后的失败体现在序列元素中
    async fn stream_content(&self, prompt: &str) -> Result<FragmentStream, ProviderError>;
}
