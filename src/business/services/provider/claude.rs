//! Claude 生成服务（占位）
//!
//! 保留注册名称，所有操作都返回 `NotImplemented`

use async_trait::async_trait;

use super::{FragmentStream, GenerationProvider, ProviderError};

pub const PROVIDER_NAME: &str = "claude";

#[derive(Debug, Default)]
pub struct ClaudeProvider;

#[async_trait]
impl GenerationProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn generate_content(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotImplemented(PROVIDER_NAME))
    }

    async fn stream_content(&self, _prompt: &str) -> Result<FragmentStream, ProviderError> {
        Err(ProviderError::NotImplemented(PROVIDER_NAME))
    }
}
