//! 生成服务注册表
//!
//! 按名称登记构造函数，同一时间只保留一个激活实例（惰性单例）：
//! 请求的名称与当前激活名称不同、或实例被显式失效时才重新构造。
//! 已被调用方取走的旧实例继续有效，直到最后一个引用释放。

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::infrastructure::config::GeminiConfig;
use super::{claude, gemini, ClaudeProvider, GeminiProvider, GenerationProvider, ProviderError};

/// 生成服务构造函数；构造可能立即失败（例如缺少凭据）
pub type ProviderConstructor =
    Arc<dyn Fn() -> Result<Arc<dyn GenerationProvider>, ProviderError> + Send + Sync>;

struct ActiveProvider {
    name: String,
    instance: Option<Arc<dyn GenerationProvider>>,
}

pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
    active: Mutex<ActiveProvider>,
}

pub type SharedProviderRegistry = Arc<ProviderRegistry>;

impl ProviderRegistry {
    /// 创建空注册表，`default_name` 为初始激活名称
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            constructors: BTreeMap::new(),
            active: Mutex::new(ActiveProvider {
                name: default_name.into(),
                instance: None,
            }),
        }
    }

    /// 登记内置的 gemini 与 claude
    pub fn with_builtin(default_name: impl Into<String>, gemini_config: GeminiConfig) -> Self {
        Self::new(default_name)
            .with_provider(gemini::PROVIDER_NAME, move || {
                let provider = GeminiProvider::new(&gemini_config)?;
                Ok(Arc::new(provider) as Arc<dyn GenerationProvider>)
            })
            .with_provider(claude::PROVIDER_NAME, || {
                Ok(Arc::new(ClaudeProvider) as Arc<dyn GenerationProvider>)
            })
    }

    /// 登记一个构造函数，同名覆盖
    pub fn with_provider<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn GenerationProvider>, ProviderError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub async fn active_name(&self) -> String {
        self.active.lock().await.name.clone()
    }

    /// 获取当前激活的实例
    pub async fn active(&self) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
        self.get(None).await
    }

    /// 获取指定名称的实例；名称与当前激活的不同时重建并切换
    ///
    /// 构造失败直接返回给调用方，激活状态保持不变
    pub async fn get(&self, name: Option<&str>) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
        let mut active = self.active.lock().await;
        let requested = name.unwrap_or(&active.name).to_string();

        if requested == active.name {
            if let Some(instance) = &active.instance {
                return Ok(Arc::clone(instance));
            }
        }

        let constructor = self
            .constructors
            .get(&requested)
            .ok_or_else(|| ProviderError::UnknownProvider(requested.clone()))?;

        let instance = constructor().map_err(|e| {
            warn!("⚠️ 构造生成服务 {} 失败: {}", requested, e);
            e
        })?;

        info!("🔄 激活生成服务: {}", requested);
        active.name = requested;
        active.instance = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// 切换激活名称，实例在下次使用时重建
    pub async fn set_active(&self, name: &str) -> Result<(), ProviderError> {
        if !self.constructors.contains_key(name) {
            return Err(ProviderError::UnknownProvider(name.to_string()));
        }

        let mut active = self.active.lock().await;
        active.name = name.to_string();
        active.instance = None;
        info!("🔄 生成服务切换为: {}", name);
        Ok(())
    }

    /// 丢弃当前实例，下次使用时重建
    pub async fn invalidate(&self) {
        self.active.lock().await.instance = None;
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish_non_exhaustive()
    }
}
