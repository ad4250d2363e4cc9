use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::cache::CacheConfig;
use crate::shared::constants::{cache, generation, metrics, rate_limit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub gemini: GeminiConfig,
    pub cache: CacheSettings,
    pub metrics: MetricsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// 默认激活的生成服务名称
    pub provider: String,
    pub timeout_seconds: u64,
    pub stream_idle_timeout_seconds: u64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub capacity: usize,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // 从环境变量加载配置
        dotenv::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                port: env_or("PORT", 3000),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },

            generation: GenerationConfig {
                provider: env::var("AI_PROVIDER")
                    .unwrap_or_else(|_| generation::DEFAULT_PROVIDER.to_string()),
                timeout_seconds: env_or("GENERATION_TIMEOUT_SECS", generation::DEFAULT_TIMEOUT_SECONDS),
                stream_idle_timeout_seconds: env_or(
                    "STREAM_IDLE_TIMEOUT_SECS",
                    generation::DEFAULT_STREAM_IDLE_TIMEOUT_SECONDS,
                ),
            },

            // 缺少密钥不阻止启动，首次使用该服务的请求会收到错误
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| generation::DEFAULT_GEMINI_MODEL.to_string()),
                base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or_else(|_| generation::DEFAULT_GEMINI_BASE_URL.to_string()),
            },

            cache: CacheSettings {
                ttl_ms: env_or("CACHE_TTL_MS", cache::DEFAULT_TTL_MS),
                sweep_interval_ms: env_or("CACHE_SWEEP_INTERVAL_MS", cache::DEFAULT_SWEEP_INTERVAL_MS),
            },

            metrics: MetricsConfig {
                capacity: env_or("METRICS_CAPACITY", metrics::DEFAULT_CAPACITY),
                log_to_file: env::var("LOG_TO_FILE").map(|v| v == "true").unwrap_or(false),
                log_path: env::var("METRICS_LOG_PATH")
                    .unwrap_or_else(|_| metrics::DEFAULT_LOG_PATH.to_string())
                    .into(),
            },

            rate_limit: RateLimitConfig {
                window_ms: env_or("RATE_LIMIT_WINDOW_MS", rate_limit::DEFAULT_WINDOW_MS),
                max_requests: env_or("RATE_LIMIT_MAX", rate_limit::DEFAULT_MAX_REQUESTS),
            },
        };

        if config.metrics.capacity == 0 {
            anyhow::bail!("METRICS_CAPACITY 必须大于 0");
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
            },
            generation: GenerationConfig {
                provider: generation::DEFAULT_PROVIDER.to_string(),
                timeout_seconds: generation::DEFAULT_TIMEOUT_SECONDS,
                stream_idle_timeout_seconds: generation::DEFAULT_STREAM_IDLE_TIMEOUT_SECONDS,
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                model: generation::DEFAULT_GEMINI_MODEL.to_string(),
                base_url: generation::DEFAULT_GEMINI_BASE_URL.to_string(),
            },
            cache: CacheSettings {
                ttl_ms: cache::DEFAULT_TTL_MS,
                sweep_interval_ms: cache::DEFAULT_SWEEP_INTERVAL_MS,
            },
            metrics: MetricsConfig {
                capacity: metrics::DEFAULT_CAPACITY,
                log_to_file: false,
                log_path: metrics::DEFAULT_LOG_PATH.into(),
            },
            rate_limit: RateLimitConfig {
                window_ms: rate_limit::DEFAULT_WINDOW_MS,
                max_requests: rate_limit::DEFAULT_MAX_REQUESTS,
            },
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_millis(self.ttl_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.api_key.is_empty() { "[MISSING]" } else { "[REDACTED]" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// 读取环境变量并解析，缺失或解析失败时使用默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.cache.to_cache_config().default_ttl, Duration::from_secs(600));
        assert_eq!(config.cache.to_cache_config().sweep_interval, Duration::from_secs(300));
        assert_eq!(config.metrics.capacity, 1000);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.generation.provider, "gemini");
    }

    #[test]
    fn test_env_or_falls_back_on_parse_failure() {
        std::env::set_var("FITNESS_GATEWAY_TEST_PORT", "not-a-port");
        assert_eq!(env_or("FITNESS_GATEWAY_TEST_PORT", 3000u16), 3000);
        std::env::set_var("FITNESS_GATEWAY_TEST_PORT", "8081");
        assert_eq!(env_or("FITNESS_GATEWAY_TEST_PORT", 3000u16), 8081);
        std::env::remove_var("FITNESS_GATEWAY_TEST_PORT");
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let mut config = Config::default();
        config.gemini.api_key = "secret-key".to_string();
        let debug = format!("{:?}", config.gemini);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
