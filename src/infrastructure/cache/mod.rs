//! 缓存基础设施模块
//!
//! AI响应缓存：
//! - 键派生：对请求中语义相关的标量做确定性哈希
//! - 存储：带TTL的内存映射，读取时惰性过期，后台定期清扫

use std::time::Duration;
use tokio::time::Instant;

pub mod key;
pub mod response_cache;

#[cfg(test)]
mod response_cache_tests;

// 重新导出主要类型
pub use key::{make_key, KeyPart};
pub use response_cache::{ResponseCache, SharedResponseCache};

/// 缓存条目：负载 + 绝对过期时间
///
/// 只能整体替换，不做原地更新
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.checked_duration_since(Instant::now())
    }
}

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        use crate::shared::constants::cache::{DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_TTL_MS};

        Self {
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}
