//! 内存响应缓存
//!
//! 键 -> (负载, 过期时间)。除TTL之外没有容量上限：
//! 各端点参与键派生的标量都很粗粒度，键空间有限。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{CacheConfig, CacheEntry};

/// 带TTL的内存缓存
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

/// 进程内共享的缓存句柄
pub type SharedResponseCache<V> = Arc<ResponseCache<V>>;

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl)
    }

    /// 获取未过期的缓存值；已过期的条目在这里被移除
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    debug!("缓存未命中: key={}", key);
                    return None;
                }
                Some(entry) if !entry.is_expired_at(now) => {
                    debug!("缓存命中: key={}", key);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // 已过期：升级为写锁后再确认一次，期间可能有新的 set
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                entries.remove(key);
                debug!("缓存条目已过期并移除: key={}", key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// 写入缓存，覆盖同键的旧条目；`ttl` 为空时使用默认TTL
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), CacheEntry::new(value, ttl));
        debug!("缓存设置: key={}, ttl={:?}, size={}", key, ttl, entries.len());
    }

    /// 等价于 `get(key).is_some()`，不暴露负载
    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// 立即清空所有条目
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("响应缓存已清空");
    }

    /// 当前条目数（包含尚未被清扫的过期条目）
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 移除所有已过期的条目，返回移除数量
    ///
    /// 只删除过期时间已经过去的条目，不会影响并发读者即将使用的有效条目
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// 启动后台清扫任务
    ///
    /// 任务只持有弱引用，缓存被释放后自动退出
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("响应缓存已释放，清扫任务退出");
                    break;
                };
                let removed = cache.prune_expired().await;
                if removed > 0 {
                    info!("🧹 清扫过期缓存条目: 移除 {} 个，剩余 {} 个", removed, cache.size().await);
                }
            }
        })
    }
}
