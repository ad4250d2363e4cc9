use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::infrastructure::config::RateLimitConfig;

/// 速率限制记录（固定窗口）
#[derive(Debug, Clone)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_start: Instant,
}

/// 速率限制结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u32, reset_after_ms: u64 },
    Limited { retry_after_ms: u64 },
}

/// 速率限制服务
/// 按客户端地址在固定窗口内计数
pub struct RateLimitService {
    window: Duration,
    max_requests: u32,
    // 客户端标识 -> 记录
    records: RwLock<HashMap<String, RateLimitRecord>>,
}

impl RateLimitService {
    /// 创建新的速率限制服务
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// 每个窗口允许的请求数
    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// 检查并更新速率限制
    pub async fn check_rate_limit(&self, client: &str) -> RateLimitResult {
        let now = Instant::now();

        let mut records = self.records.write().await;
        let record = records.entry(client.to_string()).or_insert_with(|| RateLimitRecord {
            count: 0,
            window_start: now,
        });

        // 窗口过期则重置计数器
        if now.duration_since(record.window_start) >= self.window {
            record.count = 0;
            record.window_start = now;
        }

        let elapsed = now.duration_since(record.window_start);
        let reset_after_ms = self.window.saturating_sub(elapsed).as_millis() as u64;

        if record.count >= self.max_requests {
            warn!("⚠️ 客户端 {} 触发限流: {}/{}", client, record.count, self.max_requests);
            return RateLimitResult::Limited { retry_after_ms: reset_after_ms };
        }

        record.count += 1;
        debug!("✅ 客户端 {} 速率检查通过: {}/{}", client, record.count, self.max_requests);

        RateLimitResult::Allowed {
            remaining: self.max_requests - record.count,
            reset_after_ms,
        }
    }

    /// 清理过期记录（定期调用）
    pub async fn cleanup_expired_records(&self) -> usize {
        let now = Instant::now();
        let window = self.window;

        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| now.duration_since(record.window_start) < window);
        let removed = before - records.len();

        if removed > 0 {
            info!("🧹 清理速率限制记录 {} 条，当前记录数: {}", removed, records.len());
        }
        removed
    }

    /// 启动后台清理任务；服务被释放后任务退出
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(service) => {
                        service.cleanup_expired_records().await;
                    }
                    None => break,
                }
            }
        })
    }
}

/// 全局速率限制服务实例
pub type SharedRateLimitService = Arc<RateLimitService>;

#[cfg(test)]
mod tests {
    use super::*;

    fn service(max_requests: u32) -> RateLimitService {
        RateLimitService::new(&RateLimitConfig {
            window_ms: 60_000,
            max_requests,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_within_window() {
        let limiter = service(2);
        assert_eq!(
            limiter.check_rate_limit("1.2.3.4").await,
            RateLimitResult::Allowed { remaining: 1, reset_after_ms: 60_000 }
        );
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            limiter.check_rate_limit("1.2.3.4").await,
            RateLimitResult::Allowed { remaining: 0, reset_after_ms: 55_000 }
        );

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            limiter.check_rate_limit("1.2.3.4").await,
            RateLimitResult::Limited { retry_after_ms: 45_000 }
        );

        // 其他客户端不受影响
        assert!(matches!(
            limiter.check_rate_limit("5.6.7.8").await,
            RateLimitResult::Allowed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets() {
        let limiter = service(1);
        limiter.check_rate_limit("a").await;
        assert!(matches!(limiter.check_rate_limit("a").await, RateLimitResult::Limited { .. }));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(matches!(limiter.check_rate_limit("a").await, RateLimitResult::Allowed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_stale_windows() {
        let limiter = service(5);
        limiter.check_rate_limit("old").await;
        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.check_rate_limit("new").await;
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(limiter.cleanup_expired_records().await, 1);
        assert_eq!(limiter.records.read().await.len(), 1);
    }
}
