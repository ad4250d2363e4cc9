//! 业务服务模块
//! 
//! 实现核心业务逻辑和服务编排

pub mod coaching_service;
pub mod metrics;
pub mod prompt_service;
pub mod provider;
pub mod rate_limit_service;

// 重新导出常用类型
pub use coaching_service::{CoachingService, CoachingTask, GenerationError, SharedCoachingService, SseFrame};
pub use metrics::{MetricsCollector, MetricsEntry, MetricsSnapshot, RequestMetrics, SharedMetricsCollector};
pub use provider::{GenerationProvider, ProviderError, ProviderRegistry, SharedProviderRegistry};
pub use rate_limit_service::{RateLimitResult, RateLimitService, SharedRateLimitService};
