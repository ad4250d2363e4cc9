//! 路由配置模块
//!
//! 组织和配置所有HTTP路由

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::business::domain::CoachingPayload;
use crate::business::services::{
    CoachingService, MetricsCollector, RateLimitService, SharedCoachingService, SharedMetricsCollector,
    SharedProviderRegistry, SharedRateLimitService,
};
use crate::infrastructure::{Config, ResponseCache, SharedResponseCache, SharedUserContextStore, UserContextStore};
use crate::presentation::handlers;
use crate::presentation::middleware::{rate_limit_middleware, request_metrics_middleware};
use crate::shared::constants::rate_limit::CLEANUP_INTERVAL_SECONDS;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub coaching: SharedCoachingService,
    pub metrics: SharedMetricsCollector,
    pub contexts: SharedUserContextStore,
    pub rate_limiter: SharedRateLimitService,
    pub started_at: Instant,
}

impl AppState {
    /// 按配置组装所有进程级服务
    ///
    /// 启用持久化指标日志时会启动写入任务，必须在 tokio 运行时内调用
    pub fn new(config: &Config, providers: SharedProviderRegistry) -> Self {
        let cache: SharedResponseCache<CoachingPayload> =
            Arc::new(ResponseCache::from_config(&config.cache.to_cache_config()));

        let mut metrics = MetricsCollector::new(config.metrics.capacity);
        if config.metrics.log_to_file {
            info!("📝 指标日志写入: {}", config.metrics.log_path.display());
            metrics = metrics.with_durable_log(config.metrics.log_path.clone());
        }

        Self {
            coaching: Arc::new(CoachingService::new(cache, providers, &config.generation)),
            metrics: Arc::new(metrics),
            contexts: Arc::new(UserContextStore::new()),
            rate_limiter: Arc::new(RateLimitService::new(&config.rate_limit)),
            started_at: Instant::now(),
        }
    }

    /// 启动缓存清扫与限流记录清理任务
    pub fn spawn_background_tasks(&self, config: &Config) -> Vec<JoinHandle<()>> {
        vec![
            self.coaching
                .cache()
                .spawn_sweeper(config.cache.to_cache_config().sweep_interval),
            self.rate_limiter
                .spawn_cleanup(Duration::from_secs(CLEANUP_INTERVAL_SECONDS)),
        ]
    }
}

/// 创建应用路由
pub fn create_routes(state: AppState) -> Router {
    // AI 能力路由
    let ai_routes = Router::new()
        .route("/workout-plan", post(handlers::coaching::workout_plan))
        .route("/workout-plan/stream", post(handlers::coaching::workout_plan_stream))
        .route("/progress-analysis", post(handlers::coaching::progress_analysis))
        .route("/personalized-recommendations", post(handlers::coaching::recommendations))
        .route("/teach-me", post(handlers::coaching::teach_me))
        .route("/chat/stream", post(handlers::chat::chat_stream))
        // 旧版客户端兼容
        .route("/fitness", post(handlers::chat::legacy_fitness_chat));

    // 用户上下文路由
    let user_routes = Router::new().route(
        "/context",
        post(handlers::user_context::save_user_context).get(handlers::user_context::get_user_context),
    );

    // /api 下的路由统一限流
    let api_routes = Router::new()
        .nest("/ai", ai_routes)
        .nest("/user", user_routes)
        .route("/metrics", get(handlers::health::get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    // 公开路由
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), request_metrics_middleware))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
