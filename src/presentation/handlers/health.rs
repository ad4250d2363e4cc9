//! 健康检查与指标查询处理器

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::business::services::MetricsSnapshot;
use crate::presentation::routes::AppState;
use crate::shared::constants::metrics::DEFAULT_READ_LIMIT;

/// 健康状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub cache_size: usize,
    /// 进程运行秒数
    pub uptime: f64,
    pub provider: String,
}

/// 指标查询参数
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub limit: Option<usize>,
}

/// 基础健康检查
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: format!("Fitness AI Gateway v{} is running", env!("CARGO_PKG_VERSION")),
        cache_size: state.coaching.cache().size().await,
        uptime: state.started_at.elapsed().as_secs_f64(),
        provider: state.coaching.providers().active_name().await,
    })
}

/// 最近的请求指标
#[instrument(skip(state))]
pub async fn get_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Json<MetricsSnapshot> {
    let limit = query.limit.unwrap_or(DEFAULT_READ_LIMIT);
    Json(state.metrics.snapshot(Some(limit)))
}
