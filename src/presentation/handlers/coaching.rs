//! 教练能力处理器
//!
//! 整段模式：训练计划、进度分析、个性化建议、动作教学
//! 流式模式：训练计划（SSE）

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{Json, Response},
    Extension,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::instrument;

use crate::business::domain::{Capability, CoachingPayload};
use crate::business::services::{CoachingTask, RequestMetrics, SseFrame};
use crate::presentation::dto::coaching as dto;
use crate::presentation::routes::AppState;
use crate::shared::{AppError, AppResult};

/// 把 SSE 帧序列包装成流式响应，每帧单独发送
pub(crate) fn sse_response<S>(frames: S) -> AppResult<Response>
where
    S: Stream<Item = SseFrame> + Send + 'static,
{
    let body = frames.map(|frame| Ok::<_, Infallible>(frame.encode()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(format!("构建流式响应失败: {}", e)))
}

/// 整段模式的公共流程
async fn run_buffered(
    state: &AppState,
    metrics: &RequestMetrics,
    capability: Capability,
    body: &str,
) -> AppResult<Json<CoachingPayload>> {
    let body = dto::parse_body(body)?;
    let context = dto::require_user_context(&body)?;
    metrics.set_context(&context);

    let exercise_name = match capability {
        Capability::TeachMe => Some(dto::require_exercise_name(&body)?),
        _ => None,
    };

    let mut task = CoachingTask::new(capability, &context);
    if let Some(name) = exercise_name.as_deref() {
        task = task.with_subject(name);
    }

    state
        .coaching
        .run_buffered(&task, metrics)
        .await
        .map(Json)
        .map_err(|e| AppError::generation(capability.failure_message(), e))
}

/// 生成7天训练计划
#[instrument(skip(state, metrics, body))]
pub async fn workout_plan(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<CoachingPayload>> {
    run_buffered(&state, &metrics, Capability::WorkoutPlan, &body).await
}

/// 周进度分析
#[instrument(skip(state, metrics, body))]
pub async fn progress_analysis(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<CoachingPayload>> {
    run_buffered(&state, &metrics, Capability::ProgressAnalysis, &body).await
}

/// 个性化建议
#[instrument(skip(state, metrics, body))]
pub async fn recommendations(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<CoachingPayload>> {
    run_buffered(&state, &metrics, Capability::Recommendations, &body).await
}

/// 动作教学
#[instrument(skip(state, metrics, body))]
pub async fn teach_me(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<CoachingPayload>> {
    run_buffered(&state, &metrics, Capability::TeachMe, &body).await
}

/// 流式训练计划，不写缓存
#[instrument(skip(state, metrics, body))]
pub async fn workout_plan_stream(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Response> {
    let body = dto::parse_body(&body)?;
    let context = dto::require_user_context(&body)?;
    metrics.set_context(&context);

    let task = CoachingTask::new(Capability::WorkoutPlan, &context);
    sse_response(state.coaching.stream(&task, metrics))
}
