//! 对话处理器

use axum::{
    extract::State,
    response::{Json, Response},
    Extension,
};
use std::sync::Arc;
use tracing::instrument;

use crate::business::domain::{Capability, CoachingPayload};
use crate::business::services::{CoachingTask, RequestMetrics};
use crate::presentation::dto::coaching as dto;
use crate::presentation::routes::AppState;
use crate::shared::{AppError, AppResult};
use super::coaching::sse_response;

/// 流式对话
#[instrument(skip(state, metrics, body))]
pub async fn chat_stream(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Response> {
    let body = dto::parse_body(&body)?;
    let message = dto::require_message(&body)?;
    let context = dto::optional_user_context(&body)?;
    metrics.set_context(&context);

    let task = CoachingTask::new(Capability::Chat, &context).with_subject(&message);
    sse_response(state.coaching.stream(&task, metrics))
}

/// 旧版客户端的整段对话接口，返回 `{reply}`
#[instrument(skip(state, metrics, body))]
pub async fn legacy_fitness_chat(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<CoachingPayload>> {
    let body = dto::parse_body(&body)?;
    let message = dto::require_message(&body)?;
    let context = dto::legacy_user_context(&body);

    let task = CoachingTask::new(Capability::Chat, &context).with_subject(&message);
    state
        .coaching
        .run_buffered(&task, &metrics)
        .await
        .map(Json)
        .map_err(|e| AppError::generation(Capability::Chat.failure_message(), e))
}
