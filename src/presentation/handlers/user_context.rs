//! 用户上下文存储处理器

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::business::services::RequestMetrics;
use crate::presentation::dto::{self, SaveContextResponse, UserContextQuery, UserContextResponse};
use crate::presentation::routes::AppState;
use crate::shared::{AppError, AppResult, UserContext};

/// 保存用户上下文
#[instrument(skip(state, metrics, body))]
pub async fn save_user_context(
    State(state): State<AppState>,
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    body: String,
) -> AppResult<Json<SaveContextResponse>> {
    let body = dto::coaching::parse_body(&body)?;

    let user_id = body
        .get("userId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("Missing userId"))?
        .to_string();

    let context: UserContext = match body.get("userContext") {
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|_| AppError::validation("Missing userContext"))?,
        _ => return Err(AppError::validation("Missing userContext")),
    };
    metrics.set_context(&context);

    state.contexts.save(user_id.clone(), context).await;
    info!("💾 已保存用户上下文: {}", user_id);

    Ok(Json(SaveContextResponse {
        success: true,
        message: "Context saved",
    }))
}

/// 读取用户上下文
#[instrument(skip(state))]
pub async fn get_user_context(
    State(state): State<AppState>,
    Query(query): Query<UserContextQuery>,
) -> AppResult<Json<UserContextResponse>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("Missing userId query parameter"))?;

    let response = match state.contexts.get(&user_id).await {
        Some(context) => UserContextResponse::found(context),
        None => UserContextResponse::not_found(),
    };
    Ok(Json(response))
}
