//! 统一错误处理模块
//!
//! 定义请求边界上的错误类型，所有单请求错误都在这里转换成HTTP响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::business::services::coaching_service::GenerationError;

/// 应用程序统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求字段缺失或格式错误
    #[error("{message}")]
    Validation {
        message: String,
        required: Option<serde_json::Value>,
    },

    /// 超出速率限制
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after_ms: u64 },

    /// 生成失败（上游错误、超时、输出无法解析）
    ///
    /// 对外只暴露 `message`，底层原因只写日志
    #[error("{message}")]
    Generation {
        message: &'static str,
        #[source]
        source: GenerationError,
    },

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            required: None,
        }
    }

    pub fn generation(message: &'static str, source: GenerationError) -> Self {
        AppError::Generation { message, source }
    }

    /// 获取HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Generation { .. } => "GENERATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 客户端可见的错误消息
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_code = self.error_code();

        match &self {
            AppError::Generation { message, source } => {
                tracing::error!(
                    status = ?status_code,
                    error_code = error_code,
                    cause = %source,
                    "{}", message
                );
            }
            AppError::Validation { .. } | AppError::RateLimited { .. } => {
                tracing::warn!(status = ?status_code, error_code = error_code, error = %self, "请求被拒绝");
            }
            _ => {
                tracing::error!(status = ?status_code, error_code = error_code, error = %self, "处理请求时发生错误");
            }
        }

        let mut body = json!({
            "error": self.public_message(),
            "code": error_code,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        match self {
            AppError::Validation { required: Some(required), .. } => {
                body["required"] = required;
            }
            AppError::RateLimited { retry_after_ms } => {
                body["retryAfterMs"] = json!(retry_after_ms);
            }
            _ => {}
        }

        (status_code, Json(body)).into_response()
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::services::provider::ProviderError;

    #[test]
    fn test_generation_error_hides_cause() {
        let err = AppError::generation(
            "Failed to generate workout plan",
            GenerationError::Provider(ProviderError::Upstream {
                status: 503,
                message: "backend overloaded".to_string(),
            }),
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Failed to generate workout plan");
        assert!(!err.public_message().contains("overloaded"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("Missing userId").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RateLimited { retry_after_ms: 1000 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::Internal("boom".to_string()).public_message(), "Internal server error");
    }
}
