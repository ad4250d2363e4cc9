//! 速率限制中间件
//!
//! 按客户端地址计数，只挂在 `/api` 路由上。
//! 放行和拒绝的响应都带 `RateLimit-*` 头，拒绝时另加 `Retry-After`。

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::business::services::RateLimitResult;
use crate::presentation::routes::AppState;
use crate::shared::AppError;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// 客户端标识：连接的对端IP，没有连接信息时（例如测试）归为同一个桶
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 毫秒向上取整到秒
fn ceil_seconds(ms: u64) -> u64 {
    ms.div_ceil(1000)
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after_ms: u64) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_seconds(reset_after_ms)));
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let limit = state.rate_limiter.limit();

    match state.rate_limiter.check_rate_limit(&client).await {
        RateLimitResult::Allowed { remaining, reset_after_ms } => {
            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), limit, remaining, reset_after_ms);
            response
        }
        RateLimitResult::Limited { retry_after_ms } => {
            let mut response = AppError::RateLimited { retry_after_ms }.into_response();
            let headers = response.headers_mut();
            set_rate_limit_headers(headers, limit, 0, retry_after_ms);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_seconds(retry_after_ms)));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_round_reset_up_to_seconds() {
        let mut headers = HeaderMap::new();
        set_rate_limit_headers(&mut headers, 30, 12, 45_001);
        assert_eq!(headers[RATELIMIT_LIMIT], "30");
        assert_eq!(headers[RATELIMIT_REMAINING], "12");
        assert_eq!(headers[RATELIMIT_RESET], "46");

        set_rate_limit_headers(&mut headers, 30, 0, 0);
        assert_eq!(headers[RATELIMIT_RESET], "0");
    }
}
