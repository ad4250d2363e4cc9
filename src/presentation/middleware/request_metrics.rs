//! 请求指标中间件
//!
//! 请求进入时把 [`RequestMetrics`] 放入扩展供处理器标记；
//! 响应体被包装，响应体被释放时（发送完毕、流结束或客户端断开）才生成记录。
//! 所有退出路径（命中、未命中、错误、限流）都会留下恰好一条记录。

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::info;

use crate::business::services::metrics::{RequestMetrics, SharedMetricsCollector};
use crate::presentation::routes::AppState;

/// 响应结束时记录指标
struct CompletionGuard {
    collector: SharedMetricsCollector,
    metrics: Arc<RequestMetrics>,
    method: Method,
    status: u16,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let entry = self.metrics.finish(self.status);
        info!(
            "{} {} → {} ({}ms{})",
            self.method,
            entry.endpoint,
            entry.status_code,
            entry.total_response_time_ms,
            if entry.cache_hit { ", CACHED" } else { "" }
        );
        self.collector.record(entry);
    }
}

pub async fn request_metrics_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let metrics = Arc::new(RequestMetrics::start(request.uri().path()));
    request.extensions_mut().insert(Arc::clone(&metrics));

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    let guard = CompletionGuard {
        collector: Arc::clone(&state.metrics),
        metrics,
        method,
        status: parts.status.as_u16(),
    };

    Response::from_parts(parts, Body::new(GuardedBody { inner: body, _guard: guard }))
}

/// 持有 guard 的响应体，原样转发帧与长度提示
struct GuardedBody {
    inner: Body,
    _guard: CompletionGuard,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }
}
