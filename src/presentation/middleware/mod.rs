//! HTTP中间件模块

pub mod rate_limit;
pub mod request_metrics;

pub use rate_limit::rate_limit_middleware;
pub use request_metrics::request_metrics_middleware;
