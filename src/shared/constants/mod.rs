//! 常量定义模块

/// 提示词模板版本，写入每一个生成/缓存的响应
///
/// 修改任何提示词模板时必须同时提升该版本，旧缓存会因为键不同而自然失效
pub const PROMPT_VERSION: &str = "v1";

/// 缓存相关常量
pub mod cache {
    /// 缓存键命名空间前缀
    pub const KEY_PREFIX: &str = "cache_";
    /// 缓存键各部分之间的分隔符
    pub const KEY_SEPARATOR: &str = "|";
    pub const DEFAULT_TTL_MS: u64 = 600_000; // 10分钟
    pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 300_000; // 5分钟
}

/// 请求指标相关常量
pub mod metrics {
    pub const DEFAULT_CAPACITY: usize = 1000;
    pub const DEFAULT_READ_LIMIT: usize = 50;
    pub const DEFAULT_LOG_PATH: &str = "logs/metrics.jsonl";
    /// 请求未设置提示词版本时记录的值
    pub const UNKNOWN_PROMPT_VERSION: &str = "unknown";
}

/// 速率限制相关常量
pub mod rate_limit {
    pub const DEFAULT_WINDOW_MS: u64 = 60_000;
    pub const DEFAULT_MAX_REQUESTS: u32 = 30;
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 300;
}

/// 生成服务相关常量
pub mod generation {
    pub const DEFAULT_PROVIDER: &str = "gemini";
    pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
    pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
    pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECONDS: u64 = 30;
}

/// SSE 帧相关常量
pub mod sse {
    pub const DONE_SENTINEL: &str = "[DONE]";
    /// 流式失败时发给客户端的通用错误
    pub const STREAM_FAILED_MESSAGE: &str = "Stream failed";
}
