//! 请求指标收集
//!
//! 每个请求在进入时创建一个 [`RequestMetrics`]，处理过程中标记首个片段、缓存命中等，
//! 响应结束（正常完成、出错或客户端断开）时生成一条 [`MetricsEntry`] 追加到有界环形缓冲。
//! 可选地把同一条记录追加到持久化日志文件（JSON Lines），写入失败只记录警告。

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache_key;
use crate::shared::constants::metrics::UNKNOWN_PROMPT_VERSION;
use crate::shared::types::UserContext;

/// 单个请求的指标记录，追加后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEntry {
    pub endpoint: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_token_latency_ms: Option<u64>,
    pub total_response_time_ms: u64,
    pub prompt_version: String,
    pub cache_hit: bool,
    pub status_code: u16,
    pub user_context_hash: String,
}

/// 上下文指纹：bmi、goalType、streak 三个字段的缓存键
pub fn context_fingerprint(ctx: Option<&UserContext>) -> String {
    match ctx {
        Some(ctx) => cache_key!(ctx.bmi, ctx.goal_type_str(), ctx.streak),
        None => cache_key!(None::<f64>, None::<&str>, None::<u32>),
    }
}

/// 进行中请求的计时与标记
///
/// 通过 `Arc` 在中间件与处理器之间共享，所有标记方法都只需要 `&self`
#[derive(Debug)]
pub struct RequestMetrics {
    endpoint: String,
    started_at: Instant,
    first_fragment_at: OnceLock<Instant>,
    cache_hit: AtomicBool,
    prompt_version: OnceLock<String>,
    context_fingerprint: OnceLock<String>,
}

impl RequestMetrics {
    pub fn start(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            started_at: Instant::now(),
            first_fragment_at: OnceLock::new(),
            cache_hit: AtomicBool::new(false),
            prompt_version: OnceLock::new(),
            context_fingerprint: OnceLock::new(),
        }
    }

    /// 记录首个片段的发送时间，只有第一次调用生效
    pub fn mark_first_fragment(&self) {
        let _ = self.first_fragment_at.set(Instant::now());
    }

    pub fn mark_cache_hit(&self) {
        self.cache_hit.store(true, Ordering::Relaxed);
    }

    pub fn is_cache_hit(&self) -> bool {
        self.cache_hit.load(Ordering::Relaxed)
    }

    pub fn set_prompt_version(&self, version: &str) {
        let _ = self.prompt_version.set(version.to_string());
    }

    pub fn set_context(&self, ctx: &UserContext) {
        let _ = self.context_fingerprint.set(context_fingerprint(Some(ctx)));
    }

    pub fn first_fragment_latency_ms(&self) -> Option<u64> {
        self.first_fragment_at
            .get()
            .map(|at| at.duration_since(self.started_at).as_millis() as u64)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// 生成最终记录
    pub fn finish(&self, status_code: u16) -> MetricsEntry {
        MetricsEntry {
            endpoint: self.endpoint.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            first_token_latency_ms: self.first_fragment_latency_ms(),
            total_response_time_ms: self.elapsed_ms(),
            prompt_version: self
                .prompt_version
                .get()
                .cloned()
                .unwrap_or_else(|| UNKNOWN_PROMPT_VERSION.to_string()),
            cache_hit: self.is_cache_hit(),
            status_code,
            user_context_hash: self
                .context_fingerprint
                .get()
                .cloned()
                .unwrap_or_else(|| context_fingerprint(None)),
        }
    }
}

/// 指标读取结果（缓冲区的副本）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total: usize,
    pub metrics: Vec<MetricsEntry>,
}

/// 有界指标收集器
#[derive(Debug)]
pub struct MetricsCollector {
    capacity: usize,
    entries: Mutex<VecDeque<MetricsEntry>>,
    durable_log: Option<mpsc::UnboundedSender<MetricsEntry>>,
}

pub type SharedMetricsCollector = Arc<MetricsCollector>;

impl MetricsCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            durable_log: None,
        }
    }

    /// 启用持久化日志，写入在后台任务中进行
    ///
    /// 必须在 tokio 运行时内调用
    pub fn with_durable_log(mut self, path: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_log_writer(path.into(), rx));
        self.durable_log = Some(tx);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 追加一条记录，超出容量时淘汰最旧的
    ///
    /// 同步方法，可以在 `Drop` 中调用
    pub fn record(&self, entry: MetricsEntry) {
        if let Some(tx) = &self.durable_log {
            if tx.send(entry.clone()).is_err() {
                debug!("指标日志写入任务已退出，跳过持久化");
            }
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 返回最近 `limit` 条记录的副本（按时间顺序），`None` 表示全部
    pub fn snapshot(&self, limit: Option<usize>) -> MetricsSnapshot {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let total = entries.len();
        let skip = limit.map_or(0, |n| total.saturating_sub(n));
        MetricsSnapshot {
            total,
            metrics: entries.iter().skip(skip).cloned().collect(),
        }
    }
}

async fn open_log(path: &PathBuf) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

/// 持久化日志写入任务；发送端全部释放后退出
async fn run_log_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<MetricsEntry>) {
    let mut file: Option<File> = None;

    while let Some(entry) = rx.recv().await {
        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("⚠️ 序列化指标记录失败: {}", e);
                continue;
            }
        };
        line.push('\n');

        if file.is_none() {
            match open_log(&path).await {
                Ok(f) => file = Some(f),
                Err(e) => {
                    warn!("⚠️ 打开指标日志 {} 失败: {}", path.display(), e);
                    continue;
                }
            }
        }

        if let Some(f) = file.as_mut() {
            let written = match f.write_all(line.as_bytes()).await {
                Ok(()) => f.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!("⚠️ 写入指标日志失败: {}", e);
                // 下次重新打开
                file = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(endpoint: &str, status_code: u16) -> MetricsEntry {
        MetricsEntry {
            endpoint: endpoint.to_string(),
            timestamp: "2025-01-01T00:00:00.000Z".to_string(),
            first_token_latency_ms: None,
            total_response_time_ms: 5,
            prompt_version: "v1".to_string(),
            cache_hit: false,
            status_code,
            user_context_hash: "cache_0".to_string(),
        }
    }

    #[test]
    fn test_ring_evicts_oldest_beyond_capacity() {
        let collector = MetricsCollector::new(1000);
        for i in 0..1001 {
            collector.record(entry(&format!("/req/{}", i), 200));
        }

        let snapshot = collector.snapshot(None);
        assert_eq!(snapshot.total, 1000);
        assert_eq!(snapshot.metrics.first().unwrap().endpoint, "/req/1");
        assert_eq!(snapshot.metrics.last().unwrap().endpoint, "/req/1000");
    }

    #[test]
    fn test_snapshot_limit_returns_most_recent_in_order() {
        let collector = MetricsCollector::new(10);
        for i in 0..5 {
            collector.record(entry(&format!("/req/{}", i), 200));
        }

        let snapshot = collector.snapshot(Some(2));
        assert_eq!(snapshot.total, 5);
        let endpoints: Vec<_> = snapshot.metrics.iter().map(|e| e.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["/req/3", "/req/4"]);

        assert_eq!(collector.snapshot(Some(50)).metrics.len(), 5);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let collector = MetricsCollector::new(10);
        collector.record(entry("/a", 200));

        let mut snapshot = collector.snapshot(None);
        snapshot.metrics.clear();
        collector.record(entry("/b", 500));

        assert!(snapshot.metrics.is_empty());
        assert_eq!(collector.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fragment_mark_is_idempotent() {
        let metrics = RequestMetrics::start("/api/ai/chat/stream");
        tokio::time::advance(Duration::from_millis(120)).await;
        metrics.mark_first_fragment();
        tokio::time::advance(Duration::from_millis(300)).await;
        metrics.mark_first_fragment();

        let finished = metrics.finish(200);
        assert_eq!(finished.first_token_latency_ms, Some(120));
        assert_eq!(finished.total_response_time_ms, 420);
    }

    #[test]
    fn test_finish_defaults() {
        let metrics = RequestMetrics::start("/health");
        let finished = metrics.finish(200);
        assert_eq!(finished.prompt_version, "unknown");
        assert!(!finished.cache_hit);
        assert_eq!(finished.first_token_latency_ms, None);
        assert_eq!(finished.user_context_hash, context_fingerprint(None));

        let json = serde_json::to_value(&finished).unwrap();
        assert!(json.get("firstTokenLatencyMs").is_none());
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["cacheHit"], false);
    }

    #[test]
    fn test_fingerprint_tracks_context_fields() {
        let metrics = RequestMetrics::start("/api/ai/workout-plan");
        let ctx = UserContext {
            bmi: Some(24.0),
            streak: 3,
            ..Default::default()
        };
        metrics.set_context(&ctx);
        metrics.mark_cache_hit();
        metrics.set_prompt_version("v1");

        let finished = metrics.finish(200);
        assert_eq!(finished.user_context_hash, cache_key!(24.0_f64, None::<&str>, 3u32));
        assert!(finished.cache_hit);
        assert_eq!(finished.prompt_version, "v1");
    }

    #[tokio::test]
    async fn test_durable_log_appends_json_lines() {
        let path = std::env::temp_dir()
            .join(format!("metrics-{}", uuid::Uuid::new_v4()))
            .join("metrics.jsonl");
        let collector = MetricsCollector::new(10).with_durable_log(path.clone());
        collector.record(entry("/a", 200));
        collector.record(entry("/b", 429));

        let mut contents = String::new();
        for _ in 0..50 {
            contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            if contents.lines().count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let lines: Vec<MetricsEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, vec![entry("/a", 200), entry("/b", 429)]);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_durable_log_failure_does_not_affect_record() {
        // 目标路径是一个已存在的文件的子路径，打开必然失败
        let blocker = std::env::temp_dir().join(format!("metrics-blocker-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let collector = MetricsCollector::new(10).with_durable_log(blocker.join("metrics.jsonl"));
        collector.record(entry("/a", 200));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(collector.len(), 1);
        let _ = tokio::fs::remove_file(&blocker).await;
    }
}
