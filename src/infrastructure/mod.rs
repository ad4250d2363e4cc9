//! 基础设施层模块
//!
//! 负责配置管理、响应缓存、进程内存储等基础设施相关功能

pub mod config;
pub mod cache;
pub mod context_store;

// 重新导出常用类型
pub use config::Config;
pub use cache::{ResponseCache, SharedResponseCache};
pub use context_store::{SharedUserContextStore, UserContextStore};
