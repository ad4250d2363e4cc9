//! Fitness AI Gateway 服务
//! 
//! 把用户健身上下文转换成 AI 生成的教练内容，带响应缓存、请求指标和流式输出，基于三层架构设计

// 核心模块
pub mod shared;          // 共享模块（错误处理、类型定义、常量）
pub mod infrastructure;  // 基础设施层（配置、响应缓存、上下文存储）
pub mod business;        // 业务逻辑层（领域模型、生成服务、编排、指标）
pub mod presentation;    // 表示层（HTTP处理、路由、中间件）

// 重新导出核心类型
pub use infrastructure::Config;
pub use shared::{AppError, AppResult};
pub use presentation::routes::{create_routes, AppState};
