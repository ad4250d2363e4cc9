//! 业务逻辑层模块
//! 
//! 包含领域模型（各能力的响应结构）和业务服务（生成、编排、指标、限流）

pub mod domain;
pub mod services;

// 重新导出常用类型
pub use domain::*;
pub use services::*;
