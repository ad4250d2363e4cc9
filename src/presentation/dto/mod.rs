//! 数据传输对象模块

pub mod coaching;
pub mod user_context;

pub use user_context::{SaveContextResponse, UserContextQuery, UserContextResponse};
