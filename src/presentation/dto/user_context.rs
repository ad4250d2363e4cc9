//! 用户上下文存储接口数据传输对象

use serde::{Deserialize, Serialize};

use crate::shared::UserContext;

/// 查询参数
#[derive(Debug, Deserialize)]
pub struct UserContextQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// 查询响应；未找到时 `user_context` 为 null 并附带消息
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContextResponse {
    pub user_context: Option<UserContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl UserContextResponse {
    pub fn found(context: UserContext) -> Self {
        Self {
            user_context: Some(context),
            message: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            user_context: None,
            message: Some("No context found"),
        }
    }
}

/// 保存响应
#[derive(Debug, Serialize)]
pub struct SaveContextResponse {
    pub success: bool,
    pub message: &'static str,
}
