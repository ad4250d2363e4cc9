//! 教练接口请求体解析与校验
//!
//! 请求体先按通用JSON解析，再逐字段校验并补全默认值，
//! 这样错误消息可以和客户端约定的一致，而不是 serde 的原始报错。

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::shared::{AppError, AppResult, UserContext};

pub const INVALID_CONTEXT_MESSAGE: &str = "Missing or invalid userContext in request body";
pub const MISSING_MESSAGE: &str = "Missing or empty message in request body";
pub const MISSING_EXERCISE_MESSAGE: &str = "Exercise name is required";

fn context_hint() -> Value {
    json!({
        "userContext": {
            "streak": "number",
            "completedWorkouts": "number"
        }
    })
}

/// 解析请求体；空请求体视为空对象
pub fn parse_body(body: &str) -> AppResult<Map<String, Value>> {
    if body.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(AppError::validation("Request body must be a JSON object")),
        Err(e) => Err(AppError::validation(format!("Invalid JSON in request body: {}", e))),
    }
}

/// 必须提供 `userContext` 对象；缺失的计数字段取 0，集合取空
pub fn require_user_context(body: &Map<String, Value>) -> AppResult<UserContext> {
    let invalid = || AppError::Validation {
        message: INVALID_CONTEXT_MESSAGE.to_string(),
        required: Some(context_hint()),
    };

    match body.get("userContext") {
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone()).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// 可选的 `userContext`：缺失或不是对象时使用全默认值
pub fn optional_user_context(body: &Map<String, Value>) -> AppResult<UserContext> {
    match body.get("userContext") {
        Some(Value::Object(_)) => require_user_context(body),
        _ => Ok(UserContext::default()),
    }
}

fn non_empty_string(body: &Map<String, Value>, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// 对话消息：必须是非空字符串
pub fn require_message(body: &Map<String, Value>) -> AppResult<String> {
    non_empty_string(body, "message").ok_or_else(|| AppError::validation(MISSING_MESSAGE))
}

/// 教学动作名
pub fn require_exercise_name(body: &Map<String, Value>) -> AppResult<String> {
    non_empty_string(body, "exerciseName").ok_or_else(|| AppError::validation(MISSING_EXERCISE_MESSAGE))
}

/// 旧版客户端的用户数据格式
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegacyUserData {
    pub streak: Option<u32>,
    pub completed_workouts: Option<u32>,
    pub goal: Option<String>,
    /// 旧客户端以字符串发送，例如 "30" 或 "30 minutes"
    pub available_time: Option<Value>,
    pub favorite_exercises: Option<Vec<String>>,
}

impl LegacyUserData {
    pub fn into_context(self) -> UserContext {
        UserContext {
            streak: self.streak.unwrap_or_default(),
            completed_workouts: self.completed_workouts.unwrap_or_default(),
            goal: self.goal,
            available_time: self.available_time.as_ref().and_then(parse_minutes),
            preferred_exercises: self.favorite_exercises.unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// 旧版 `userData`；格式不对时按空数据处理
pub fn legacy_user_context(body: &Map<String, Value>) -> UserContext {
    body.get("userData")
        .cloned()
        .and_then(|value| serde_json::from_value::<LegacyUserData>(value).ok())
        .unwrap_or_default()
        .into_context()
}

/// 取字符串开头的整数部分（"45 min" -> 45）
fn parse_minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let digits: String = s.trim_start().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
