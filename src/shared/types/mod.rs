//! 共享类型定义
//!
//! 用户健身上下文。由表示层校验和补全默认值后构造，之后在一次请求内只读。

use serde::{de, Deserialize, Deserializer, Serialize};

/// 健身目标类型
///
/// 客户端可能发送新的目标值，未知值原样保留并参与缓存键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    FatLoss,
    MuscleGain,
    Maintenance,
    #[serde(untagged)]
    Other(String),
}

impl GoalType {
    pub fn as_str(&self) -> &str {
        match self {
            GoalType::FatLoss => "fat_loss",
            GoalType::MuscleGain => "muscle_gain",
            GoalType::Maintenance => "maintenance",
            GoalType::Other(value) => value,
        }
    }
}

/// 数据库中可用的动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableExercise {
    pub name: String,
    #[serde(rename = "type")]
    pub exercise_type: String,
    pub muscle: String,
    pub difficulty: String,
}

/// 训练历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutHistoryEntry {
    pub date: String,
    pub exercise_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,
    pub completed: bool,
}

/// 用户健身上下文
///
/// 可选字段缺失与零值/空值语义不同：缺失的字段在缓存键中序列化为空串。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<GoalType>,
    #[serde(deserialize_with = "count_or_default")]
    pub streak: u32,
    #[serde(deserialize_with = "count_or_default")]
    pub completed_workouts: u32,
    /// 每天可用时间（分钟）
    #[serde(deserialize_with = "optional_count", skip_serializing_if = "Option::is_none")]
    pub available_time: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub preferred_exercises: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub workout_history: Vec<WorkoutHistoryEntry>,
    #[serde(deserialize_with = "optional_count", skip_serializing_if = "Option::is_none")]
    pub missed_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_workout_date: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub available_exercises: Vec<AvailableExercise>,
}

impl UserContext {
    pub fn goal_type_str(&self) -> Option<&str> {
        self.goal_type.as_ref().map(GoalType::as_str)
    }
}

/// JSON 中的计数：整数，或者值为整数的浮点数（`3.0`）
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Integer(u64),
    Float(f64),
}

impl RawCount {
    fn into_u32<E: de::Error>(self) -> Result<u32, E> {
        let value = match self {
            RawCount::Integer(value) => value,
            RawCount::Float(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
                value as u64
            }
            RawCount::Float(value) => {
                return Err(E::custom(format!("expected a non-negative whole number, found {}", value)))
            }
        };
        u32::try_from(value).map_err(|_| E::custom(format!("count out of range: {}", value)))
    }
}

/// 必填计数
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    RawCount::deserialize(deserializer)?.into_u32()
}

/// 缺失或 `null` 时为 0
fn count_or_default<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawCount>::deserialize(deserializer)?.map_or(Ok(0), RawCount::into_u32)
}

fn optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawCount>::deserialize(deserializer)?
        .map(RawCount::into_u32)
        .transpose()
}

/// 显式的 `null` 与缺失字段一样取默认值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
