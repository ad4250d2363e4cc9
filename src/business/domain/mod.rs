//! 业务领域模型
//!
//! 各能力的结构化响应。生成的文本在边界处按能力对应的结构解码，
//! 缓存中保存的是带标签的 [`CoachingPayload`]，而不是无类型的 JSON。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::types::count;

/// 教练能力（端点）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    WorkoutPlan,
    ProgressAnalysis,
    Recommendations,
    TeachMe,
    Chat,
}

impl Capability {
    /// 缓存键中的能力区分符
    pub fn discriminator(&self) -> &'static str {
        match self {
            Capability::WorkoutPlan => "workout-plan",
            Capability::ProgressAnalysis => "progress",
            Capability::Recommendations => "recommendations",
            Capability::TeachMe => "teach-me",
            Capability::Chat => "chat",
        }
    }

    /// 生成失败时返回给客户端的通用消息
    pub fn failure_message(&self) -> &'static str {
        match self {
            Capability::WorkoutPlan => "Failed to generate workout plan",
            Capability::ProgressAnalysis => "Failed to analyze progress",
            Capability::Recommendations => "Failed to get recommendations",
            Capability::TeachMe => "Failed to generate teach me guidance",
            Capability::Chat => "Failed to process AI request",
        }
    }

    /// 按能力对应的结构解码生成结果
    pub fn decode(&self, value: Value) -> Result<CoachingPayload, serde_json::Error> {
        Ok(match self {
            Capability::WorkoutPlan => CoachingPayload::WorkoutPlan(serde_json::from_value(value)?),
            Capability::ProgressAnalysis => {
                CoachingPayload::ProgressAnalysis(serde_json::from_value(value)?)
            }
            Capability::Recommendations => {
                CoachingPayload::Recommendations(serde_json::from_value(value)?)
            }
            Capability::TeachMe => CoachingPayload::TeachMe(serde_json::from_value(value)?),
            Capability::Chat => CoachingPayload::Chat(serde_json::from_value(value)?),
        })
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.discriminator())
    }
}

/// 计划中的单个动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedExercise {
    pub name: String,
    #[serde(rename = "type")]
    pub exercise_type: String,
    #[serde(deserialize_with = "count")]
    pub sets: u32,
    #[serde(deserialize_with = "count")]
    pub reps: u32,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "count")]
    pub rest_between_sets: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 一天的训练安排
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: String,
    pub is_rest_day: bool,
    #[serde(default)]
    pub exercises: Vec<PlannedExercise>,
    pub total_duration: f64,
    pub estimated_calories: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityAdjustment {
    Increase,
    Maintain,
    Decrease,
}

/// 7天训练计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlanResponse {
    pub weekly_plan: Vec<DayPlan>,
    pub intensity_level: IntensityLevel,
    pub rest_days: Vec<String>,
    pub coaching_message: String,
    pub estimated_calories: f64,
    pub prompt_version: String,
}

/// 周进度分析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAnalysisResponse {
    pub summary: String,
    pub consistency_score: f64,
    pub trends: Vec<String>,
    pub recommendations: Vec<String>,
    pub coaching_message: String,
    pub prompt_version: String,
}

/// 个性化建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub rest_day_suggestion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_day_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_workout: Option<Vec<PlannedExercise>>,
    pub motivation_message: String,
    pub intensity_adjustment: IntensityAdjustment,
    pub coaching_message: String,
    pub prompt_version: String,
}

/// 动作教学
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeachMeResponse {
    pub form_explanation: Vec<String>,
    pub common_mistakes: Vec<String>,
    pub muscles_worked: Vec<String>,
    pub beginner_tips: Vec<String>,
    pub safety_cues: Vec<String>,
    pub prompt_version: String,
}

/// 对话回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub prompt_version: String,
}

/// 缓存与响应中流转的负载
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CoachingPayload {
    WorkoutPlan(WorkoutPlanResponse),
    ProgressAnalysis(ProgressAnalysisResponse),
    Recommendations(RecommendationsResponse),
    TeachMe(TeachMeResponse),
    Chat(ChatReply),
}

impl CoachingPayload {
    pub fn capability(&self) -> Capability {
        match self {
            CoachingPayload::WorkoutPlan(_) => Capability::WorkoutPlan,
            CoachingPayload::ProgressAnalysis(_) => Capability::ProgressAnalysis,
            CoachingPayload::Recommendations(_) => Capability::Recommendations,
            CoachingPayload::TeachMe(_) => Capability::TeachMe,
            CoachingPayload::Chat(_) => Capability::Chat,
        }
    }

    /// 生成该负载的提示词版本
    pub fn prompt_version(&self) -> &str {
        match self {
            CoachingPayload::WorkoutPlan(p) => &p.prompt_version,
            CoachingPayload::ProgressAnalysis(p) => &p.prompt_version,
            CoachingPayload::Recommendations(p) => &p.prompt_version,
            CoachingPayload::TeachMe(p) => &p.prompt_version,
            CoachingPayload::Chat(p) => &p.prompt_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_teach_me() {
        let value = json!({
            "form_explanation": ["Step 1"],
            "common_mistakes": [],
            "muscles_worked": ["Primary: Quads"],
            "beginner_tips": [],
            "safety_cues": ["Keep knees over toes"],
            "prompt_version": "v1"
        });
        let payload = Capability::TeachMe.decode(value).unwrap();
        assert_eq!(payload.capability(), Capability::TeachMe);
        assert_eq!(payload.prompt_version(), "v1");
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let value = json!({"summary": "ok", "prompt_version": "v1"});
        assert!(Capability::ProgressAnalysis.decode(value).is_err());
    }

    #[test]
    fn test_recommendations_optional_fields() {
        let value = json!({
            "rest_day_suggestion": false,
            "motivation_message": "Go",
            "intensity_adjustment": "maintain",
            "coaching_message": "Steady",
            "prompt_version": "v1"
        });
        let payload = Capability::Recommendations.decode(value).unwrap();
        let out = serde_json::to_value(&payload).unwrap();
        assert!(out.get("rest_day_reason").is_none());
        assert_eq!(out["intensity_adjustment"], "maintain");
    }

    #[test]
    fn test_workout_plan_round_trips_camel_case_days() {
        let value = json!({
            "weekly_plan": [{
                "day": "Monday",
                "isRestDay": false,
                "exercises": [{
                    "name": "Push-ups", "type": "strength", "sets": 3, "reps": 15,
                    "duration": null, "restBetweenSets": 60, "notes": "Keep core engaged"
                }],
                "totalDuration": 45,
                "estimatedCalories": 300
            }],
            "intensity_level": "beginner",
            "rest_days": ["Sunday"],
            "coaching_message": "You got this",
            "estimated_calories": 2100,
            "prompt_version": "v1"
        });
        let payload = Capability::WorkoutPlan.decode(value).unwrap();
        let out = serde_json::to_value(&payload).unwrap();
        assert_eq!(out["weekly_plan"][0]["exercises"][0]["restBetweenSets"], 60);
        assert_eq!(out["weekly_plan"][0]["isRestDay"], false);
    }

    #[test]
    fn test_planned_exercise_accepts_whole_float_counts() {
        let value = json!({
            "rest_day_suggestion": true,
            "rest_day_reason": "Recovery",
            "recovery_workout": [{
                "name": "Stretch", "type": "flexibility", "sets": 2.0, "reps": 1.0,
                "duration": 5, "restBetweenSets": 30.0
            }],
            "motivation_message": "Rest well",
            "intensity_adjustment": "decrease",
            "coaching_message": "Easy day",
            "prompt_version": "v1"
        });
        let payload = Capability::Recommendations.decode(value).unwrap();
        let out = serde_json::to_value(&payload).unwrap();
        assert_eq!(out["recovery_workout"][0]["reps"], 1);
        assert_eq!(out["recovery_workout"][0]["restBetweenSets"], 30);
    }
}
