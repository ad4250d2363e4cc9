//! 提示词模板
//!
//! 模板随 [`PROMPT_VERSION`](crate::shared::constants::PROMPT_VERSION) 一起版本化，
//! 修改模板文本时需要同步提升版本号，否则旧缓存会与新模板混用。

use std::fmt::Display;

use crate::business::domain::Capability;
use crate::shared::types::UserContext;

/// 进度分析只展示最近的历史记录条数
const HISTORY_WINDOW: usize = 14;

const JSON_ONLY: &str = "## Required JSON Output Format\nRespond ONLY with valid JSON, no markdown or extra text:";

fn or_placeholder<T: Display>(value: Option<T>, placeholder: &str) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| placeholder.to_string())
}

/// 用户画像段落，所有模板共用
pub fn build_context_block(ctx: &UserContext) -> String {
    let goal_label = ctx
        .goal_type_str()
        .or(ctx.goal.as_deref())
        .unwrap_or("Not set");

    let preferred = if ctx.preferred_exercises.is_empty() {
        "None specified".to_string()
    } else {
        ctx.preferred_exercises.join(", ")
    };

    let mut block = format!(
        "## User Profile & Context\n\
         - BMI: {} ({})\n\
         - Fitness Goal: {}\n\
         - Current Goal: {}\n\
         - Streak: {} days\n\
         - Completed Workouts: {}\n\
         - Available Time Per Day: {} minutes\n\
         - Preferred Exercises: {}\n\
         - Days Since Last Workout: {}\n\
         - Last Workout Date: {}",
        or_placeholder(ctx.bmi, "Unknown"),
        ctx.bmi_category.as_deref().unwrap_or("Not calculated"),
        goal_label,
        ctx.goal.as_deref().unwrap_or("None"),
        ctx.streak,
        ctx.completed_workouts,
        or_placeholder(ctx.available_time, "Unknown"),
        preferred,
        or_placeholder(ctx.missed_days, "Unknown"),
        ctx.last_workout_date.as_deref().unwrap_or("Unknown"),
    );

    if !ctx.available_exercises.is_empty() {
        block.push_str("\n- Available Exercises from Database:");
        for e in &ctx.available_exercises {
            block.push_str(&format!(
                "\n  * {} ({}, {}, {})",
                e.name, e.exercise_type, e.muscle, e.difficulty
            ));
        }
    }

    block
}

pub fn build_workout_plan_prompt(ctx: &UserContext) -> String {
    format!(
        r#"You are an expert fitness coach AI. Generate a personalized 7-day workout plan.

{context}

## Instructions
1. Create a balanced 7-day plan with appropriate rest days based on the user's fitness level and goal.
2. Adjust intensity based on their streak and consistency.
3. If they have missed 3+ days, start with lighter recovery workouts.
4. Include estimated calories burned per day.
5. Provide a short motivational coaching message.
6. **IMPORTANT: Use exercise names EXACTLY as they appear in the "Available Exercises from Database" list above.** This ensures exercises link back to full instructions and details. If the list is empty, use common exercises.
7. Prioritize the user's preferred exercises when building the plan.

{json_only}
{{
  "weekly_plan": [
    {{
      "day": "Monday",
      "isRestDay": false,
      "exercises": [
        {{
          "name": "Push-ups",
          "type": "strength",
          "sets": 3,
          "reps": 15,
          "duration": null,
          "restBetweenSets": 60,
          "notes": "Keep core engaged"
        }}
      ],
      "totalDuration": 45,
      "estimatedCalories": 300
    }}
  ],
  "intensity_level": "beginner|intermediate|advanced",
  "rest_days": ["Wednesday", "Sunday"],
  "coaching_message": "Your motivational message here",
  "estimated_calories": 2100
}}"#,
        context = build_context_block(ctx),
        json_only = JSON_ONLY,
    )
}

pub fn build_progress_analysis_prompt(ctx: &UserContext) -> String {
    let history = if ctx.workout_history.is_empty() {
        "## Recent Workout History\nNo workout history available.".to_string()
    } else {
        let start = ctx.workout_history.len().saturating_sub(HISTORY_WINDOW);
        let lines: Vec<String> = ctx.workout_history[start..]
            .iter()
            .map(|w| {
                format!(
                    "- {}: {} ({}, {}min, {}cal)",
                    w.date,
                    w.exercise_name,
                    if w.completed { "Completed" } else { "Missed" },
                    or_placeholder(w.duration, "?"),
                    or_placeholder(w.calories_burned, "?"),
                )
            })
            .collect();
        format!("## Recent Workout History\n{}", lines.join("\n"))
    };

    format!(
        r#"You are an expert fitness coach AI. Analyze the user's weekly progress.

{context}

{history}

## Instructions
1. Calculate consistency score (0-100) based on completed vs planned workouts.
2. Identify positive and negative trends.
3. Provide actionable recommendations.
4. Write a short coaching message.

{json_only}
{{
  "summary": "Brief overview of the week",
  "consistency_score": 75,
  "trends": ["Improving upper body strength", "Cardio needs more attention"],
  "recommendations": ["Add 2 cardio sessions", "Increase push-up volume"],
  "coaching_message": "Keep pushing!"
}}"#,
        context = build_context_block(ctx),
        history = history,
        json_only = JSON_ONLY,
    )
}

pub fn build_recommendations_prompt(ctx: &UserContext) -> String {
    format!(
        r#"You are an expert fitness coach AI. Provide personalized recommendations.

{context}

## Instructions
1. Determine if the user should take a rest day based on their streak and recent activity.
2. If they've missed 3+ days, suggest a lighter recovery workout.
3. Adjust intensity recommendation based on consistency.
4. Write a short motivational message.

{json_only}
{{
  "rest_day_suggestion": false,
  "rest_day_reason": "Only if rest day is suggested",
  "recovery_workout": [
    {{
      "name": "Light Stretching",
      "type": "stretching",
      "sets": 1,
      "reps": 1,
      "duration": 10,
      "restBetweenSets": 0,
      "notes": "Gentle full-body stretch"
    }}
  ],
  "motivation_message": "Your motivational message",
  "intensity_adjustment": "increase|maintain|decrease",
  "coaching_message": "Personalized coaching tip"
}}"#,
        context = build_context_block(ctx),
        json_only = JSON_ONLY,
    )
}

pub fn build_teach_me_prompt(exercise_name: &str, ctx: &UserContext) -> String {
    format!(
        r#"You are an expert fitness coach AI. Teach the user how to perform the following exercise: {exercise}

{context}

## Instructions
1. Provide a step-by-step proper form explanation.
2. List common mistakes.
3. List the primary and secondary muscles worked.
4. Provide beginner tips.
5. Provide safety cues.
6. Keep descriptions concise but informative.

{json_only}
{{
  "form_explanation": [
    "Step 1: Focus on your stance...",
    "Step 2: Engage your core...",
    "Step 3: Descend slowly..."
  ],
  "common_mistakes": ["Mistake 1", "Mistake 2"],
  "muscles_worked": ["Primary: Quads", "Secondary: Glutes"],
  "beginner_tips": ["Tip 1", "Tip 2"],
  "safety_cues": ["Cue 1", "Cue 2"]
}}"#,
        exercise = exercise_name,
        context = build_context_block(ctx),
        json_only = JSON_ONLY,
    )
}

/// 对话模板：要求自然语言回复，不要求 JSON
pub fn build_chat_prompt(message: &str, ctx: &UserContext) -> String {
    format!(
        "You are an expert fitness coach AI. Provide short, actionable, and encouraging fitness advice.\n\n\
         {}\n\n\
         User message: {}\n\n\
         Respond conversationally with helpful fitness advice. Keep responses concise (2-4 paragraphs max).",
        build_context_block(ctx),
        message.trim(),
    )
}

/// 按能力选择模板
///
/// `subject` 对教学是动作名，对对话是用户消息，其余能力忽略
pub fn build_prompt(capability: Capability, ctx: &UserContext, subject: &str) -> String {
    match capability {
        Capability::WorkoutPlan => build_workout_plan_prompt(ctx),
        Capability::ProgressAnalysis => build_progress_analysis_prompt(ctx),
        Capability::Recommendations => build_recommendations_prompt(ctx),
        Capability::TeachMe => build_teach_me_prompt(subject, ctx),
        Capability::Chat => build_chat_prompt(subject, ctx),
    }
}
