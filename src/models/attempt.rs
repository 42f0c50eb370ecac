// src/models/attempt.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

use super::material::FeedbackType;

/// Lifecycle status stored in `quiz_attempts.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttemptStatus {
    PendingManualGrading,
    Completed,
}

/// Represents the 'quiz_attempts' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub attempt_number: i64,
    pub status: AttemptStatus,
    pub auto_score: Option<f64>,
    pub manual_score: Option<f64>,
    pub final_score: Option<f64>,
    pub total_auto_points: i64,
    pub total_manual_points: i64,
    pub submitted_at: Option<chrono::NaiveDateTime>,
    pub graded_at: Option<chrono::NaiveDateTime>,
}

/// An attempt joined with what `GET_ATTEMPT_DETAILS` shows around it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub quiz_title: String,
    pub student_name: String,
    #[serde(skip)]
    pub creator_id: Option<i64>,
    pub feedback_type: FeedbackType,
}

/// Represents the 'answers' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Answer {
    pub attempt_id: i64,
    pub question_id: i64,
    pub student_response: String,
    pub is_correct: Option<bool>,
    pub points_earned: Option<f64>,
}

/// One entry of `FINISH_ATTEMPT.answers`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default, deserialize_with = "response_as_text")]
    pub response: String,
}

/// Accepts `"1,2"`, `1`, `[1, 2]` or `null` and normalises to the comma-separated text form.
fn response_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    fn scalar(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(String::new()),
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(scalar)
            .collect::<Vec<_>>()
            .join(",")),
        other => scalar(other).ok_or_else(|| serde::de::Error::custom("invalid response value")),
    }
}

#[derive(Debug, Deserialize)]
pub struct FinishAttemptRequest {
    pub quiz_id: i64,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitGradeRequest {
    pub attempt_id: i64,
    #[validate(range(min = 0.0, max = 100.0, message = "Score must be between 0 and 100."))]
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct AttemptIdRequest {
    pub attempt_id: i64,
}

/// Row of `GET_MY_ATTEMPTS`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentAttemptSummary {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub course_id: i64,
    pub course_name: String,
    pub class_id: i64,
    pub class_name: String,
    pub attempt_number: i64,
    pub status: AttemptStatus,
    pub auto_score: Option<f64>,
    pub final_score: Option<f64>,
    pub feedback_type: FeedbackType,
    pub submitted_at: Option<chrono::NaiveDateTime>,
}

/// Row of `GET_STUDENT_ATTEMPTS_FOR_QUIZ`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttemptEntry {
    pub attempt_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub attempt_number: i64,
    pub status: AttemptStatus,
    pub auto_score: Option<f64>,
    pub final_score: Option<f64>,
    pub submitted_at: Option<chrono::NaiveDateTime>,
}

/// Row of `GET_PENDING_ATTEMPTS`, before its open answers are attached.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingAttempt {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub course_name: String,
    pub class_name: String,
    pub student_id: i64,
    pub student_name: String,
    pub attempt_number: i64,
    pub auto_score: Option<f64>,
    pub total_auto_points: i64,
    pub total_manual_points: i64,
    pub submitted_at: Option<chrono::NaiveDateTime>,
}

/// An open-answer response waiting for the instructor.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OpenAnswerEntry {
    #[serde(skip)]
    pub attempt_id: i64,
    pub question_id: i64,
    pub prompt: String,
    pub student_response: String,
}
