// src/handlers/stats.rs

use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::{class::ClassIdRequest, course::CourseIdRequest},
    protocol::Response,
    state::AppState,
};

use super::{data_response, parse};

/// Aggregate over completed attempts. `average_score` is 0 when nothing is graded yet.
#[derive(Debug, Serialize)]
struct Statistics {
    student_count: i64,
    completed_attempts: i64,
    average_score: f64,
}

#[derive(FromRow)]
struct ScoreAggregate {
    completed_attempts: i64,
    average_score: Option<f64>,
}

async fn ensure_exists(
    state: &AppState,
    sql: &str,
    id: i64,
    not_found: &str,
) -> Result<(), AppError> {
    let found: Option<i64> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::persistence("compute statistics"))?;

    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(not_found.to_string()))
}

/// Students enrolled in the class and the average final score across its courses.
pub async fn class_statistics(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: ClassIdRequest = parse(data)?;
    ensure_exists(
        state,
        "SELECT class_id FROM classes WHERE class_id = ?",
        payload.class_id,
        "Class not found",
    )
    .await?;

    let student_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM class_members m JOIN users u ON u.user_id = m.user_id \
         WHERE m.class_id = ? AND u.role = 'student'",
    )
    .bind(payload.class_id)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::persistence("compute statistics"))?;

    let scores = sqlx::query_as::<_, ScoreAggregate>(
        "SELECT COUNT(*) AS completed_attempts, AVG(qa.final_score) AS average_score \
         FROM quiz_attempts qa \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         JOIN courses c ON c.course_id = m.course_id \
         WHERE c.class_id = ? AND qa.status = 'completed'",
    )
    .bind(payload.class_id)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::persistence("compute statistics"))?;

    data_response(&Statistics {
        student_count,
        completed_attempts: scores.completed_attempts,
        average_score: scores.average_score.unwrap_or(0.0),
    })
}

/// Students who attempted a quiz of the course and their average final score.
pub async fn course_statistics(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CourseIdRequest = parse(data)?;
    ensure_exists(
        state,
        "SELECT course_id FROM courses WHERE course_id = ?",
        payload.course_id,
        "Course not found",
    )
    .await?;

    let student_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT qa.student_id) FROM quiz_attempts qa \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         WHERE m.course_id = ?",
    )
    .bind(payload.course_id)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::persistence("compute statistics"))?;

    let scores = sqlx::query_as::<_, ScoreAggregate>(
        "SELECT COUNT(*) AS completed_attempts, AVG(qa.final_score) AS average_score \
         FROM quiz_attempts qa \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         WHERE m.course_id = ? AND qa.status = 'completed'",
    )
    .bind(payload.course_id)
    .fetch_one(&state.pool)
    .await
    .map_err(AppError::persistence("compute statistics"))?;

    data_response(&Statistics {
        student_count,
        completed_attempts: scores.completed_attempts,
        average_score: scores.average_score.unwrap_or(0.0),
    })
}
