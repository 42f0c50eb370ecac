// src/handlers/courses.rs

use serde_json::{Value, json};

use crate::{
    db::is_foreign_key_violation,
    error::AppError,
    models::{
        class::ClassIdRequest,
        course::{Course, CourseIdRequest, CreateCourseRequest},
    },
    protocol::Response,
    state::AppState,
};

use super::{data_response, parse, parse_valid};

pub async fn list_for_class(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: ClassIdRequest = parse(data)?;

    let courses = sqlx::query_as::<_, Course>(
        "SELECT course_id, course_name, class_id, created_at FROM courses \
         WHERE class_id = ? ORDER BY course_name",
    )
    .bind(payload.class_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch courses"))?;

    data_response(&courses)
}

pub async fn create_course(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CreateCourseRequest = parse_valid(data)?;

    let course_id: i64 = sqlx::query_scalar(
        "INSERT INTO courses (course_name, class_id) VALUES (?, ?) RETURNING course_id",
    )
    .bind(&payload.course_name)
    .bind(payload.class_id)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::NotFound("Class not found".to_string())
        } else {
            AppError::persistence("create course")(e)
        }
    })?;

    tracing::info!(
        "Created course '{}' (id {}) in class {}",
        payload.course_name,
        course_id,
        payload.class_id
    );
    Ok(Response::ok_with(
        "Course created successfully",
        json!({ "course_id": course_id }),
    ))
}

pub async fn delete_course(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CourseIdRequest = parse(data)?;

    let result = sqlx::query("DELETE FROM courses WHERE course_id = ?")
        .bind(payload.course_id)
        .execute(&state.pool)
        .await
        .map_err(AppError::persistence("delete course"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }
    Ok(Response::ok("Course deleted successfully"))
}
