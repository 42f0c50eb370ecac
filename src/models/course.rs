// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'courses' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    pub course_id: i64,
    pub course_name: String,
    pub class_id: i64,
    pub created_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 100, message = "Course name must be 1-100 characters."))]
    pub course_name: String,
    pub class_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CourseIdRequest {
    pub course_id: i64,
}
