// src/models/class.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::user::Role;

/// Represents the 'classes' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Class {
    pub class_id: i64,
    pub class_name: String,
    pub member_count: i64,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// A user listed as a member of a class.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClassMember {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 100, message = "Class name must be 1-100 characters."))]
    pub class_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ClassIdRequest {
    pub class_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub user_id: i64,
    pub class_id: i64,
}
