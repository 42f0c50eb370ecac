// src/handlers/classes.rs

use serde_json::{Value, json};

use crate::{
    db::{is_foreign_key_violation, is_unique_violation},
    error::AppError,
    models::{
        class::{Class, ClassIdRequest, ClassMember, CreateClassRequest, MembershipRequest},
        user::Identity,
    },
    protocol::Response,
    state::AppState,
};

use super::{data_response, parse, parse_valid};

const CLASS_COLUMNS: &str = "c.class_id, c.class_name, c.created_at, \
     (SELECT COUNT(*) FROM class_members m WHERE m.class_id = c.class_id) AS member_count";

pub async fn list_classes(state: &AppState) -> Result<Response, AppError> {
    let classes = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes c ORDER BY c.class_name",
        CLASS_COLUMNS
    ))
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch classes"))?;

    data_response(&classes)
}

/// Classes the acting user is a member of.
pub async fn my_classes(state: &AppState, actor: &Identity) -> Result<Response, AppError> {
    let classes = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes c \
         JOIN class_members me ON me.class_id = c.class_id AND me.user_id = ? \
         ORDER BY c.class_name",
        CLASS_COLUMNS
    ))
    .bind(actor.user_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch classes"))?;

    data_response(&classes)
}

pub async fn create_class(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CreateClassRequest = parse_valid(data)?;

    let class_id: i64 =
        sqlx::query_scalar("INSERT INTO classes (class_name) VALUES (?) RETURNING class_id")
            .bind(&payload.class_name)
            .fetch_one(&state.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Class '{}' already exists", payload.class_name))
                } else {
                    AppError::persistence("create class")(e)
                }
            })?;

    tracing::info!("Created class '{}' (id {})", payload.class_name, class_id);
    Ok(Response::ok_with(
        "Class created successfully",
        json!({ "class_id": class_id }),
    ))
}

/// Deletes a class. Memberships, courses and everything below them go with it.
pub async fn delete_class(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: ClassIdRequest = parse(data)?;

    let result = sqlx::query("DELETE FROM classes WHERE class_id = ?")
        .bind(payload.class_id)
        .execute(&state.pool)
        .await
        .map_err(AppError::persistence("delete class"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Class not found".to_string()));
    }
    Ok(Response::ok("Class deleted successfully"))
}

pub async fn assign_user(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: MembershipRequest = parse(data)?;

    sqlx::query("INSERT INTO class_members (class_id, user_id) VALUES (?, ?)")
        .bind(payload.class_id)
        .bind(payload.user_id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("User is already a member of this class".to_string())
            } else if is_foreign_key_violation(&e) {
                AppError::NotFound("User or class not found".to_string())
            } else {
                AppError::persistence("assign user to class")(e)
            }
        })?;

    tracing::info!(
        "User {} assigned to class {}",
        payload.user_id,
        payload.class_id
    );
    Ok(Response::ok("User assigned to class successfully"))
}

pub async fn remove_user(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: MembershipRequest = parse(data)?;

    let result = sqlx::query("DELETE FROM class_members WHERE class_id = ? AND user_id = ?")
        .bind(payload.class_id)
        .bind(payload.user_id)
        .execute(&state.pool)
        .await
        .map_err(AppError::persistence("remove user from class"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "User is not a member of this class".to_string(),
        ));
    }
    Ok(Response::ok("User removed from class successfully"))
}

pub async fn list_members(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: ClassIdRequest = parse(data)?;

    let members = sqlx::query_as::<_, ClassMember>(
        "SELECT u.user_id, u.username, u.role FROM class_members m \
         JOIN users u ON u.user_id = m.user_id \
         WHERE m.class_id = ? ORDER BY u.role, u.username",
    )
    .bind(payload.class_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch class members"))?;

    data_response(&members)
}
