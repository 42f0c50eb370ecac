// src/handlers/users.rs

use serde_json::{Value, json};

use crate::{
    db::is_unique_violation,
    error::AppError,
    models::user::{CreateUserRequest, Identity, User, UserIdRequest},
    protocol::Response,
    state::AppState,
    utils::hash::hash_password,
};

use super::{data_response, parse, parse_valid};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(state: &AppState) -> Result<Response, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT user_id, username, password_hash, role, created_at FROM users ORDER BY user_id",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch users"))?;

    data_response(&users)
}

/// Creates an account with the requested role.
/// Admin only.
pub async fn create_user(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CreateUserRequest = parse_valid(data)?;
    let hashed_password = hash_password(&payload.password)?;

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash, role) VALUES (?, ?, ?) RETURNING user_id",
    )
    .bind(&payload.username)
    .bind(hashed_password)
    .bind(payload.role)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            AppError::persistence("create user")(e)
        }
    })?;

    tracing::info!(
        "Created {} account '{}' (id {})",
        payload.role,
        payload.username,
        user_id
    );
    Ok(Response::ok_with(
        "User created successfully",
        json!({ "user_id": user_id }),
    ))
}

/// Deletes an account together with its memberships and attempts.
/// Admin only; an admin cannot delete the account they are logged in with.
pub async fn delete_user(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: UserIdRequest = parse(data)?;

    if payload.user_id == actor.user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
        .bind(payload.user_id)
        .execute(&state.pool)
        .await
        .map_err(AppError::persistence("delete user"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} deleted by {}", payload.user_id, actor.username);
    Ok(Response::ok("User deleted successfully"))
}
