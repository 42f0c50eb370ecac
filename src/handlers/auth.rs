// src/handlers/auth.rs

use serde_json::Value;

use crate::{
    error::AppError,
    models::user::{LoginRequest, User},
    protocol::Response,
    session::Session,
    state::AppState,
    utils::hash::verify_password,
};

use super::parse;

const LOGIN_FAILED: &str = "Invalid username or password";

/// Authenticates a user and binds the identity to the session.
///
/// Unknown usernames and wrong passwords produce the same `LOGIN_FAIL` reply, and a failed
/// attempt leaves any existing identity on the session untouched.
pub async fn login(
    state: &AppState,
    session: &mut Session,
    data: Value,
) -> Result<Response, AppError> {
    let payload: LoginRequest = parse(data)?;

    let user = sqlx::query_as::<_, User>(
        "SELECT user_id, username, password_hash, role, created_at FROM users WHERE username = ?",
    )
    .bind(&payload.username)
    .fetch_optional(&state.pool)
    .await
    .map_err(AppError::persistence("log in"))?;

    let user = match user {
        Some(user) if verify_password(&payload.password, &user.password_hash)? => user,
        _ => {
            tracing::info!(
                "Failed login attempt for '{}' from {}",
                payload.username,
                session.peer()
            );
            return Ok(Response::LoginFail {
                message: LOGIN_FAILED.to_string(),
            });
        }
    };

    let identity = user.identity();
    tracing::info!(
        "User {} logged in as {} from {}",
        identity.username,
        identity.role,
        session.peer()
    );
    session.login(identity.clone());

    Ok(Response::LoginSuccess { user: identity })
}

/// Clears the session identity. Succeeds even when nobody is logged in.
pub fn logout(session: &mut Session) -> Response {
    if let Some(identity) = session.logout() {
        tracing::info!("User {} logged out", identity.username);
    }
    Response::ok("Logged out successfully")
}
