use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as SqlJson;

use crate::auth::{hash_password, AdminUser};
use crate::constants::{ERR_INVALID_EMAIL, ERR_INVALID_USERNAME, ERR_PASSWORD_TOO_SHORT};
use crate::error::{AppError, Result};
use crate::models::{PublicUser, User, UserRole};
use crate::routes::auth::fetch_user;
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// List all users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
        .fetch_all(&state.pool)
        .await?;

    let users: Vec<PublicUser> = users.into_iter().map(PublicUser::from).collect();
    Ok(envelope(users))
}

/// Fetch a single user (admin)
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user = fetch_user(&state.pool, id).await?;
    Ok(envelope(PublicUser::from(user)))
}

/// Create a user with an explicit role (admin)
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    if !User::validate_username(&payload.username) {
        return Err(AppError::validation("username", ERR_INVALID_USERNAME));
    }
    if !User::validate_email(&payload.email) {
        return Err(AppError::validation("email", ERR_INVALID_EMAIL));
    }
    if !User::validate_password(&payload.password) {
        return Err(AppError::validation("password", ERR_PASSWORD_TOO_SHORT));
    }

    let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(&payload.username)
        .fetch_optional(&state.pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("username".to_string()));
    }
    let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&payload.email)
        .fetch_optional(&state.pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("email".to_string()));
    }

    let role = payload.role.unwrap_or(UserRole::Student);
    let password_hash = hash_password(&payload.password)?;
    let now = Utc::now();

    let id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, preferences, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(role)
    .bind(SqlJson(json!({})))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let user = fetch_user(&state.pool, id).await?;
    tracing::info!("Admin created user {} (role {:?})", id, role);

    Ok((StatusCode::CREATED, envelope(PublicUser::from(user))))
}

/// Update a user's email, role, or active flag (admin)
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse> {
    let user = fetch_user(&state.pool, id).await?;

    // An admin cannot demote or deactivate themselves; avoids locking the
    // last admin out of the system
    if admin.id == id && (payload.role == Some(UserRole::Student) || payload.is_active == Some(false))
    {
        return Err(AppError::invalid("Cannot demote or deactivate yourself"));
    }

    let email = match payload.email {
        Some(email) => {
            if !User::validate_email(&email) {
                return Err(AppError::validation("email", ERR_INVALID_EMAIL));
            }
            let taken: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM users WHERE email = ? AND id != ?")
                    .bind(&email)
                    .bind(id)
                    .fetch_optional(&state.pool)
                    .await?;
            if taken.is_some() {
                return Err(AppError::Conflict("email".to_string()));
            }
            email
        }
        None => user.email.clone(),
    };

    let role = payload.role.unwrap_or(user.role);
    let is_active = payload.is_active.unwrap_or(user.is_active);

    sqlx::query("UPDATE users SET email = ?, role = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(&email)
        .bind(role)
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let user = fetch_user(&state.pool, id).await?;
    Ok(envelope(PublicUser::from(user)))
}

/// Delete a user and all owned rows (admin)
///
/// Plans, sessions, refresh tokens, and owned catalog entries go with the
/// user via foreign key cascades.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    if admin.id == id {
        return Err(AppError::invalid("Cannot delete yourself"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }

    tracing::info!("Admin {} deleted user {}", admin.id, id);
    Ok(envelope(json!({ "message": "User deleted" })))
}
