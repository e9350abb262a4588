use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as SqlJson;

use crate::auth::{
    decode_token, hash_password, issue_token_pair, token_digest, verify_password, AuthUser,
    TokenType,
};
use crate::constants::{
    ERR_INVALID_EMAIL, ERR_INVALID_USERNAME, ERR_PASSWORD_TOO_SHORT, MAX_JSON_BLOB_BYTES,
};
use crate::error::{AppError, Result};
use crate::models::{PublicUser, User, UserRole};
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Fetch a user row by ID
pub(crate) async fn fetch_user(pool: &sqlx::SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Persist the digest of a freshly issued refresh token
async fn store_refresh_token(state: &AppState, user_id: i64, digest: &str) -> Result<()> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(state.config.refresh_token_ttl_secs);

    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(digest)
    .bind(expires_at)
    .bind(now)
    .execute(&state.pool)
    .await?;

    Ok(())
}

/// Reject usernames/emails already taken by another user
async fn check_identity_free(
    pool: &sqlx::SqlitePool,
    username: &str,
    email: &str,
    exclude_id: i64,
) -> Result<()> {
    let taken: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != ?")
            .bind(username)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("username".to_string()));
    }

    let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ? AND id != ?")
        .bind(email)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("email".to_string()));
    }

    Ok(())
}

/// Validate a preferences blob: must be a JSON object within the size cap
fn validate_preferences(preferences: &serde_json::Value) -> Result<()> {
    if !preferences.is_object() {
        return Err(AppError::validation(
            "preferences",
            "Preferences must be a JSON object",
        ));
    }
    if preferences.to_string().len() > MAX_JSON_BLOB_BYTES {
        return Err(AppError::validation("preferences", "Preferences too large"));
    }
    Ok(())
}

/// Register a new student account
///
/// Returns the created user plus an access/refresh token pair so the client
/// is logged in immediately.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
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

    check_identity_free(&state.pool, &payload.username, &payload.email, -1).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = Utc::now();

    let id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, preferences, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(UserRole::Student)
    .bind(SqlJson(json!({})))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let (tokens, digest) = issue_token_pair(&state.config, id, UserRole::Student)?;
    store_refresh_token(&state, id, &digest).await?;

    let user = fetch_user(&state.pool, id).await?;

    tracing::info!("New user registered: {} (id {})", user.username, id);

    Ok((
        StatusCode::CREATED,
        envelope(json!({
            "user": PublicUser::from(user),
            "tokens": tokens,
        })),
    ))
}

/// Log in with username and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&payload.username)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::info!("Failed login attempt for {}", payload.username);
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        tracing::warn!("Login attempt for deactivated user {}", user.id);
        return Err(AppError::Forbidden);
    }

    let (tokens, digest) = issue_token_pair(&state.config, user.id, user.role)?;
    store_refresh_token(&state, user.id, &digest).await?;

    tracing::info!("User {} logged in", user.id);

    Ok(envelope(json!({
        "user": PublicUser::from(user),
        "tokens": tokens,
    })))
}

/// Exchange a refresh token for a new token pair
///
/// The presented token is revoked on use (rotation); a previously rotated or
/// revoked token is rejected.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let claims = decode_token(&state.config, &payload.refresh_token, TokenType::Refresh)?;
    let digest = token_digest(&claims.jti);
    let now = Utc::now();

    let known: Option<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM refresh_tokens WHERE token_hash = ? AND revoked_at IS NULL AND expires_at > ?",
    )
    .bind(&digest)
    .bind(now)
    .fetch_optional(&state.pool)
    .await?;

    let Some((user_id,)) = known else {
        tracing::warn!("Refresh with unknown or revoked token for user {}", claims.sub);
        return Err(AppError::Unauthorized);
    };

    let user = fetch_user(&state.pool, user_id).await?;
    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    // Rotate: revoke the used token, issue and persist a fresh pair
    sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE token_hash = ?")
        .bind(now)
        .bind(&digest)
        .execute(&state.pool)
        .await?;

    let (tokens, new_digest) = issue_token_pair(&state.config, user.id, user.role)?;
    store_refresh_token(&state, user.id, &new_digest).await?;

    Ok(envelope(json!({ "tokens": tokens })))
}

/// Revoke a refresh token (log out)
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let claims = decode_token(&state.config, &payload.refresh_token, TokenType::Refresh)?;

    sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE token_hash = ? AND revoked_at IS NULL")
        .bind(Utc::now())
        .bind(token_digest(&claims.jti))
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Logged out" })))
}

/// Current user's profile
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    let user = fetch_user(&state.pool, user.id).await?;
    Ok(envelope(PublicUser::from(user)))
}

/// Update the current user's email and/or preferences blob
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<impl IntoResponse> {
    let user = fetch_user(&state.pool, auth.id).await?;

    let email = match payload.email {
        Some(email) => {
            if !User::validate_email(&email) {
                return Err(AppError::validation("email", ERR_INVALID_EMAIL));
            }
            check_identity_free(&state.pool, &user.username, &email, user.id).await?;
            email
        }
        None => user.email.clone(),
    };

    let preferences = match payload.preferences {
        Some(preferences) => {
            validate_preferences(&preferences)?;
            preferences
        }
        None => user.preferences.0.clone(),
    };

    sqlx::query("UPDATE users SET email = ?, preferences = ?, updated_at = ? WHERE id = ?")
        .bind(&email)
        .bind(SqlJson(preferences))
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let user = fetch_user(&state.pool, user.id).await?;
    Ok(envelope(PublicUser::from(user)))
}

/// Change the current user's password
///
/// Verifies the current password, stores the new hash, and revokes every
/// outstanding refresh token for the account.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    let user = fetch_user(&state.pool, auth.id).await?;

    if !verify_password(&payload.current_password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    if !User::validate_password(&payload.new_password) {
        return Err(AppError::validation("new_password", ERR_PASSWORD_TOO_SHORT));
    }

    let password_hash = hash_password(&payload.new_password)?;
    let now = Utc::now();

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL")
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Password changed for user {}", user.id);

    Ok(envelope(json!({ "message": "Password updated" })))
}
