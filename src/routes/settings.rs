use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{AppError, Result};
use crate::models::setting::encode_value;
use crate::models::{Setting, SettingType, TypedSetting};
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PutSettingRequest {
    pub value: serde_json::Value,
    pub value_type: SettingType,
}

/// List all settings with values coerced to their declared types
///
/// Rows whose stored text no longer matches their type tag are logged and
/// skipped rather than failing the whole listing.
pub async fn list_settings(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse> {
    let rows = sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
        .fetch_all(&state.pool)
        .await?;

    let settings: Vec<TypedSetting> = rows
        .into_iter()
        .filter_map(|row| {
            let key = row.key.clone();
            let typed = row.into_typed();
            if typed.is_none() {
                tracing::warn!("Setting {} failed type coercion, skipping", key);
            }
            typed
        })
        .collect();

    Ok(envelope(settings))
}

/// Fetch a single setting, coerced
pub async fn get_setting(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let row = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
        .bind(&key)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound("Setting"))?;

    let typed = row.into_typed().ok_or_else(|| {
        tracing::error!("Setting {} failed type coercion", key);
        AppError::NotFound("Setting")
    })?;

    Ok(envelope(typed))
}

/// Create or replace a setting (admin)
///
/// The value must match the declared type; mismatches are rejected before
/// anything is stored.
pub async fn put_setting(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(key): Path<String>,
    Json(payload): Json<PutSettingRequest>,
) -> Result<impl IntoResponse> {
    if !Setting::validate_key(&key) {
        return Err(AppError::validation(
            "key",
            "Keys are dotted lowercase identifiers, max 100 characters",
        ));
    }

    let stored = encode_value(&payload.value, payload.value_type).ok_or_else(|| {
        AppError::validation("value", "Value does not match the declared value_type")
    })?;

    sqlx::query(
        "INSERT INTO settings (key, value, value_type, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, value_type = excluded.value_type, \
         updated_at = excluded.updated_at",
    )
    .bind(&key)
    .bind(&stored)
    .bind(payload.value_type)
    .bind(Utc::now())
    .execute(&state.pool)
    .await?;

    let row = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
        .bind(&key)
        .fetch_one(&state.pool)
        .await?;

    // encode_value already guaranteed coercibility
    let typed = row
        .into_typed()
        .ok_or_else(|| AppError::validation("value", "Value does not match the declared value_type"))?;
    Ok(envelope(typed))
}

/// Delete a setting (admin)
pub async fn delete_setting(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(&key)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Setting"));
    }

    Ok(envelope(json!({ "message": "Setting deleted" })))
}
