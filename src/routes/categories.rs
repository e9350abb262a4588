use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{can_modify, Category};
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    /// Create a global (ownerless) entry; requires admin
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > 100 {
        return Err(AppError::validation("name", "Name must be 1-100 characters"));
    }
    Ok(())
}

pub(crate) async fn fetch_category(pool: &sqlx::SqlitePool, id: i64) -> Result<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Category"))
}

/// Reject a duplicate category name within the same scope (global or per-user)
async fn check_name_free(
    pool: &sqlx::SqlitePool,
    name: &str,
    owner: Option<i64>,
    exclude_id: i64,
) -> Result<()> {
    let taken: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM categories WHERE name = ? AND user_id IS ? AND id != ?")
            .bind(name)
            .bind(owner)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("name".to_string()));
    }
    Ok(())
}

/// List categories visible to the caller: global entries plus their own
pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE user_id IS NULL OR user_id = ? ORDER BY name",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(envelope(categories))
}

/// Create a category; `global: true` creates an admin-managed global entry
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse> {
    validate_name(&payload.name)?;

    if payload.global && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    let owner = if payload.global { None } else { Some(user.id) };

    let name = payload.name.trim().to_string();
    check_name_free(&state.pool, &name, owner, -1).await?;

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO categories (user_id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(owner)
    .bind(&name)
    .bind(&payload.description)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let category = fetch_category(&state.pool, id).await?;
    Ok((StatusCode::CREATED, envelope(category)))
}

/// Update a category's name or description
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse> {
    let category = fetch_category(&state.pool, id).await?;
    if !can_modify(category.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    let name = match payload.name {
        Some(name) => {
            validate_name(&name)?;
            let name = name.trim().to_string();
            check_name_free(&state.pool, &name, category.user_id, id).await?;
            name
        }
        None => category.name.clone(),
    };
    let description = payload.description.or(category.description.clone());

    sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&description)
        .bind(Utc::now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let category = fetch_category(&state.pool, id).await?;
    Ok(envelope(category))
}

/// Delete a category; its courses and topics cascade
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let category = fetch_category(&state.pool, id).await?;
    if !can_modify(category.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Category deleted" })))
}
