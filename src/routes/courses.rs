use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{can_modify, Course};
use crate::routes::categories::fetch_category;
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCoursesQuery {
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    /// Create a global (ownerless) entry; requires admin
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > 150 {
        return Err(AppError::validation("name", "Name must be 1-150 characters"));
    }
    Ok(())
}

pub(crate) async fn fetch_course(pool: &sqlx::SqlitePool, id: i64) -> Result<Course> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Course"))
}

/// List visible courses, optionally filtered by category, ordered by sort_order
pub async fn list_courses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListCoursesQuery>,
) -> Result<impl IntoResponse> {
    let courses = match query.category_id {
        Some(category_id) => {
            sqlx::query_as::<_, Course>(
                "SELECT * FROM courses WHERE category_id = ? AND (user_id IS NULL OR user_id = ?) \
                 ORDER BY sort_order, name",
            )
            .bind(category_id)
            .bind(user.id)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Course>(
                "SELECT * FROM courses WHERE user_id IS NULL OR user_id = ? ORDER BY sort_order, name",
            )
            .bind(user.id)
            .fetch_all(&state.pool)
            .await?
        }
    };

    Ok(envelope(courses))
}

/// Create a course under a visible category
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse> {
    validate_name(&payload.name)?;

    if payload.global && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    let owner = if payload.global { None } else { Some(user.id) };

    // The target category must exist and be visible to the caller
    let category = fetch_category(&state.pool, payload.category_id).await?;
    if category.user_id.is_some() && category.user_id != Some(user.id) && !user.is_admin() {
        return Err(AppError::NotFound("Category"));
    }

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO courses (category_id, user_id, name, description, color, sort_order, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.category_id)
    .bind(owner)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(&payload.color)
    .bind(payload.sort_order.unwrap_or(0))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let course = fetch_course(&state.pool, id).await?;
    Ok((StatusCode::CREATED, envelope(course)))
}

/// Update a course
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse> {
    let course = fetch_course(&state.pool, id).await?;
    if !can_modify(course.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    let name = match payload.name {
        Some(name) => {
            validate_name(&name)?;
            name.trim().to_string()
        }
        None => course.name.clone(),
    };
    let description = payload.description.or(course.description.clone());
    let color = payload.color.or(course.color.clone());
    let sort_order = payload.sort_order.unwrap_or(course.sort_order);

    sqlx::query(
        "UPDATE courses SET name = ?, description = ?, color = ?, sort_order = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(&color)
    .bind(sort_order)
    .bind(Utc::now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let course = fetch_course(&state.pool, id).await?;
    Ok(envelope(course))
}

/// Delete a course; its topics cascade
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let course = fetch_course(&state.pool, id).await?;
    if !can_modify(course.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Course deleted" })))
}
