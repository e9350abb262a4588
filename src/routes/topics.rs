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
use crate::models::{can_modify, Topic};
use crate::routes::courses::fetch_course;
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTopicsQuery {
    pub course_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i64>,
    pub completed: Option<bool>,
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > 150 {
        return Err(AppError::validation("name", "Name must be 1-150 characters"));
    }
    Ok(())
}

async fn fetch_topic(pool: &sqlx::SqlitePool, id: i64) -> Result<Topic> {
    sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Topic"))
}

/// Topic order must stay unique within its course
async fn check_order_free(
    pool: &sqlx::SqlitePool,
    course_id: i64,
    sort_order: i64,
    exclude_id: i64,
) -> Result<()> {
    let taken: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM topics WHERE course_id = ? AND sort_order = ? AND id != ?")
            .bind(course_id)
            .bind(sort_order)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("sort_order".to_string()));
    }
    Ok(())
}

/// List a course's topics in order
pub async fn list_topics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListTopicsQuery>,
) -> Result<impl IntoResponse> {
    // The course must be visible to the caller
    let course = fetch_course(&state.pool, query.course_id).await?;
    if course.user_id.is_some() && course.user_id != Some(user.id) && !user.is_admin() {
        return Err(AppError::NotFound("Course"));
    }

    let topics = sqlx::query_as::<_, Topic>(
        "SELECT * FROM topics WHERE course_id = ? ORDER BY sort_order, name",
    )
    .bind(query.course_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(envelope(topics))
}

/// Create a topic; inherits its course's ownership rules
pub async fn create_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse> {
    validate_name(&payload.name)?;

    let course = fetch_course(&state.pool, payload.course_id).await?;
    if !can_modify(course.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    // Default to the next free slot at the end of the course
    let sort_order = match payload.sort_order {
        Some(order) => {
            check_order_free(&state.pool, payload.course_id, order, -1).await?;
            order
        }
        None => {
            let (max,): (Option<i64>,) =
                sqlx::query_as("SELECT MAX(sort_order) FROM topics WHERE course_id = ?")
                    .bind(payload.course_id)
                    .fetch_one(&state.pool)
                    .await?;
            max.unwrap_or(-1) + 1
        }
    };

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO topics (course_id, name, description, sort_order, completed, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(payload.course_id)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(sort_order)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let topic = fetch_topic(&state.pool, id).await?;
    Ok((StatusCode::CREATED, envelope(topic)))
}

/// Update a topic (rename, reorder, mark completed)
pub async fn update_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse> {
    let topic = fetch_topic(&state.pool, id).await?;
    let course = fetch_course(&state.pool, topic.course_id).await?;
    if !can_modify(course.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    let name = match payload.name {
        Some(name) => {
            validate_name(&name)?;
            name.trim().to_string()
        }
        None => topic.name.clone(),
    };
    let sort_order = match payload.sort_order {
        Some(order) => {
            check_order_free(&state.pool, topic.course_id, order, id).await?;
            order
        }
        None => topic.sort_order,
    };
    let description = payload.description.or(topic.description.clone());
    let completed = payload.completed.unwrap_or(topic.completed);

    sqlx::query(
        "UPDATE topics SET name = ?, description = ?, sort_order = ?, completed = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(sort_order)
    .bind(completed)
    .bind(Utc::now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let topic = fetch_topic(&state.pool, id).await?;
    Ok(envelope(topic))
}

/// Delete a topic
pub async fn delete_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let topic = fetch_topic(&state.pool, id).await?;
    let course = fetch_course(&state.pool, topic.course_id).await?;
    if !can_modify(course.user_id, user.id, user.is_admin()) {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM topics WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Topic deleted" })))
}
