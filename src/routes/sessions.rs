use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json as SqlJson;

use crate::auth::AuthUser;
use crate::constants::ERR_SESSION_TIME_RANGE;
use crate::error::{AppError, Result};
use crate::models::{PomodoroSettings, SessionStatus, StudySession};
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
    pub plan_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub plan_id: Option<i64>,
    pub course_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub notes: Option<String>,
    pub pomodoro: Option<PomodoroSettings>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub plan_id: Option<i64>,
    pub course_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub notes: Option<String>,
    pub pomodoro: Option<PomodoroSettings>,
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// One dashboard chart bucket: completed study per calendar day
#[derive(Debug, Serialize)]
pub struct StatsBucket {
    pub date: String,
    pub minutes: f64,
    pub sessions: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionStats {
    pub total_minutes: f64,
    pub total_sessions: i64,
    pub daily: Vec<StatsBucket>,
}

async fn fetch_owned_session(
    pool: &sqlx::SqlitePool,
    id: i64,
    user_id: i64,
) -> Result<StudySession> {
    sqlx::query_as::<_, StudySession>("SELECT * FROM study_sessions WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Study session"))
}

/// Reject sessions that would overlap a slot-holding session of the same user
///
/// A session blocks when `existing.starts_at < new.ends_at AND
/// existing.ends_at > new.starts_at` and its status is planned or in_progress.
async fn check_no_overlap(
    pool: &sqlx::SqlitePool,
    user_id: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    exclude_id: i64,
) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM study_sessions \
         WHERE user_id = ? AND id != ? AND status IN ('planned', 'in_progress') \
         AND starts_at < ? AND ends_at > ?",
    )
    .bind(user_id)
    .bind(exclude_id)
    .bind(ends_at)
    .bind(starts_at)
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(AppError::Overlap(
            "Time range overlaps an existing study session",
        ));
    }
    Ok(())
}

/// Verify optional plan/course/topic links point at rows the caller can use
async fn validate_links(
    state: &AppState,
    user: AuthUser,
    plan_id: Option<i64>,
    course_id: Option<i64>,
    topic_id: Option<i64>,
) -> Result<()> {
    if let Some(plan_id) = plan_id {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM plans WHERE id = ? AND user_id = ?")
                .bind(plan_id)
                .bind(user.id)
                .fetch_optional(&state.pool)
                .await?;
        if found.is_none() {
            return Err(AppError::NotFound("Plan"));
        }
    }
    if let Some(course_id) = course_id {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM courses WHERE id = ? AND (user_id IS NULL OR user_id = ?)")
                .bind(course_id)
                .bind(user.id)
                .fetch_optional(&state.pool)
                .await?;
        if found.is_none() {
            return Err(AppError::NotFound("Course"));
        }
    }
    if let Some(topic_id) = topic_id {
        let found: Option<(i64,)> = sqlx::query_as(
            "SELECT t.id FROM topics t JOIN courses c ON c.id = t.course_id \
             WHERE t.id = ? AND (c.user_id IS NULL OR c.user_id = ?)",
        )
        .bind(topic_id)
        .bind(user.id)
        .fetch_optional(&state.pool)
        .await?;
        if found.is_none() {
            return Err(AppError::NotFound("Topic"));
        }
    }
    Ok(())
}

fn validate_pomodoro(pomodoro: &Option<PomodoroSettings>) -> Result<()> {
    if let Some(settings) = pomodoro {
        if !settings.validate() {
            return Err(AppError::validation(
                "pomodoro",
                "Pomodoro intervals and cycles must be positive",
            ));
        }
    }
    Ok(())
}

/// List the caller's sessions with optional date/status/plan filters
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse> {
    let from = query
        .from
        .map(|d| d.to_string())
        .unwrap_or_else(|| "0000-01-01".to_string());
    let to = query
        .to
        .map(|d| d.to_string())
        .unwrap_or_else(|| "9999-12-31".to_string());

    let mut sessions = sqlx::query_as::<_, StudySession>(
        "SELECT * FROM study_sessions \
         WHERE user_id = ? AND date(starts_at) >= ? AND date(starts_at) <= ? \
         ORDER BY starts_at",
    )
    .bind(user.id)
    .bind(&from)
    .bind(&to)
    .fetch_all(&state.pool)
    .await?;

    if let Some(status) = query.status {
        sessions.retain(|s| s.status == status);
    }
    if let Some(plan_id) = query.plan_id {
        sessions.retain(|s| s.plan_id == Some(plan_id));
    }

    Ok(envelope(sessions))
}

pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = fetch_owned_session(&state.pool, id, user.id).await?;
    Ok(envelope(session))
}

/// Schedule a new study session
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse> {
    if payload.title.trim().is_empty() {
        return Err(AppError::validation("title", "Title must not be empty"));
    }
    if !StudySession::validate_time_range(payload.starts_at, payload.ends_at) {
        return Err(AppError::validation("ends_at", ERR_SESSION_TIME_RANGE));
    }
    validate_pomodoro(&payload.pomodoro)?;
    validate_links(&state, user, payload.plan_id, payload.course_id, payload.topic_id).await?;
    check_no_overlap(&state.pool, user.id, payload.starts_at, payload.ends_at, -1).await?;

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO study_sessions \
         (user_id, plan_id, course_id, topic_id, title, starts_at, ends_at, status, notes, pomodoro, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'planned', ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(payload.plan_id)
    .bind(payload.course_id)
    .bind(payload.topic_id)
    .bind(payload.title.trim())
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(&payload.notes)
    .bind(payload.pomodoro.as_ref().map(SqlJson))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let session = fetch_owned_session(&state.pool, id, user.id).await?;
    Ok((StatusCode::CREATED, envelope(session)))
}

/// Update a session; the overlap rule is re-checked when the new state holds a slot
pub async fn update_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse> {
    let session = fetch_owned_session(&state.pool, id, user.id).await?;

    let title = match payload.title {
        Some(title) => {
            if title.trim().is_empty() {
                return Err(AppError::validation("title", "Title must not be empty"));
            }
            title.trim().to_string()
        }
        None => session.title.clone(),
    };
    let starts_at = payload.starts_at.unwrap_or(session.starts_at);
    let ends_at = payload.ends_at.unwrap_or(session.ends_at);
    if !StudySession::validate_time_range(starts_at, ends_at) {
        return Err(AppError::validation("ends_at", ERR_SESSION_TIME_RANGE));
    }

    let status = payload.status.unwrap_or(session.status);
    let plan_id = payload.plan_id.or(session.plan_id);
    let course_id = payload.course_id.or(session.course_id);
    let topic_id = payload.topic_id.or(session.topic_id);
    let notes = payload.notes.or(session.notes.clone());
    let pomodoro = match payload.pomodoro {
        Some(settings) => Some(settings),
        None => session.pomodoro.clone().map(|j| j.0),
    };

    validate_pomodoro(&pomodoro)?;
    validate_links(&state, user, payload.plan_id, payload.course_id, payload.topic_id).await?;
    if status.blocks_slot() {
        check_no_overlap(&state.pool, user.id, starts_at, ends_at, id).await?;
    }

    sqlx::query(
        "UPDATE study_sessions SET plan_id = ?, course_id = ?, topic_id = ?, title = ?, \
         starts_at = ?, ends_at = ?, status = ?, notes = ?, pomodoro = ?, updated_at = ? WHERE id = ?",
    )
    .bind(plan_id)
    .bind(course_id)
    .bind(topic_id)
    .bind(&title)
    .bind(starts_at)
    .bind(ends_at)
    .bind(status)
    .bind(&notes)
    .bind(pomodoro.as_ref().map(SqlJson))
    .bind(Utc::now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let session = fetch_owned_session(&state.pool, id, user.id).await?;
    Ok(envelope(session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = fetch_owned_session(&state.pool, id, user.id).await?;

    sqlx::query("DELETE FROM study_sessions WHERE id = ?")
        .bind(session.id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Study session deleted" })))
}

/// Flat status write shared by the status action endpoints
async fn set_status(
    state: &AppState,
    user: AuthUser,
    id: i64,
    status: SessionStatus,
) -> Result<StudySession> {
    let session = fetch_owned_session(&state.pool, id, user.id).await?;

    sqlx::query("UPDATE study_sessions SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(session.id)
        .execute(&state.pool)
        .await?;

    fetch_owned_session(&state.pool, id, user.id).await
}

pub async fn start_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = set_status(&state, user, id, SessionStatus::InProgress).await?;
    Ok(envelope(session))
}

pub async fn pause_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = set_status(&state, user, id, SessionStatus::Paused).await?;
    Ok(envelope(session))
}

pub async fn complete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = set_status(&state, user, id, SessionStatus::Completed).await?;
    Ok(envelope(session))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let session = set_status(&state, user, id, SessionStatus::Cancelled).await?;
    Ok(envelope(session))
}

/// Date-bucketed completed study time for dashboard charts
pub async fn session_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse> {
    let from = query
        .from
        .map(|d| d.to_string())
        .unwrap_or_else(|| "0000-01-01".to_string());
    let to = query
        .to
        .map(|d| d.to_string())
        .unwrap_or_else(|| "9999-12-31".to_string());

    let rows: Vec<(String, f64, i64)> = sqlx::query_as(
        "SELECT date(starts_at) AS day, \
                SUM((julianday(ends_at) - julianday(starts_at)) * 1440.0) AS minutes, \
                COUNT(*) AS sessions \
         FROM study_sessions \
         WHERE user_id = ? AND status = 'completed' AND date(starts_at) >= ? AND date(starts_at) <= ? \
         GROUP BY day ORDER BY day",
    )
    .bind(user.id)
    .bind(&from)
    .bind(&to)
    .fetch_all(&state.pool)
    .await?;

    let total_minutes: f64 = rows.iter().map(|(_, m, _)| m).sum();
    let total_sessions: i64 = rows.iter().map(|(_, _, s)| s).sum();
    let daily = rows
        .into_iter()
        .map(|(date, minutes, sessions)| StatsBucket {
            date,
            minutes,
            sessions,
        })
        .collect();

    Ok(envelope(SessionStats {
        total_minutes,
        total_sessions,
        daily,
    }))
}
