use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json as SqlJson;

use crate::auth::AuthUser;
use crate::constants::{ERR_PLAN_DATE_RANGE, MAX_JSON_BLOB_BYTES};
use crate::error::{AppError, Result};
use crate::models::{Plan, PlanGoals, PlanStatus};
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub goals: Option<PlanGoals>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub goals: Option<PlanGoals>,
    pub status: Option<PlanStatus>,
}

/// One day of completed study inside a plan
#[derive(Debug, Serialize)]
pub struct DailyBucket {
    pub date: String,
    pub minutes: f64,
}

/// Progress against the plan's goal targets, as percentages (uncapped)
#[derive(Debug, Serialize)]
pub struct GoalProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_hours_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_hours_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_pct: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PlanStats {
    pub total_minutes: f64,
    pub completed_sessions: i64,
    pub topics_completed: i64,
    pub daily: Vec<DailyBucket>,
    pub goals: PlanGoals,
    pub progress: GoalProgress,
}

/// Fetch a plan owned by the caller; other users' plans surface as 404
async fn fetch_owned_plan(pool: &sqlx::SqlitePool, id: i64, user_id: i64) -> Result<Plan> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Plan"))
}

fn validate_goals(goals: &PlanGoals) -> Result<()> {
    if goals.daily_hours.map_or(false, |h| h <= 0.0 || h > 24.0) {
        return Err(AppError::validation(
            "goals.daily_hours",
            "Daily hours must be between 0 and 24",
        ));
    }
    if goals.weekly_hours.map_or(false, |h| h <= 0.0 || h > 168.0) {
        return Err(AppError::validation(
            "goals.weekly_hours",
            "Weekly hours must be between 0 and 168",
        ));
    }
    if goals.topic_target.map_or(false, |t| t <= 0) {
        return Err(AppError::validation(
            "goals.topic_target",
            "Topic target must be positive",
        ));
    }
    if serde_json::to_string(goals)
        .map(|s| s.len())
        .unwrap_or(usize::MAX)
        > MAX_JSON_BLOB_BYTES
    {
        return Err(AppError::validation("goals", "Goals blob too large"));
    }
    Ok(())
}

/// Enforce at most one active plan per user over any date range
async fn check_no_active_overlap(
    pool: &sqlx::SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: i64,
) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM plans \
         WHERE user_id = ? AND status = 'active' AND id != ? AND start_date <= ? AND end_date >= ?",
    )
    .bind(user_id)
    .bind(exclude_id)
    .bind(end)
    .bind(start)
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(AppError::Overlap(
            "Date range overlaps an existing active plan",
        ));
    }
    Ok(())
}

/// List the caller's plans, newest first
pub async fn list_plans(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    let plans =
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE user_id = ? ORDER BY start_date DESC")
            .bind(user.id)
            .fetch_all(&state.pool)
            .await?;

    Ok(envelope(plans))
}

pub async fn get_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;
    Ok(envelope(plan))
}

/// Create a plan; new plans start out active
pub async fn create_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("name", "Name must not be empty"));
    }
    if !Plan::validate_date_range(payload.start_date, payload.end_date) {
        return Err(AppError::validation("end_date", ERR_PLAN_DATE_RANGE));
    }

    let goals = payload.goals.unwrap_or_default();
    validate_goals(&goals)?;

    check_no_active_overlap(&state.pool, user.id, payload.start_date, payload.end_date, -1).await?;

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO plans (user_id, name, description, start_date, end_date, goals, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(user.id)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(SqlJson(&goals))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;
    Ok((StatusCode::CREATED, envelope(plan)))
}

/// Update a plan; re-validates the date range and the single-active-plan rule
pub async fn update_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse> {
    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;

    let name = match payload.name {
        Some(name) => {
            if name.trim().is_empty() {
                return Err(AppError::validation("name", "Name must not be empty"));
            }
            name.trim().to_string()
        }
        None => plan.name.clone(),
    };
    let start_date = payload.start_date.unwrap_or(plan.start_date);
    let end_date = payload.end_date.unwrap_or(plan.end_date);
    if !Plan::validate_date_range(start_date, end_date) {
        return Err(AppError::validation("end_date", ERR_PLAN_DATE_RANGE));
    }

    let goals = match payload.goals {
        Some(goals) => {
            validate_goals(&goals)?;
            goals
        }
        None => plan.goals.0.clone(),
    };
    let status = payload.status.unwrap_or(plan.status);
    let description = payload.description.or(plan.description.clone());

    // Only an active plan occupies its date range
    if status == PlanStatus::Active {
        check_no_active_overlap(&state.pool, user.id, start_date, end_date, id).await?;
    }

    sqlx::query(
        "UPDATE plans SET name = ?, description = ?, start_date = ?, end_date = ?, goals = ?, status = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(start_date)
    .bind(end_date)
    .bind(SqlJson(&goals))
    .bind(status)
    .bind(Utc::now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;
    Ok(envelope(plan))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;

    sqlx::query("DELETE FROM plans WHERE id = ?")
        .bind(plan.id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Plan deleted" })))
}

/// Progress statistics for a plan
///
/// Aggregates completed study sessions linked to the plan into per-day
/// buckets and compares totals against the goal targets.
pub async fn plan_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let plan = fetch_owned_plan(&state.pool, id, user.id).await?;

    // Only sessions dated inside the plan's range count toward its progress
    let rows: Vec<(String, f64, i64)> = sqlx::query_as(
        "SELECT date(starts_at) AS day, \
                SUM((julianday(ends_at) - julianday(starts_at)) * 1440.0) AS minutes, \
                COUNT(*) AS sessions \
         FROM study_sessions \
         WHERE user_id = ? AND plan_id = ? AND status = 'completed' \
         AND date(starts_at) >= ? AND date(starts_at) <= ? \
         GROUP BY day ORDER BY day",
    )
    .bind(user.id)
    .bind(plan.id)
    .bind(plan.start_date)
    .bind(plan.end_date)
    .fetch_all(&state.pool)
    .await?;

    let total_minutes: f64 = rows.iter().map(|(_, m, _)| m).sum();
    let completed_sessions: i64 = rows.iter().map(|(_, _, s)| s).sum();
    let daily = rows
        .into_iter()
        .map(|(date, minutes, _)| DailyBucket { date, minutes })
        .collect();

    let (topics_completed,): (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT t.id) FROM topics t \
         JOIN study_sessions s ON s.topic_id = t.id \
         WHERE s.plan_id = ? AND s.user_id = ? AND t.completed = 1 \
         AND date(s.starts_at) >= ? AND date(s.starts_at) <= ?",
    )
    .bind(plan.id)
    .bind(user.id)
    .bind(plan.start_date)
    .bind(plan.end_date)
    .fetch_one(&state.pool)
    .await?;

    let goals = plan.goals.0.clone();
    let plan_days = (plan.end_date - plan.start_date).num_days() + 1;
    let total_hours = total_minutes / 60.0;

    let progress = GoalProgress {
        daily_hours_pct: goals
            .daily_hours
            .map(|target| total_hours / (target * plan_days as f64) * 100.0),
        weekly_hours_pct: goals.weekly_hours.map(|target| {
            let weeks = (plan_days as f64 / 7.0).max(1.0);
            total_hours / (target * weeks) * 100.0
        }),
        topic_pct: goals
            .topic_target
            .map(|target| topics_completed as f64 / target as f64 * 100.0),
    };

    Ok(envelope(PlanStats {
        total_minutes,
        completed_sessions,
        topics_completed,
        daily,
        goals,
        progress,
    }))
}
