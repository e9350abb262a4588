use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::path::Path as FsPath;

use crate::auth::AdminUser;
use crate::constants::BACKUP_RETENTION_COUNT;
use crate::error::{AppError, Result};
use crate::models::Backup;
use crate::routes::envelope;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct CreateBackupRequest {
    pub note: Option<String>,
}

async fn fetch_backup(pool: &sqlx::SqlitePool, id: i64) -> Result<Backup> {
    sqlx::query_as::<_, Backup>("SELECT * FROM backups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Backup"))
}

/// Delete rows and files beyond the newest BACKUP_RETENTION_COUNT snapshots
async fn apply_retention(pool: &sqlx::SqlitePool) -> Result<()> {
    let stale: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, file_path FROM backups ORDER BY created_at DESC, id DESC LIMIT -1 OFFSET ?",
    )
    .bind(BACKUP_RETENTION_COUNT)
    .fetch_all(pool)
    .await?;

    for (id, file_path) in stale {
        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            // The row goes regardless; a missing file is not worth keeping
            // metadata for
            tracing::warn!("Failed to remove stale backup file {}: {}", file_path, e);
        }
        sqlx::query("DELETE FROM backups WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        tracing::info!("Retention removed backup {}", id);
    }

    Ok(())
}

/// Create a snapshot of the live database (admin)
///
/// Uses SQLite's `VACUUM INTO`, which produces a consistent copy without
/// blocking readers, then trims old snapshots down to the retention cap.
pub async fn create_backup(
    State(state): State<AppState>,
    _admin: AdminUser,
    payload: Option<Json<CreateBackupRequest>>,
) -> Result<impl IntoResponse> {
    let note = payload.and_then(|Json(p)| p.note);

    tokio::fs::create_dir_all(&state.config.backup_dir).await?;

    let now = Utc::now();
    let file_name = Backup::file_name_for(now);
    let file_path = FsPath::new(&state.config.backup_dir)
        .join(&file_name)
        .to_string_lossy()
        .into_owned();

    // VACUUM INTO takes a literal path; single quotes are doubled per SQL rules
    let quoted = file_path.replace('\'', "''");
    sqlx::query(&format!("VACUUM INTO '{}'", quoted))
        .execute(&state.pool)
        .await?;

    let size_bytes = tokio::fs::metadata(&file_path).await?.len() as i64;

    let id = sqlx::query(
        "INSERT INTO backups (file_name, file_path, size_bytes, note, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&file_name)
    .bind(&file_path)
    .bind(size_bytes)
    .bind(&note)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    apply_retention(&state.pool).await?;

    let backup = fetch_backup(&state.pool, id).await?;
    tracing::info!("Backup {} created: {} ({} bytes)", id, file_name, size_bytes);

    Ok((StatusCode::CREATED, envelope(backup)))
}

/// List snapshots, newest first (admin)
pub async fn list_backups(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse> {
    let backups =
        sqlx::query_as::<_, Backup>("SELECT * FROM backups ORDER BY created_at DESC, id DESC")
            .fetch_all(&state.pool)
            .await?;

    Ok(envelope(backups))
}

/// Restore a snapshot over the live database file (admin)
///
/// Copies the snapshot back to the configured database path. Connections
/// already in the pool keep serving the previous file until the server is
/// restarted; the caller is told so.
pub async fn restore_backup(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let backup = fetch_backup(&state.pool, id).await?;

    if tokio::fs::metadata(&backup.file_path).await.is_err() {
        tracing::error!("Backup file missing on disk: {}", backup.file_path);
        return Err(AppError::NotFound("Backup file"));
    }

    tokio::fs::copy(&backup.file_path, &state.config.database_path).await?;

    tracing::info!("Backup {} restored over {}", id, state.config.database_path);

    Ok(envelope(json!({
        "message": "Backup restored; restart the server to load it",
        "file_name": backup.file_name,
    })))
}

/// Delete a snapshot and its file (admin)
pub async fn delete_backup(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let backup = fetch_backup(&state.pool, id).await?;

    if let Err(e) = tokio::fs::remove_file(&backup.file_path).await {
        tracing::warn!("Failed to remove backup file {}: {}", backup.file_path, e);
    }

    sqlx::query("DELETE FROM backups WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(envelope(json!({ "message": "Backup deleted" })))
}
