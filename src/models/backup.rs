use chrono::{DateTime, Utc};
use serde::Serialize;

/// Backup metadata row pointing at a snapshot file on disk
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Backup {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub size_bytes: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Backup {
    /// Timestamped snapshot file name, e.g.
    /// `studyplan-20260831-142501-000000000.db`
    ///
    /// Nanosecond suffix keeps names unique when snapshots land in the same
    /// second (`VACUUM INTO` refuses to overwrite an existing file).
    pub fn file_name_for(now: DateTime<Utc>) -> String {
        format!("studyplan-{}.db", now.format("%Y%m%d-%H%M%S-%f"))
    }
}
