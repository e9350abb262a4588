use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Study session status
///
/// Sessions in `planned` or `in_progress` hold their time slot and block
/// overlapping sessions; the other states release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Paused,
}

impl SessionStatus {
    /// Statuses that occupy a time slot for the overlap check
    pub fn blocks_slot(&self) -> bool {
        matches!(self, SessionStatus::Planned | SessionStatus::InProgress)
    }
}

/// Pomodoro configuration stored on a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub break_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_break_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u32>,
}

impl PomodoroSettings {
    /// Intervals must be positive; zero-length work or break makes no sense
    pub fn validate(&self) -> bool {
        self.work_minutes > 0
            && self.break_minutes > 0
            && self.long_break_minutes.map_or(true, |m| m > 0)
            && self.cycles.map_or(true, |c| c > 0)
    }
}

/// Study session row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub course_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub pomodoro: Option<Json<PomodoroSettings>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudySession {
    /// A session's time box is valid when it ends strictly after it starts
    pub fn validate_time_range(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> bool {
        ends_at > starts_at
    }

    /// Half-open interval overlap: existing blocks new when
    /// `existing.starts_at < new.ends_at AND existing.ends_at > new.starts_at`
    pub fn overlaps(
        existing_start: DateTime<Utc>,
        existing_end: DateTime<Utc>,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> bool {
        existing_start < new_end && existing_end > new_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_time_range() {
        assert!(StudySession::validate_time_range(
            t("2026-03-01T10:00:00Z"),
            t("2026-03-01T11:00:00Z")
        ));
        assert!(!StudySession::validate_time_range(
            t("2026-03-01T10:00:00Z"),
            t("2026-03-01T10:00:00Z")
        ));
    }

    #[test]
    fn test_overlap_predicate() {
        let (s, e) = (t("2026-03-01T10:00:00Z"), t("2026-03-01T11:00:00Z"));

        // Partial overlap on either side
        assert!(StudySession::overlaps(
            s,
            e,
            t("2026-03-01T10:30:00Z"),
            t("2026-03-01T11:30:00Z")
        ));
        assert!(StudySession::overlaps(
            s,
            e,
            t("2026-03-01T09:30:00Z"),
            t("2026-03-01T10:30:00Z")
        ));

        // Back-to-back sessions do not overlap
        assert!(!StudySession::overlaps(
            s,
            e,
            t("2026-03-01T11:00:00Z"),
            t("2026-03-01T12:00:00Z")
        ));
        assert!(!StudySession::overlaps(
            s,
            e,
            t("2026-03-01T09:00:00Z"),
            t("2026-03-01T10:00:00Z")
        ));
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(SessionStatus::Planned.blocks_slot());
        assert!(SessionStatus::InProgress.blocks_slot());
        assert!(!SessionStatus::Completed.blocks_slot());
        assert!(!SessionStatus::Cancelled.blocks_slot());
        assert!(!SessionStatus::Paused.blocks_slot());
    }

    #[test]
    fn test_pomodoro_validation() {
        let ok = PomodoroSettings {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: Some(15),
            cycles: Some(4),
        };
        assert!(ok.validate());

        let zero_work = PomodoroSettings {
            work_minutes: 0,
            break_minutes: 5,
            long_break_minutes: None,
            cycles: None,
        };
        assert!(!zero_work.validate());
    }
}
