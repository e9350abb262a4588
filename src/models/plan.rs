use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Completed,
    Archived,
}

/// Goal targets stored in the plan's `goals` JSON blob
///
/// All fields are optional; absent targets are simply not tracked in the
/// plan's progress statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanGoals {
    /// Target study hours per day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_hours: Option<f64>,
    /// Target study hours per week
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_hours: Option<f64>,
    /// Number of topics to complete over the plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_target: Option<i64>,
    /// Free-form priority label (e.g. "high")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// Plan row: a user-owned date range with goal targets
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Plan {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub goals: Json<PlanGoals>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// A plan's date range is valid when the end date is strictly after the start
    pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> bool {
        end > start
    }

    /// Inclusive date-range overlap used to enforce the single-active-plan rule
    pub fn ranges_overlap(
        a_start: NaiveDate,
        a_end: NaiveDate,
        b_start: NaiveDate,
        b_end: NaiveDate,
    ) -> bool {
        a_start <= b_end && a_end >= b_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_date_range() {
        assert!(Plan::validate_date_range(d("2026-01-01"), d("2026-02-01")));
        assert!(!Plan::validate_date_range(d("2026-01-01"), d("2026-01-01")));
        assert!(!Plan::validate_date_range(d("2026-02-01"), d("2026-01-01")));
    }

    #[test]
    fn test_ranges_overlap() {
        // Partial overlap
        assert!(Plan::ranges_overlap(
            d("2026-01-01"),
            d("2026-01-15"),
            d("2026-01-10"),
            d("2026-01-31")
        ));
        // Containment
        assert!(Plan::ranges_overlap(
            d("2026-01-01"),
            d("2026-01-31"),
            d("2026-01-10"),
            d("2026-01-12")
        ));
        // Shared boundary day counts as overlap
        assert!(Plan::ranges_overlap(
            d("2026-01-01"),
            d("2026-01-10"),
            d("2026-01-10"),
            d("2026-01-20")
        ));
        // Disjoint
        assert!(!Plan::ranges_overlap(
            d("2026-01-01"),
            d("2026-01-09"),
            d("2026-01-10"),
            d("2026-01-20")
        ));
    }

    #[test]
    fn test_goals_blob_defaults() {
        let goals: PlanGoals = serde_json::from_str("{}").unwrap();
        assert!(goals.daily_hours.is_none());
        assert!(goals.topic_target.is_none());
    }
}
