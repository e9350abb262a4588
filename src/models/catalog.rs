use chrono::{DateTime, Utc};
use serde::Serialize;

/// Category row: top level of the catalog hierarchy
///
/// `user_id = NULL` marks a global entry visible to everyone and managed by
/// admins; otherwise the row belongs to (and is visible to) one user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course row, ordered within its category by `sort_order`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: i64,
    pub category_id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Topic row, ordered within its course by `sort_order` (unique per course)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// True when a catalog entry may be modified by the given caller
///
/// Global entries (no owner) are admin-managed; owned entries are writable by
/// their owner or an admin.
pub fn can_modify(owner: Option<i64>, caller_id: i64, caller_is_admin: bool) -> bool {
    match owner {
        None => caller_is_admin,
        Some(owner_id) => owner_id == caller_id || caller_is_admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_modify_global_entry() {
        assert!(can_modify(None, 1, true));
        assert!(!can_modify(None, 1, false));
    }

    #[test]
    fn test_can_modify_owned_entry() {
        assert!(can_modify(Some(1), 1, false));
        assert!(can_modify(Some(1), 2, true));
        assert!(!can_modify(Some(1), 2, false));
    }
}
