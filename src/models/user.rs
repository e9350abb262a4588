use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::constants::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN};

/// User role controlling access to admin endpoints and global catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Admin,
}

/// User row as stored in SQLite
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub preferences: Json<serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User shape returned by the API (never includes the password hash)
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub preferences: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            preferences: user.preferences.0,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl User {
    /// Validate a username: 3-50 chars, letters/digits/underscore/hyphen/dot
    pub fn validate_username(username: &str) -> bool {
        let len = username.chars().count();
        (3..=MAX_USERNAME_LEN).contains(&len)
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    }

    /// Minimal email shape check: non-empty local part, '@', dotted domain
    pub fn validate_email(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && email.len() <= 254
            && !email.contains(char::is_whitespace)
    }

    /// Validate password length
    pub fn validate_password(password: &str) -> bool {
        password.chars().count() >= MIN_PASSWORD_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("alice"));
        assert!(User::validate_username("bob_42.x-y"));

        // Too short
        assert!(!User::validate_username("ab"));

        // Too long
        assert!(!User::validate_username(&"a".repeat(51)));

        // Invalid characters
        assert!(!User::validate_username("has space"));
        assert!(!User::validate_username("naïve"));
    }

    #[test]
    fn test_validate_email() {
        assert!(User::validate_email("alice@example.com"));
        assert!(User::validate_email("a.b+c@sub.example.org"));

        assert!(!User::validate_email("no-at-sign"));
        assert!(!User::validate_email("@example.com"));
        assert!(!User::validate_email("alice@nodot"));
        assert!(!User::validate_email("alice@.com"));
        assert!(!User::validate_email("alice @example.com"));
    }

    #[test]
    fn test_validate_password() {
        assert!(User::validate_password("12345678"));
        assert!(!User::validate_password("1234567"));
    }
}
