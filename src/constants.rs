/// Number of backup snapshots retained after each new backup
pub const BACKUP_RETENTION_COUNT: i64 = 5;

/// Minimum password length accepted at registration and password change
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum username length
pub const MAX_USERNAME_LEN: usize = 50;

/// Maximum size in bytes accepted for JSON blobs (preferences, goals, pomodoro)
pub const MAX_JSON_BLOB_BYTES: usize = 16_384;

// =============================================================================
// Error Messages
// =============================================================================

/// Error message for malformed usernames
pub const ERR_INVALID_USERNAME: &str =
    "Username must be 3-50 characters: letters, digits, '_', '-', '.'";

/// Error message for malformed email addresses
pub const ERR_INVALID_EMAIL: &str = "Invalid email address";

/// Error message for passwords below the minimum length
pub const ERR_PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters";

/// Error message for a plan whose end date is not after its start date
pub const ERR_PLAN_DATE_RANGE: &str = "Plan end date must be after start date";

/// Error message for a session whose end is not after its start
pub const ERR_SESSION_TIME_RANGE: &str = "Session end time must be after start time";
