/// User account types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sanitized view of a user account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with the stored credential, for login verification only
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    /// Encoded Argon2id hash (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
    pub password_hash: String,
}
