//! The user entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rows::DbRow;

/// Prefix of every user cache key.
pub const CACHE_PREFIX: &str = "user_";

/// A user account, as last read from the store.
///
/// The password hash is not part of the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: i64,
    /// Unique login name, without whitespace.
    pub name: String,
    /// Unique e-mail address.
    pub email: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last changed.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The engine-assigned primary key.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Hydrates a user from a row holding `id`, `name`, `email`,
    /// `created_at` and `updated_at`. Returns `None` if any is missing or
    /// has the wrong kind.
    #[must_use]
    pub fn from_row(row: &DbRow) -> Option<Self> {
        Some(Self {
            id: row.get("id")?.as_i64()?,
            name: row.get("name")?.as_str()?.to_string(),
            email: row.get("email")?.as_str()?.to_string(),
            created_at: row.get("created_at")?.as_timestamp()?,
            updated_at: row.get("updated_at")?.as_timestamp()?,
        })
    }

    /// The keys this user is cached under: by name, by e-mail and by id.
    #[must_use]
    pub fn cache_keys(&self) -> [String; 3] {
        [
            name_key(&self.name),
            email_key(&self.email),
            id_key(self.id),
        ]
    }
}

/// Cache key of a user looked up by name.
#[must_use]
pub fn name_key(name: &str) -> String {
    format!("{CACHE_PREFIX}{name}")
}

/// Cache key of a user looked up by e-mail.
#[must_use]
pub fn email_key(email: &str) -> String {
    format!("{CACHE_PREFIX}{email}")
}

/// Cache key of a user looked up by id.
#[must_use]
pub fn id_key(id: i64) -> String {
    format!("{CACHE_PREFIX}{id}")
}

/// Changes to apply with `UserDb::update`. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    /// New name.
    pub name: Option<String>,
    /// New e-mail.
    pub email: Option<String>,
}

impl UserPatch {
    /// Sets a new name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a new e-mail.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use patch_sql_core::DbValue;

    fn row() -> DbRow {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DbRow::from([
            ("id".to_string(), DbValue::Int(7)),
            ("name".to_string(), DbValue::from("ada")),
            ("email".to_string(), DbValue::from("ada@example.com")),
            ("created_at".to_string(), DbValue::Timestamp(ts)),
            (
                "updated_at".to_string(),
                DbValue::from("2024-05-02 08:30:00"),
            ),
        ])
    }

    #[test]
    fn test_from_row() {
        let user = User::from_row(&row()).unwrap();
        assert_eq!(user.id(), 7);
        assert_eq!(user.name, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.updated_at > user.created_at);
    }

    #[test]
    fn test_from_row_missing_column() {
        let mut row = row();
        row.remove("email");
        assert!(User::from_row(&row).is_none());

        let mut row = self::row();
        row.insert("id".to_string(), DbValue::Null);
        assert!(User::from_row(&row).is_none());
    }

    #[test]
    fn test_cache_keys() {
        let user = User::from_row(&row()).unwrap();
        assert_eq!(
            user.cache_keys(),
            ["user_ada", "user_ada@example.com", "user_7"].map(String::from)
        );
    }

    #[test]
    fn test_json_keeps_id() {
        let user = User::from_row(&row()).unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"id\":7"));
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_patch() {
        assert!(UserPatch::default().is_empty());
        let patch = UserPatch::default().email("new@example.com");
        assert!(!patch.is_empty());
        assert_eq!(patch.name, None);
    }
}
