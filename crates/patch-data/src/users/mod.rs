//! User accounts stored in one table, with cache-aside reads.
//!
//! Every lookup that produces a [`User`] queues a cache write under the
//! user's name, e-mail and id keys, and every delete queues the matching
//! evictions. The caller never waits for the cache; its failures are only
//! logged.

mod error;
mod user;

use std::collections::BTreeMap;

use chrono::Utc;
use patch_sql_core::{fields, DbField, DbValue, FieldName, WhereMap};
use tracing::{debug, error, info, warn, Span};

pub use error::{Result, UserError};
pub use user::{email_key, id_key, name_key, User, UserPatch, CACHE_PREFIX};

use crate::db::DataBase;
use crate::error::DataError;
use crate::password::{hash_off_runtime, verify_off_runtime};
use crate::rows::DbRow;

const USER_FIELDS: [&str; 5] = ["id", "name", "email", "created_at", "updated_at"];
const PASSWORD_FIELD: &str = "password";

/// Repository of user accounts.
#[derive(Debug, Clone)]
pub struct UserDb {
    db: DataBase,
    table: String,
    span: Span,
}

impl UserDb {
    /// Creates a repository on `table`. The name is trimmed and lower-cased.
    #[must_use]
    pub fn new(db: DataBase, table: &str) -> Self {
        let table = normalize(table);
        let span = tracing::debug_span!(parent: db.span(), "users", table = %table);
        Self { db, table, span }
    }

    /// Moves the repository to another table.
    pub fn set_table_name(&mut self, table: &str) {
        self.table = normalize(table);
        self.span = tracing::debug_span!(parent: self.db.span(), "users", table = %self.table);
    }

    /// The table users are stored in.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Creates the user table if it does not exist.
    pub async fn create_table(&self) -> Result<()> {
        let columns = vec![
            DbField::new("id", "INTEGER").constraint("PRIMARY KEY AUTOINCREMENT"),
            DbField::new("name", "TEXT").constraint("NOT NULL UNIQUE"),
            DbField::new("email", "TEXT").constraint("NOT NULL UNIQUE"),
            DbField::new(PASSWORD_FIELD, "TEXT").constraint("NOT NULL"),
            DbField::new("created_at", "DATETIME").constraint("NOT NULL"),
            DbField::new("updated_at", "DATETIME").constraint("NOT NULL"),
        ];
        self.db.create_table(&self.table, columns, None).await?;
        Ok(())
    }

    /// Registers a user and returns it as stored.
    pub async fn create(&self, name: &str, email: &str, password: &str) -> Result<User> {
        check_name(name)?;

        // Sequential probes; the unique constraints catch what slips between
        // them.
        for filter in [WhereMap::eq("name", name), WhereMap::eq("email", email)] {
            match self.find(filter).await {
                Ok(_) => return Err(UserError::UserExists),
                Err(UserError::NoUser) => {}
                Err(e) => return Err(e),
            }
        }

        let hash = hash_off_runtime(password).await?;
        let now = Utc::now();
        let row = vec![
            DbValue::from(name),
            DbValue::from(email),
            DbValue::from(hash),
            DbValue::from(now),
            DbValue::from(now),
        ];
        self.db
            .insert(
                &self.table,
                fields(&["name", "email", PASSWORD_FIELD, "created_at", "updated_at"]),
                vec![row],
            )
            .await
            .map_err(conflict_as_exists)?;

        let user = match self.find(WhereMap::eq("name", name)).await {
            Ok(user) => user,
            Err(UserError::NoUser) => {
                error!(parent: &self.span, name, "user missing right after insert");
                return Err(UserError::CreateUser);
            }
            Err(e) => return Err(e),
        };
        info!(parent: &self.span, id = user.id(), name = %user.name, "created user");
        self.cache_user(&user);
        Ok(user)
    }

    /// Looks a user up by name.
    pub async fn get_by_name(&self, name: &str) -> Result<User> {
        self.get(name_key(name), WhereMap::eq("name", name), |u| u.name == name)
            .await
    }

    /// Looks a user up by e-mail.
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        self.get(email_key(email), WhereMap::eq("email", email), |u| {
            u.email == email
        })
        .await
    }

    /// Looks a user up by id.
    pub async fn get_by_id(&self, id: i64) -> Result<User> {
        self.get(id_key(id), WhereMap::eq("id", id), |u| u.id() == id)
            .await
    }

    /// Every user, in id order.
    pub async fn get_all(&self) -> Result<Vec<User>> {
        let rows = self
            .db
            .select(&self.table, fields(&USER_FIELDS), None, Some("ORDER BY id"))
            .await?;
        let users = rows
            .iter()
            .map(|row| self.hydrate(row))
            .collect::<Result<Vec<_>>>()?;
        for user in &users {
            self.cache_user(user);
        }
        Ok(users)
    }

    /// Applies `patch` to `user` and returns the stored result. The password
    /// is left alone.
    pub async fn update(&self, user: &User, patch: UserPatch) -> Result<User> {
        let mut assignments = BTreeMap::<FieldName, DbValue>::new();
        if let Some(name) = &patch.name {
            check_name(name)?;
            assignments.insert("name".into(), name.into());
        }
        if let Some(email) = &patch.email {
            assignments.insert("email".into(), email.into());
        }
        assignments.insert("updated_at".into(), Utc::now().into());

        self.db
            .update(&self.table, assignments, Some(WhereMap::eq("id", user.id())))
            .await
            .map_err(conflict_as_exists)?;

        let updated = self.find(WhereMap::eq("id", user.id())).await?;
        info!(parent: &self.span, id = updated.id(), name = %updated.name, "updated user");
        self.evict_user(user);
        self.cache_user(&updated);
        Ok(updated)
    }

    /// Replaces the password of `user`.
    pub async fn update_password(&self, user: &User, password: &str) -> Result<User> {
        let hash = hash_off_runtime(password).await?;
        let assignments = BTreeMap::from([
            (FieldName::from(PASSWORD_FIELD), DbValue::from(hash)),
            (FieldName::from("updated_at"), DbValue::from(Utc::now())),
        ]);
        self.db
            .update(&self.table, assignments, Some(WhereMap::eq("id", user.id())))
            .await?;

        let updated = self.find(WhereMap::eq("id", user.id())).await?;
        info!(parent: &self.span, id = updated.id(), "changed password");
        self.cache_user(&updated);
        Ok(updated)
    }

    /// Deletes the user with `id`.
    pub async fn delete_by_id(&self, id: i64) -> Result<()> {
        let user = self.find(WhereMap::eq("id", id)).await?;
        self.remove(&user).await
    }

    /// Deletes the user called `name`.
    pub async fn delete_by_name(&self, name: &str) -> Result<()> {
        let user = self.find(WhereMap::eq("name", name)).await?;
        self.remove(&user).await
    }

    /// Checks a password for a name or, when it contains `@`, an e-mail.
    pub async fn authenticate(&self, name_or_email: &str, password: &str) -> Result<User> {
        if name_or_email.contains('@') {
            self.authenticate_by_email(name_or_email, password).await
        } else {
            self.authenticate_by_name(name_or_email, password).await
        }
    }

    /// Checks the password of the user called `name`.
    pub async fn authenticate_by_name(&self, name: &str, password: &str) -> Result<User> {
        self.authenticate_where(WhereMap::eq("name", name), password)
            .await
    }

    /// Checks the password of the user with e-mail `email`.
    pub async fn authenticate_by_email(&self, email: &str, password: &str) -> Result<User> {
        self.authenticate_where(WhereMap::eq("email", email), password)
            .await
    }

    async fn authenticate_where(&self, filter: WhereMap, password: &str) -> Result<User> {
        let mut columns = fields(&USER_FIELDS);
        columns.push(PASSWORD_FIELD.into());
        let row = self
            .db
            .select(&self.table, columns, Some(filter), Some("LIMIT 1"))
            .await?
            .into_iter()
            .next()
            .ok_or(UserError::NoUser)?;

        let user = self.hydrate(&row)?;
        let hash = row
            .get(PASSWORD_FIELD)
            .and_then(DbValue::as_str)
            .unwrap_or_default();
        if !verify_off_runtime(password, hash).await {
            debug!(parent: &self.span, id = user.id(), "password mismatch");
            return Err(UserError::InvalidCredentials);
        }
        self.cache_user(&user);
        Ok(user)
    }

    async fn remove(&self, user: &User) -> Result<()> {
        self.db
            .delete(&self.table, Some(WhereMap::eq("id", user.id())))
            .await?;
        info!(parent: &self.span, id = user.id(), name = %user.name, "deleted user");
        self.evict_user(user);
        Ok(())
    }

    /// Cache-first lookup. Names, e-mails and ids share one key space, so a
    /// cached entry only counts when `matches` accepts it.
    async fn get(
        &self,
        key: String,
        filter: WhereMap,
        matches: impl Fn(&User) -> bool + Send,
    ) -> Result<User> {
        match self.cached(&key).await {
            Some(user) if matches(&user) => {
                debug!(parent: &self.span, key = %key, "cache hit");
                return Ok(user);
            }
            Some(user) => {
                debug!(parent: &self.span, key = %key, id = user.id(), "cache entry belongs to another user");
            }
            None => {}
        }
        let user = self.find(filter).await?;
        self.cache_user(&user);
        Ok(user)
    }

    /// Reads one user from the store, bypassing the cache.
    async fn find(&self, filter: WhereMap) -> Result<User> {
        let rows = self
            .db
            .select(&self.table, fields(&USER_FIELDS), Some(filter), Some("LIMIT 1"))
            .await?;
        rows.first()
            .map_or(Err(UserError::NoUser), |row| self.hydrate(row))
    }

    fn hydrate(&self, row: &DbRow) -> Result<User> {
        User::from_row(row).ok_or_else(|| {
            error!(parent: &self.span, columns = row.len(), "malformed user row");
            UserError::Data(DataError::Select)
        })
    }

    async fn cached(&self, key: &str) -> Option<User> {
        let client = self.db.cache()?.client();
        let text = match client.get(key).await {
            Ok(text) => text?,
            Err(e) => {
                warn!(parent: &self.span, key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(parent: &self.span, key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn cache_user(&self, user: &User) {
        let Some(cache) = self.db.cache() else {
            return;
        };
        match serde_json::to_string(user) {
            Ok(json) => {
                for key in user.cache_keys() {
                    cache.store(key, json.clone());
                }
            }
            Err(e) => warn!(parent: &self.span, id = user.id(), error = %e, "cannot encode user for cache"),
        }
    }

    fn evict_user(&self, user: &User) {
        if let Some(cache) = self.db.cache() {
            for key in user.cache_keys() {
                cache.evict(key);
            }
        }
    }
}

fn normalize(table: &str) -> String {
    table.trim().to_lowercase()
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(UserError::InvalidName);
    }
    Ok(())
}

fn conflict_as_exists(e: DataError) -> UserError {
    match e {
        DataError::Conflict => UserError::UserExists,
        other => UserError::Data(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_check() {
        assert!(check_name("ada").is_ok());
        assert!(matches!(check_name("ada lovelace"), Err(UserError::InvalidName)));
        assert!(matches!(check_name("ada\t"), Err(UserError::InvalidName)));
        assert!(matches!(check_name(""), Err(UserError::InvalidName)));
    }

    #[test]
    fn test_table_name_is_normalized() {
        assert_eq!(normalize("  Users "), "users");
    }

    #[test]
    fn test_conflict_translation() {
        assert!(matches!(
            conflict_as_exists(DataError::Conflict),
            UserError::UserExists
        ));
        assert!(matches!(
            conflict_as_exists(DataError::Insert),
            UserError::Data(DataError::Insert)
        ));
    }
}
