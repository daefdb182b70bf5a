//! # patch-data
//!
//! The I/O half of the PaT-CH data layer: runs statements built with
//! `patch-sql-core` against SQLite, one transaction per call, and keeps
//! user accounts in a repository with a write-behind cache.
//!
//! This crate provides:
//! - [`DataBase`], the transaction executor with `create_table`,
//!   `delete_table`, `select`, `insert`, `update` and `delete`
//! - [`BulkCopy`] and [`SqliteCopy`] for the count-checked bulk insert path
//! - [`UserDb`], the user repository with Argon2 password hashing
//! - [`CacheClient`], [`MemoryCache`] and [`CacheWriter`] for cache-aside
//!   user lookups
//! - [`ConfigMap`] and [`DataConfig`] for settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use patch_data::{DataBase, DataConfig};
//! use patch_sql_core::{fields, DbField, DbValue, WhereMap};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DataBase::connect(DataConfig::default()).await?;
//! db.create_table("t", vec![DbField::new("k", "TEXT"), DbField::new("v", "TEXT")], None)
//!     .await?;
//! db.insert("t", fields(&["k", "v"]), vec![vec![DbValue::from("a"), DbValue::from("1")]])
//!     .await?;
//! let rows = db.select("t", vec![], Some(WhereMap::eq("k", "a")), None).await?;
//! assert_eq!(rows.len(), 1);
//!
//! let users = db.users();
//! users.create_table().await?;
//! let ada = users.create("ada", "ada@example.com", "secret").await?;
//! assert_eq!(users.authenticate("ada@example.com", "secret").await?.id(), ada.id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Events are emitted with `tracing` under the span given to
//! [`DataBase::with_span`]. Nothing here installs a subscriber.

pub mod bootstrap;
mod bulk;
mod cache;
mod config;
mod db;
mod error;
mod password;
mod rows;
mod transaction;
pub mod users;

pub use bulk::{copy_into, BulkCopy, SqliteCopy};
pub use cache::{CacheClient, CacheError, CacheWriter, MemoryCache};
pub use config::{ConfigMap, DataConfig, SUB_SEPARATOR};
pub use db::DataBase;
pub use error::{DataError, Result};
pub use password::{hash_password, verify_password};
pub use rows::{DbResult, DbRow};
pub use transaction::{AccessMode, Tx};
pub use users::{User, UserDb, UserError, UserPatch};
