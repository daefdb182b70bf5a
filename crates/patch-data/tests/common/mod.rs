#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use patch_data::{CacheClient, DataBase, DataConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// A one-connection pool on a database file, so data outlives a closed
/// connection.
pub async fn create_file_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create file-backed SQLite pool")
}

pub async fn test_db() -> DataBase {
    DataBase::with_pool(create_test_pool().await, DataConfig::default())
}

pub async fn test_db_with_cache(client: Arc<dyn CacheClient>) -> DataBase {
    test_db().await.with_cache(client)
}

pub fn text(row: &patch_data::DbRow, column: &str) -> String {
    row.get(column)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing text column {column} in {row:?}"))
        .to_string()
}
