//! The bulk insert path.
//!
//! Rows never go through the statement builder. They are handed to a
//! [`BulkCopy`] implementation on the transaction's connection, and the
//! number of rows it reports as copied is checked against the input.

use async_trait::async_trait;
use patch_sql_core::{DbValue, FieldName, InsertArgs};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn, Span};

use crate::error::{DataError, Result};
use crate::rows::bind;

/// Streams rows into a table.
#[async_trait]
pub trait BulkCopy: Send + Sync {
    /// Copies `rows` into `table` and returns how many rows the engine
    /// accepted.
    async fn copy_rows(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        fields: &[FieldName],
        rows: &[Vec<DbValue>],
    ) -> std::result::Result<u64, sqlx::Error>;
}

/// SQLite has no COPY protocol; rows are sent as multi-row parameterized
/// `INSERT ... VALUES (...), (...)` statements, as many rows per statement
/// as the bind parameter limit allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCopy;

impl SqliteCopy {
    /// `SQLITE_MAX_VARIABLE_NUMBER` for SQLite 3.32 and later.
    pub const MAX_PARAMS: usize = 32_766;
}

#[async_trait]
impl BulkCopy for SqliteCopy {
    async fn copy_rows(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        fields: &[FieldName],
        rows: &[Vec<DbValue>],
    ) -> std::result::Result<u64, sqlx::Error> {
        let columns = fields
            .iter()
            .map(FieldName::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        let per_chunk = (Self::MAX_PARAMS / fields.len().max(1)).max(1);

        let mut copied = 0;
        for chunk in rows.chunks(per_chunk) {
            let tuples = chunk
                .iter()
                .map(|row| format!("({})", vec!["?"; row.len()].join(", ")))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("INSERT INTO {table} ({columns}) VALUES {tuples}");

            let mut query = sqlx::query(&sql);
            for value in chunk.iter().flatten() {
                query = bind(query, value);
            }
            copied += query.execute(&mut *conn).await?.rows_affected();
        }
        Ok(copied)
    }
}

/// Runs the bulk path for `args` on an open transaction's connection.
///
/// Rows whose length differs from the field list are logged, not rejected;
/// the engine decides whether it accepts them.
pub async fn copy_into(
    copier: &dyn BulkCopy,
    conn: &mut SqliteConnection,
    args: &InsertArgs,
    span: &Span,
) -> Result<()> {
    for (i, row) in args.rows.iter().enumerate() {
        if row.len() != args.fields.len() {
            warn!(
                parent: span,
                row = i,
                values = row.len(),
                fields = args.fields.len(),
                "number of values does not match number of fields"
            );
        }
    }

    let expected = args.rows.len() as u64;
    debug!(parent: span, table = %args.table, rows = expected, "copying rows");
    let copied = copier
        .copy_rows(conn, &args.table, &args.fields, &args.rows)
        .await
        .map_err(|e| {
            error!(parent: span, table = %args.table, error = %e, "bulk copy failed");
            match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => DataError::Conflict,
                _ => DataError::Insert,
            }
        })?;

    if copied != expected {
        error!(
            parent: span,
            table = %args.table,
            expected,
            copied,
            "bulk copy did not insert every row"
        );
        return Err(DataError::InsertCount { expected, copied });
    }

    info!(parent: span, table = %args.table, rows = copied, "inserted rows");
    Ok(())
}
