//! Transactions on a pooled connection.
//!
//! A [`Tx`] wraps sqlx's [`Transaction`], so dropping it before
//! [`Tx::finish`] (a cancelled call, a timeout) queues a rollback that runs
//! before the connection is used again. The begin statement is chosen per
//! access mode, and commit and rollback failures come back as their own
//! errors.

use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{error, warn, Span};

use crate::error::{DataError, Result};

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

impl AccessMode {
    /// Picks the mode for a rendered statement: anything that does not
    /// literally start with `SELECT` is treated as a write.
    #[must_use]
    pub fn for_sql(sql: &str) -> Self {
        if sql.starts_with("SELECT") {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }

    /// The statement that opens a transaction in this mode.
    ///
    /// SQLite has no read-only transactions; a deferred transaction takes no
    /// lock until it reads, while an immediate one takes the write lock up
    /// front so a writer never fails halfway on `SQLITE_BUSY`. SQLite
    /// transactions are always serializable.
    #[must_use]
    pub const fn begin_sql(self) -> &'static str {
        match self {
            Self::ReadOnly => "BEGIN DEFERRED",
            Self::ReadWrite => "BEGIN IMMEDIATE",
        }
    }
}

/// Checks a connection out of `pool`.
pub(crate) async fn acquire(pool: &SqlitePool, span: &Span) -> Result<PoolConnection<Sqlite>> {
    pool.acquire().await.map_err(|e| {
        error!(parent: span, error = %e, "failed to acquire connection");
        DataError::TxStart
    })
}

/// An open transaction.
///
/// When [`Tx::commit`] or [`Tx::rollback`] fails the connection's
/// transaction state is unknown; the owner of the connection should close
/// it instead of returning it to the pool.
pub struct Tx<'c> {
    inner: Transaction<'c, Sqlite>,
    mode: AccessMode,
    span: Span,
}

impl<'c> Tx<'c> {
    /// Begins a transaction on `conn`.
    pub async fn begin(
        conn: &'c mut SqliteConnection,
        mode: AccessMode,
        span: &Span,
    ) -> Result<Self> {
        let inner = conn.begin_with(mode.begin_sql()).await.map_err(|e| {
            error!(parent: span, error = %e, ?mode, "failed to begin transaction");
            DataError::TxStart
        })?;
        Ok(Self {
            inner,
            mode,
            span: span.clone(),
        })
    }

    /// The access mode the transaction was opened with.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The connection the transaction runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.inner
    }

    /// Commits the transaction.
    pub async fn commit(self) -> Result<()> {
        let span = self.span;
        self.inner.commit().await.map_err(|e| {
            error!(parent: &span, error = %e, "failed to commit transaction");
            DataError::TxCommit
        })
    }

    /// Rolls the transaction back.
    pub async fn rollback(self) -> Result<()> {
        let span = self.span;
        self.inner.rollback().await.map_err(|e| {
            error!(parent: &span, error = %e, "failed to roll back transaction");
            DataError::TxRollback
        })
    }

    /// Commits on success, rolls back on failure.
    ///
    /// A failed rollback replaces the execution error, which is logged here.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                warn!(parent: &self.span, error = %e, mode = ?self.mode(), "statement failed, rolling back");
                self.rollback().await?;
                Err(e)
            }
        }
    }
}
