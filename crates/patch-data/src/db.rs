//! The transaction executor.
//!
//! Every operation runs in its own transaction: begin, execute, then commit
//! or roll back. The access mode is chosen from the rendered statement.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use patch_sql_core::{
    args, DbConstraint, DbField, DbTable, DbValue, FieldName, Method, Statement, WhereMap,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, error, info, warn, Span};

use crate::bootstrap;
use crate::bulk::{copy_into, BulkCopy, SqliteCopy};
use crate::cache::{CacheClient, CacheWriter, MemoryCache};
use crate::config::DataConfig;
use crate::error::{DataError, Result};
use crate::rows::{materialize, DbResult};
use crate::transaction::{acquire, AccessMode, Tx};
use crate::users::UserDb;

/// Handle to the database.
///
/// Cloning is cheap; clones share the pool, the bulk copier and the cache
/// writer.
#[derive(Clone)]
pub struct DataBase {
    pool: SqlitePool,
    config: DataConfig,
    span: Span,
    bulk: Arc<dyn BulkCopy>,
    cache: Option<Arc<CacheWriter>>,
}

impl DataBase {
    /// Opens a pool for `config.url` and checks that it answers.
    ///
    /// With `use_cache` set, users are cached in a [`MemoryCache`]; use
    /// [`DataBase::with_cache`] for another client.
    pub async fn connect(config: DataConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DataError::Config(format!("url: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to open database");
                DataError::Connect
            })?;

        sqlx::query("SELECT 1").execute(&pool).await.map_err(|e| {
            error!(error = %e, "database did not answer");
            DataError::Connect
        })?;

        let use_cache = config.use_cache;
        let db = Self::with_pool(pool, config);
        if use_cache {
            Ok(db.with_cache(Arc::new(MemoryCache::new())))
        } else {
            Ok(db)
        }
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn with_pool(pool: SqlitePool, config: DataConfig) -> Self {
        Self {
            pool,
            config,
            span: Span::none(),
            bulk: Arc::new(SqliteCopy),
            cache: None,
        }
    }

    /// Sets the span all events are recorded under.
    ///
    /// Call before [`DataBase::with_cache`] so the cache worker logs under it
    /// too.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replaces the bulk insert implementation.
    #[must_use]
    pub fn with_bulk_copy(mut self, bulk: Arc<dyn BulkCopy>) -> Self {
        self.bulk = bulk;
        self
    }

    /// Caches users in `client`, through a background writer.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn with_cache(mut self, client: Arc<dyn CacheClient>) -> Self {
        let span = tracing::debug_span!(parent: &self.span, "cache");
        self.cache = Some(Arc::new(CacheWriter::new(
            client,
            self.config.cache_queue,
            &span,
        )));
        self
    }

    /// The connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The configuration the handle was built with.
    #[must_use]
    pub const fn config(&self) -> &DataConfig {
        &self.config
    }

    /// The span events are recorded under.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// The cache writer, if caching is on.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<CacheWriter>> {
        self.cache.as_ref()
    }

    /// The user repository on the configured user table.
    #[must_use]
    pub fn users(&self) -> UserDb {
        UserDb::new(self.clone(), &self.config.user_table)
    }

    /// Drains the cache queue and closes the pool.
    pub async fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.shutdown().await;
        }
        self.pool.close().await;
        info!(parent: &self.span, "database closed");
    }

    /// Runs one statement in its own transaction.
    ///
    /// SELECT returns its rows; every other kind returns no rows.
    pub async fn execute(&self, statement: Statement) -> Result<DbResult> {
        args::check(&statement).map_err(|e| {
            warn!(parent: &self.span, method = %statement.method(), error = %e, "invalid arguments");
            DataError::from(e)
        })?;

        let sql = statement.to_sql();
        let mode = AccessMode::for_sql(&sql);
        debug!(
            parent: &self.span,
            method = %statement.method(),
            table = %statement.table(),
            sql = %sql,
            ?mode,
            "executing statement"
        );

        let mut conn = acquire(&self.pool, &self.span).await?;
        let mut tx = Tx::begin(&mut conn, mode, &self.span).await?;
        let outcome = self.run(&mut tx, &statement, &sql).await;
        let result = tx.finish(outcome).await;
        release(&mut conn, &result);
        result
    }

    async fn run(&self, tx: &mut Tx<'_>, statement: &Statement, sql: &str) -> Result<DbResult> {
        let method = statement.method();
        match statement {
            Statement::Select(_) => {
                let rows = sqlx::query(sql)
                    .fetch_all(tx.conn())
                    .await
                    .map_err(|e| self.driver_error(method, sql, &e))?;
                rows.iter()
                    .map(materialize)
                    .collect::<std::result::Result<DbResult, _>>()
                    .map_err(|e| self.driver_error(method, sql, &e))
            }
            Statement::Insert(args) => {
                copy_into(self.bulk.as_ref(), tx.conn(), args, &self.span).await?;
                Ok(DbResult::new())
            }
            _ => {
                let done = sqlx::query(sql)
                    .execute(tx.conn())
                    .await
                    .map_err(|e| self.driver_error(method, sql, &e))?;
                debug!(parent: &self.span, rows = done.rows_affected(), "statement executed");
                Ok(DbResult::new())
            }
        }
    }

    fn driver_error(&self, method: Method, sql: &str, e: &sqlx::Error) -> DataError {
        error!(parent: &self.span, %method, sql = %sql, error = %e, "statement failed");
        match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DataError::Conflict,
            _ => DataError::for_method(method),
        }
    }

    /// Creates `name` if it does not exist.
    pub async fn create_table(
        &self,
        name: &str,
        fields: Vec<DbField>,
        constraint: Option<DbConstraint>,
    ) -> Result<()> {
        let mut table = DbTable::new(name, fields);
        if let Some(constraint) = constraint {
            table = table.with_constraint(constraint);
        }
        self.execute(table.into()).await?;
        info!(parent: &self.span, table = %name, "created table");
        Ok(())
    }

    /// Drops `name`, refusing with [`DataError::TableNotEmpty`] while it has
    /// rows.
    ///
    /// The emptiness check and the drop are separate transactions.
    pub async fn delete_table(&self, name: &str) -> Result<()> {
        let probe = self
            .select(name, Vec::new(), None, Some("LIMIT 1"))
            .await
            .map_err(|e| {
                warn!(parent: &self.span, table = %name, error = %e, "cannot check table before drop");
                DataError::Select
            })?;
        if !probe.is_empty() {
            return Err(DataError::TableNotEmpty);
        }

        self.execute(Statement::drop_table(name)).await?;
        info!(parent: &self.span, table = %name, "dropped table");
        Ok(())
    }

    /// Reads `fields` (all columns when empty) from `table`.
    ///
    /// `extra` is appended verbatim after the predicate, e.g. `LIMIT 1`.
    pub async fn select(
        &self,
        table: &str,
        fields: Vec<FieldName>,
        filter: Option<WhereMap>,
        extra: Option<&str>,
    ) -> Result<DbResult> {
        let mut args = Statement::select(table).fields(fields);
        if let Some(filter) = filter {
            args = args.filter(filter);
        }
        if let Some(extra) = extra {
            args = args.extra(extra);
        }
        self.execute(args.into()).await
    }

    /// Bulk-inserts `rows`, one value per field each.
    pub async fn insert(
        &self,
        table: &str,
        fields: Vec<FieldName>,
        rows: Vec<Vec<DbValue>>,
    ) -> Result<()> {
        self.execute(Statement::insert(table, fields, rows)).await?;
        Ok(())
    }

    /// Sets `assignments` on the rows of `table` matching `filter`.
    pub async fn update(
        &self,
        table: &str,
        assignments: BTreeMap<FieldName, DbValue>,
        filter: Option<WhereMap>,
    ) -> Result<()> {
        let mut args = assignments
            .into_iter()
            .fold(Statement::update(table), |args, (field, value)| {
                args.set(field, value)
            });
        args.filter = filter;
        self.execute(args.into()).await?;
        Ok(())
    }

    /// Deletes the rows of `table` matching `filter`, or every row.
    pub async fn delete(&self, table: &str, filter: Option<WhereMap>) -> Result<()> {
        self.execute(Statement::delete(table, filter)).await?;
        Ok(())
    }

    /// Runs the configured init file, if any.
    pub async fn init(&self) -> Result<()> {
        match self.config.init_file.clone() {
            Some(path) => self.bootstrap(&path).await,
            None => {
                debug!(parent: &self.span, "no init file configured");
                Ok(())
            }
        }
    }

    /// Runs the bootstrap file or directory at `path`, one transaction per
    /// file.
    pub async fn bootstrap(&self, path: &Path) -> Result<()> {
        let scripts = bootstrap::load(path, &self.span)?;
        for script in scripts {
            let file = script.path.clone();
            let mut conn = acquire(&self.pool, &self.span).await?;
            let mut tx = Tx::begin(&mut conn, AccessMode::ReadWrite, &self.span).await?;
            let mut outcome = Ok(());
            for sql in &script.statements {
                if let Err(e) = sqlx::query(sql).execute(tx.conn()).await {
                    error!(parent: &self.span, file = %file.display(), sql = %sql, error = %e, "init statement failed");
                    outcome = Err(DataError::InitFile(file.clone()));
                    break;
                }
            }
            let result = tx.finish(outcome).await;
            release(&mut conn, &result);
            result?;
            info!(
                parent: &self.span,
                file = %file.display(),
                statements = script.statements.len(),
                "loaded init file"
            );
        }
        Ok(())
    }
}

/// Closes `conn` instead of pooling it when its transaction ended in an
/// unknown state.
fn release<T>(conn: &mut PoolConnection<Sqlite>, result: &Result<T>) {
    if matches!(result, Err(DataError::TxCommit | DataError::TxRollback)) {
        conn.close_on_drop();
    }
}

impl std::fmt::Debug for DataBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBase")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
