//! Execution facade: a client, its dialect and execution settings.

use crate::client::GenericClient;
use crate::config::{DbConfig, LogLevel};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use std::time::{Duration, Instant};

/// A database handle used by [`crate::FrozenSelect`] to run queries.
///
/// ```ignore
/// let db = Db::new(client, Dialect::Postgres)
///     .with_config(DbConfig::new().with_query_timeout(Duration::from_secs(5)));
/// let mut books: Vec<Book> = Vec::new();
/// select().model::<Book>().limit(10).freeze().scan(&db, &mut books).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Db<C> {
    client: C,
    dialect: Dialect,
    config: DbConfig,
}

impl<C: GenericClient> Db<C> {
    pub fn new(client: C, dialect: Dialect) -> Self {
        Self {
            client,
            dialect,
            config: DbConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Run a query and return all rows.
    pub async fn query(&self, sql: &str) -> OrmResult<Vec<Row>> {
        let start = Instant::now();
        let result = self.with_timeout(self.client.query(sql)).await;
        self.report(sql, start.elapsed(), result.as_ref().map(Vec::len));
        result
    }

    /// Run a query and return its first row.
    pub async fn query_one(&self, sql: &str) -> OrmResult<Row> {
        self.query(sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("Expected one row, got none"))
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str) -> OrmResult<u64> {
        let start = Instant::now();
        let result = self.with_timeout(self.client.execute(sql)).await;
        self.report(
            sql,
            start.elapsed(),
            result.as_ref().map(|n| usize::try_from(*n).unwrap_or(usize::MAX)),
        );
        result
    }

    async fn with_timeout<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: std::future::Future<Output = OrmResult<T>> + Send,
    {
        match self.config.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => Err(OrmError::Timeout(timeout)),
                }
            }
            None => future.await,
        }
    }

    fn report(&self, sql: &str, elapsed: Duration, result: Result<usize, &OrmError>) {
        let sql = self.config.truncate_sql(sql);
        let elapsed_ms = elapsed.as_millis() as u64;

        match result {
            Ok(rows) => {
                let slow = self
                    .config
                    .slow_query_threshold
                    .is_some_and(|threshold| elapsed >= threshold);
                if slow {
                    tracing::warn!(target: "querykit.sql", sql = %sql, elapsed_ms, rows, "slow query");
                } else {
                    emit(self.config.log_level, &sql, elapsed_ms, rows);
                }
            }
            Err(err) => {
                tracing::warn!(target: "querykit.sql", sql = %sql, elapsed_ms, error = %err, "query failed");
            }
        }
    }
}

fn emit(level: LogLevel, sql: &str, elapsed_ms: u64, rows: usize) {
    match level {
        LogLevel::Error => tracing::error!(target: "querykit.sql", sql = %sql, elapsed_ms, rows),
        LogLevel::Warn => tracing::warn!(target: "querykit.sql", sql = %sql, elapsed_ms, rows),
        LogLevel::Info => tracing::info!(target: "querykit.sql", sql = %sql, elapsed_ms, rows),
        LogLevel::Debug => tracing::debug!(target: "querykit.sql", sql = %sql, elapsed_ms, rows),
        LogLevel::Trace => tracing::trace!(target: "querykit.sql", sql = %sql, elapsed_ms, rows),
    }
}
