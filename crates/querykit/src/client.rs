//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;
use tokio_postgres::SimpleQueryMessage;

/// A trait that unifies database clients and transactions.
///
/// Queries are fully rendered SQL text without bind parameters, so
/// implementations run them through the simple query protocol. Values come
/// back as text and are decoded by [`crate::FromValue`].
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Returns `OrmError::NotFound` if no rows are returned.
    fn query_one(&self, sql: &str) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            let rows = self.query(sql).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected one row, got none"))
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

/// Collect the data rows of a simple query response.
fn collect_rows(messages: Vec<SimpleQueryMessage>) -> Vec<Row> {
    let mut columns: Option<Arc<[String]>> = None;
    let mut rows = Vec::new();

    for message in messages {
        let SimpleQueryMessage::Row(row) = message else {
            continue;
        };
        let cols = columns
            .get_or_insert_with(|| row.columns().iter().map(|c| c.name().to_string()).collect())
            .clone();
        let values = (0..row.len())
            .map(|i| match row.get(i) {
                Some(text) => Value::Text(text.to_string()),
                None => Value::Null,
            })
            .collect();
        rows.push(Row::new(cols, values));
    }
    rows
}

/// Affected row count of the last completed command.
fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .rev()
        .find_map(|m| match m {
            SimpleQueryMessage::CommandComplete(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(0)
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str) -> OrmResult<Vec<Row>> {
        let messages = self.simple_query(sql).await?;
        Ok(collect_rows(messages))
    }

    async fn execute(&self, sql: &str) -> OrmResult<u64> {
        let messages = self.simple_query(sql).await?;
        Ok(affected_rows(&messages))
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str) -> OrmResult<Vec<Row>> {
        let messages = self.simple_query(sql).await?;
        Ok(collect_rows(messages))
    }

    async fn execute(&self, sql: &str) -> OrmResult<u64> {
        let messages = self.simple_query(sql).await?;
        Ok(affected_rows(&messages))
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str) -> OrmResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql).await
    }

    async fn execute(&self, sql: &str) -> OrmResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql).await
    }
}

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str) -> OrmResult<Vec<Row>> {
        (**self).query(sql).await
    }

    async fn execute(&self, sql: &str) -> OrmResult<u64> {
        (**self).execute(sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_rows_defaults_to_zero() {
        assert_eq!(affected_rows(&[]), 0);
    }

    #[test]
    fn test_collect_rows_ignores_non_row_messages() {
        assert!(collect_rows(vec![SimpleQueryMessage::CommandComplete(3)]).is_empty());
        assert_eq!(affected_rows(&[SimpleQueryMessage::CommandComplete(3)]), 3);
    }
}
