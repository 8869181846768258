use super::select::SelectQuery;
use crate::client::GenericClient;
use crate::db::Db;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::relation;
use crate::row::Destination;
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of [`FrozenSelect::scan_and_count`].
///
/// Both halves always run to completion; `error` holds the first failure.
#[derive(Debug)]
pub struct ScanCount {
    pub count: i64,
    pub rows: usize,
    pub error: Option<OrmError>,
}

impl ScanCount {
    /// `(count, rows)`, or the first error.
    pub fn into_result(self) -> OrmResult<(i64, usize)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.count, self.rows)),
        }
    }
}

/// A finished [`SelectQuery`], shared read-only by everything that runs it.
///
/// Cloning is cheap; no clause can change once execution starts.
#[derive(Debug, Clone)]
pub struct FrozenSelect(Arc<SelectQuery>);

impl FrozenSelect {
    pub(crate) fn new(query: SelectQuery) -> Self {
        Self(Arc::new(query))
    }

    pub fn query(&self) -> &SelectQuery {
        &self.0
    }

    pub fn to_sql(&self, dialect: Dialect) -> OrmResult<String> {
        self.0.to_sql(dialect)
    }

    /// Run the query and materialize its rows into `dest`.
    ///
    /// When rows came back, has-many relations are loaded next and then
    /// every entity's `after_select` runs. Returns the number of rows.
    pub async fn scan<C, D>(&self, db: &Db<C>, dest: &mut D) -> OrmResult<usize>
    where
        C: GenericClient,
        D: Destination + ?Sized,
    {
        let sql = self.0.to_sql(db.dialect())?;
        let rows = db.query(&sql).await?;
        let n = dest.scan_rows(rows)?;

        if self.0.table_meta().is_none() {
            return Ok(n);
        }

        if n > 0 && !self.0.relations().is_empty() {
            let mut entities = dest.entities_mut();
            relation::load_relations(db, self.0.relations(), &mut entities).await?;
        }

        for entity in dest.entities_mut() {
            entity.after_select()?;
        }
        Ok(n)
    }

    /// Run the COUNT form of the query.
    pub async fn count<C: GenericClient>(&self, db: &Db<C>) -> OrmResult<i64> {
        let sql = self.0.to_count_sql(db.dialect())?;
        let row = db.query_one(&sql).await?;
        row.get_idx::<i64>(0)
    }

    /// Run `scan` and `count` concurrently.
    ///
    /// A negative limit skips the scan and only counts.
    pub async fn scan_and_count<C, D>(&self, db: &Db<C>, dest: &mut D) -> ScanCount
    where
        C: GenericClient,
        D: Destination + ?Sized,
    {
        let first_err: Mutex<Option<OrmError>> = Mutex::new(None);
        let record = |err: OrmError| {
            let mut slot = first_err.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(err);
            }
        };

        let skip_scan = self.0.limit_value().is_some_and(|n| n < 0);

        let scan = async {
            if skip_scan {
                return 0;
            }
            match self.scan(db, dest).await {
                Ok(n) => n,
                Err(err) => {
                    record(err);
                    0
                }
            }
        };

        let count = async {
            match self.count(db).await {
                Ok(n) => n,
                Err(err) => {
                    record(err);
                    0
                }
            }
        };

        let (rows, count) = tokio::join!(scan, count);
        let error = first_err
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        ScanCount { count, rows, error }
    }

    /// Run the query as a statement and return the affected row count.
    pub async fn exec<C: GenericClient>(&self, db: &Db<C>) -> OrmResult<u64> {
        let sql = self.0.to_sql(db.dialect())?;
        db.execute(&sql).await
    }
}
