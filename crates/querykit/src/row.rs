//! Rows and row mapping

use crate::error::{OrmError, OrmResult};
use crate::schema::{Entity, Model};
use crate::value::{FromValue, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A dynamic key/value row.
pub type ValueMap = HashMap<String, Value>;

/// One result row: column names (shared by all rows of a result) + values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of `column`.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Decode `column` into `T`.
    pub fn get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .value(column)
            .ok_or_else(|| OrmError::decode(column, "column not found"))?;
        T::from_value(value, column)
    }

    /// Decode the value at `index` into `T`.
    pub fn get_idx<T: FromValue>(&self, index: usize) -> OrmResult<T> {
        let column = self.columns.get(index).map(String::as_str).unwrap_or("?");
        let value = self
            .values
            .get(index)
            .ok_or_else(|| OrmError::decode(column, format!("no column at index {index}")))?;
        T::from_value(value, column)
    }

    /// The `prefix__*` columns of a flattened to-one relation, prefix stripped.
    ///
    /// `row.prefixed("author")` turns `author__id, author__name` into
    /// `id, name`; nested relations keep their remaining prefix
    /// (`author__profile__bio` becomes `profile__bio`).
    pub fn prefixed(&self, prefix: &str) -> Row {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, value) in self.columns.iter().zip(&self.values) {
            let Some(rest) = column
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix("__"))
            else {
                continue;
            };
            columns.push(rest.to_string());
            values.push(value.clone());
        }
        Row::new(columns.into(), values)
    }

    /// `true` when every value is NULL (e.g. an unmatched LEFT JOIN).
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    pub fn into_map(self) -> ValueMap {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

/// Trait for types that can be constructed from a [`Row`].
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for ValueMap {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone().into_map())
    }
}

/// Where a SELECT materializes its rows.
///
/// Implementations reset the destination and reuse its allocation, so the
/// same vector can be scanned into repeatedly.
pub trait Destination: Send {
    /// Replace the contents with `rows`, returning how many were decoded.
    fn scan_rows(&mut self, rows: Vec<Row>) -> OrmResult<usize>;

    /// Decoded entities, for relation loading and `after_select`.
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        Vec::new()
    }
}

impl<M: Model> Destination for Vec<M> {
    fn scan_rows(&mut self, rows: Vec<Row>) -> OrmResult<usize> {
        self.clear();
        self.reserve(rows.len());
        for row in &rows {
            self.push(M::from_row(row)?);
        }
        Ok(self.len())
    }

    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        self.iter_mut().map(|m| m as &mut dyn Entity).collect()
    }
}

impl Destination for Vec<ValueMap> {
    fn scan_rows(&mut self, rows: Vec<Row>) -> OrmResult<usize> {
        self.clear();
        self.reserve(rows.len());
        self.extend(rows.into_iter().map(Row::into_map));
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::from_pairs([
            ("id", Value::from(1)),
            ("author__id", Value::from("7")),
            ("author__name", Value::from("Ann")),
            ("author__profile__bio", Value::Null),
        ])
    }

    #[test]
    fn test_get_decodes_columns() {
        let row = sample();
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert_eq!(row.get::<i64>("author__id").unwrap(), 7);
        assert!(row.get::<i64>("missing").is_err());
        assert_eq!(row.get_idx::<String>(2).unwrap(), "Ann");
    }

    #[test]
    fn test_prefixed_strips_relation_alias() {
        let author = sample().prefixed("author");
        assert_eq!(author.columns(), &["id", "name", "profile__bio"]);
        assert_eq!(author.get::<String>("name").unwrap(), "Ann");

        let profile = author.prefixed("profile");
        assert_eq!(profile.columns(), &["bio"]);
        assert!(profile.is_all_null());
    }

    #[test]
    fn test_map_destination_reuses_allocation() {
        let mut dest: Vec<ValueMap> = Vec::with_capacity(8);
        dest.push(ValueMap::new());
        let cap = dest.capacity();

        let n = dest.scan_rows(vec![sample(), sample()]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(dest.len(), 2);
        assert_eq!(dest.capacity(), cap);
        assert_eq!(dest[0].get("author__name"), Some(&Value::from("Ann")));
    }
}
