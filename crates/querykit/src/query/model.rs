//! Row sources for VALUES lists.

use crate::dialect::{Dialect, Feature};
use crate::error::{BuildError, OrmResult};
use crate::fmt::{NamedArgAppender, QueryFormatter, QueryNode};
use crate::row::ValueMap;
use crate::schema::{Field, Model, Table};
use crate::value::Value;

/// Name of the row-index column added by `with_order`.
pub const ORDER_COLUMN: &str = "_order";

/// The model a VALUES list is rendered from.
#[derive(Debug, Clone)]
pub enum TableModel {
    /// One typed row.
    Struct {
        table: &'static Table,
        row: Vec<Value>,
    },
    /// Typed rows, in slice order.
    Slice {
        table: &'static Table,
        rows: Vec<Vec<Value>>,
    },
    /// Dynamic rows; `columns` is the sorted key set shared by every row.
    MapSlice {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

/// Rendering options shared by every variant.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ValuesOptions<'a> {
    pub with_order: bool,
    /// `(field name, node)` pairs rendered instead of the field's value.
    pub overrides: &'a [(String, QueryNode)],
}

impl TableModel {
    pub fn from_struct<M: Model>(model: &M) -> Self {
        let table = M::table();
        TableModel::Struct {
            table,
            row: field_values(table, model),
        }
    }

    pub fn from_slice<M: Model>(models: &[M]) -> Self {
        let table = M::table();
        TableModel::Slice {
            table,
            rows: models.iter().map(|m| field_values(table, m)).collect(),
        }
    }

    /// Dynamic rows keyed by column name.
    ///
    /// Leading maps without keys are skipped. The first non-empty map fixes
    /// the column set; every later map must carry exactly the same keys.
    pub fn from_maps(maps: &[ValueMap]) -> Result<Self, BuildError> {
        let Some(first_idx) = maps.iter().position(|m| !m.is_empty()) else {
            return Err(BuildError::EmptyInput);
        };
        let first = &maps[first_idx];

        let mut columns: Vec<String> = first.keys().cloned().collect();
        columns.sort();

        let mut rows = Vec::with_capacity(maps.len() - first_idx);
        for (i, map) in maps.iter().enumerate().skip(first_idx) {
            if map.len() != columns.len() || !columns.iter().all(|c| map.contains_key(c)) {
                let mut found: Vec<String> = map.keys().cloned().collect();
                found.sort();
                return Err(BuildError::MismatchedKeys {
                    row: i,
                    expected: columns,
                    found,
                });
            }
            rows.push(columns.iter().map(|c| map[c].clone()).collect());
        }

        Ok(TableModel::MapSlice { columns, rows })
    }

    /// Bound table, for typed variants.
    pub fn table(&self) -> Option<&'static Table> {
        match self {
            TableModel::Struct { table, .. } | TableModel::Slice { table, .. } => Some(table),
            TableModel::MapSlice { .. } => None,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            TableModel::Struct { .. } => 1,
            TableModel::Slice { rows, .. } | TableModel::MapSlice { rows, .. } => rows.len(),
        }
    }

    /// Column names in render order.
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            TableModel::Struct { table, .. } | TableModel::Slice { table, .. } => {
                table.fields.iter().map(|f| f.sql_name).collect()
            }
            TableModel::MapSlice { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// `"a", "b"[, _order]`
    pub(crate) fn append_columns(&self, dialect: Dialect, out: &mut String, with_order: bool) {
        for (i, name) in self.column_names().into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            dialect.append_ident(out, name);
        }
        if with_order {
            out.push_str(", ");
            out.push_str(ORDER_COLUMN);
        }
    }

    /// `VALUES (..), (..)` or `VALUES ROW(..), ROW(..)`.
    ///
    /// In placeholder mode a single row of placeholders is rendered and the
    /// row data is not consulted.
    pub(crate) fn append_values(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        opts: ValuesOptions<'_>,
        model: Option<&dyn NamedArgAppender>,
    ) -> OrmResult<()> {
        let open = if fmter.has_feature(Feature::ValuesRow) {
            "ROW("
        } else {
            "("
        };

        out.push_str("VALUES ");

        if fmter.is_nop() {
            out.push_str(open);
            self.append_row(fmter, out, None, opts, model)?;
            if opts.with_order {
                out.push_str(", 0");
            }
            out.push(')');
            return Ok(());
        }

        let rows: &[Vec<Value>] = match self {
            TableModel::Struct { row, .. } => std::slice::from_ref(row),
            TableModel::Slice { rows, .. } | TableModel::MapSlice { rows, .. } => rows,
        };

        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(open);
            self.append_row(fmter, out, Some(row), opts, model)?;
            if opts.with_order {
                out.push_str(", ");
                out.push_str(&i.to_string());
            }
            out.push(')');
        }
        Ok(())
    }

    fn append_row(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        row: Option<&[Value]>,
        opts: ValuesOptions<'_>,
        model: Option<&dyn NamedArgAppender>,
    ) -> OrmResult<()> {
        match self {
            TableModel::Struct { table, .. } | TableModel::Slice { table, .. } => {
                for (i, field) in table.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if let Some((_, node)) = opts.overrides.iter().find(|(name, _)| {
                        name == field.name || name == field.sql_name
                    }) {
                        node.append_query(fmter, out, model)?;
                        continue;
                    }
                    let value = row.and_then(|r| r.get(i));
                    append_typed_value(fmter, out, field, value);
                }
            }
            TableModel::MapSlice { columns, .. } => {
                for i in 0..columns.len() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match row.and_then(|r| r.get(i)) {
                        Some(value) => fmter.append_arg(out, value),
                        None => fmter.append_arg(out, &Value::Null),
                    }
                }
            }
        }
        Ok(())
    }
}

fn field_values<M: Model>(table: &'static Table, model: &M) -> Vec<Value> {
    table
        .fields
        .iter()
        .map(|f| model.field_value(f.name))
        .collect()
}

/// One value, cast to the field's declared SQL type if any.
fn append_typed_value(
    fmter: &mut dyn QueryFormatter,
    out: &mut String,
    field: &Field,
    value: Option<&Value>,
) {
    let value = value.unwrap_or(&Value::Null);
    let Some(sql_type) = field.sql_type else {
        fmter.append_arg(out, value);
        return;
    };

    if fmter.has_feature(Feature::DoubleColonCast) {
        fmter.append_arg(out, value);
        out.push_str("::");
        out.push_str(sql_type);
    } else {
        out.push_str("CAST(");
        fmter.append_arg(out, value);
        out.push_str(" AS ");
        out.push_str(sql_type);
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmt::{Formatter, NopFormatter};

    fn map(pairs: &[(&str, i64)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn render(model: &TableModel, fmter: &mut dyn QueryFormatter) -> String {
        let mut out = String::new();
        model
            .append_values(fmter, &mut out, ValuesOptions::default(), None)
            .unwrap();
        out
    }

    #[test]
    fn test_map_slice_sorted_columns() {
        let model = TableModel::from_maps(&[map(&[("b", 2), ("a", 1)]), map(&[("a", 3), ("b", 4)])])
            .unwrap();

        let mut cols = String::new();
        model.append_columns(Dialect::Postgres, &mut cols, false);
        assert_eq!(cols, "\"a\", \"b\"");

        assert_eq!(
            render(&model, &mut Formatter::new(Dialect::Postgres)),
            "VALUES (1, 2), (3, 4)"
        );
        assert_eq!(
            render(&model, &mut NopFormatter::new(Dialect::Postgres)),
            "VALUES (?, ?)"
        );
    }

    #[test]
    fn test_map_slice_row_keyword() {
        let model = TableModel::from_maps(&[map(&[("a", 1)]), map(&[("a", 2)])]).unwrap();
        assert_eq!(
            render(&model, &mut Formatter::new(Dialect::MySql)),
            "VALUES ROW(1), ROW(2)"
        );
    }

    #[test]
    fn test_map_slice_empty_input() {
        assert_eq!(TableModel::from_maps(&[]).unwrap_err(), BuildError::EmptyInput);
        assert_eq!(
            TableModel::from_maps(&[ValueMap::new()]).unwrap_err(),
            BuildError::EmptyInput
        );
    }

    #[test]
    fn test_map_slice_mismatched_keys() {
        let err = TableModel::from_maps(&[map(&[("a", 1), ("b", 2)]), map(&[("a", 3), ("c", 4)])])
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::MismatchedKeys {
                row: 1,
                expected: vec!["a".into(), "b".into()],
                found: vec!["a".into(), "c".into()],
            }
        );
    }

    #[test]
    fn test_map_slice_skips_only_leading_empty_maps() {
        let model = TableModel::from_maps(&[ValueMap::new(), map(&[("a", 1)]), map(&[("a", 2)])])
            .unwrap();
        assert_eq!(model.row_count(), 2);

        let err = TableModel::from_maps(&[map(&[("a", 1)]), ValueMap::new(), map(&[("a", 2)])])
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::MismatchedKeys {
                row: 1,
                expected: vec!["a".into()],
                found: vec![],
            }
        );
    }
}
