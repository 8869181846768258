//! VALUES lists built from typed models or dynamic rows.
//!
//! ```ignore
//! let books = vec![Book { id: 1, .. }, Book { id: 2, .. }];
//! let values = ValuesQuery::from_models(&books).with_order();
//! select()
//!     .with("_data", values)
//!     .table_expr("_data", vec![])
//!     .to_sql(Dialect::Postgres)?;
//! // WITH "_data" ("id", "title", _order) AS (VALUES (1, 'a', 0), (2, 'b', 1)) ...
//! ```

use super::model::{TableModel, ValuesOptions};
use crate::dialect::Dialect;
use crate::error::{BuildError, OrmError, OrmResult};
use crate::fmt::{ArgsFormatter, Formatter, NamedArgAppender, NopFormatter, QueryFormatter, QueryNode};
use crate::row::ValueMap;
use crate::schema::Model;
use crate::value::Value;

/// `VALUES (..), (..)` over a [`TableModel`].
#[derive(Debug, Clone)]
pub struct ValuesQuery {
    model: Option<TableModel>,
    with_order: bool,
    overrides: Vec<(String, QueryNode)>,
    err: Option<BuildError>,
}

impl ValuesQuery {
    fn from_result(model: Result<TableModel, BuildError>) -> Self {
        let (model, err) = match model {
            Ok(model) => (Some(model), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            model,
            with_order: false,
            overrides: Vec::new(),
            err,
        }
    }

    /// A single typed row.
    pub fn from_model<M: Model>(model: &M) -> Self {
        Self::from_result(Ok(TableModel::from_struct(model)))
    }

    /// Typed rows. An empty slice records [`BuildError::EmptyInput`].
    pub fn from_models<M: Model>(models: &[M]) -> Self {
        if models.is_empty() {
            return Self::from_result(Err(BuildError::EmptyInput));
        }
        Self::from_result(Ok(TableModel::from_slice(models)))
    }

    /// Dynamic rows; see [`TableModel::from_maps`] for the key rules.
    pub fn from_maps(maps: &[ValueMap]) -> Self {
        Self::from_result(TableModel::from_maps(maps))
    }

    /// Append an `_order` column holding each row's zero-based index.
    pub fn with_order(mut self) -> Self {
        self.with_order = true;
        self
    }

    /// Render `field` with `query` instead of its value, in every row.
    ///
    /// Only typed rows have declared fields; dynamic rows record
    /// [`BuildError::ModelRequired`].
    pub fn value(mut self, field: impl Into<String>, query: impl Into<String>, args: Vec<Value>) -> Self {
        if self.err.is_some() {
            return self;
        }
        match &self.model {
            Some(model) if model.table().is_some() => {
                self.overrides
                    .push((field.into(), QueryNode::safe(query, args)));
            }
            _ => self.err = Some(BuildError::ModelRequired("value")),
        }
        self
    }

    pub fn table_model(&self) -> Option<&TableModel> {
        self.model.as_ref()
    }

    pub fn err(&self) -> Option<&BuildError> {
        self.err.as_ref()
    }

    fn model(&self) -> OrmResult<&TableModel> {
        if let Some(err) = &self.err {
            return Err(err.clone().into());
        }
        self.model
            .as_ref()
            .ok_or(OrmError::Build(BuildError::ModelRequired("VALUES")))
    }

    /// Column list, as used by `WITH "name" (<columns>) AS (...)`.
    pub fn append_columns(&self, fmter: &dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        self.model()?
            .append_columns(fmter.dialect(), out, self.with_order);
        Ok(())
    }

    pub fn append_query(&self, fmter: &mut dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        let model = self.model()?;
        let opts = ValuesOptions {
            with_order: self.with_order,
            overrides: &self.overrides,
        };
        model.append_values(fmter, out, opts, Some(self))
    }

    /// Render with inlined literals.
    pub fn to_sql(&self, dialect: Dialect) -> OrmResult<String> {
        let mut out = String::new();
        self.append_query(&mut Formatter::new(dialect), &mut out)?;
        Ok(out)
    }

    /// Render with `?` in every argument position.
    pub fn to_template_sql(&self, dialect: Dialect) -> OrmResult<String> {
        let mut out = String::new();
        self.append_query(&mut NopFormatter::new(dialect), &mut out)?;
        Ok(out)
    }

    /// Render with dialect placeholders and return the bound arguments.
    pub fn to_sql_with_args(&self, dialect: Dialect) -> OrmResult<(String, Vec<Value>)> {
        let mut fmter = ArgsFormatter::new(dialect);
        let mut out = String::new();
        self.append_query(&mut fmter, &mut out)?;
        Ok((out, fmter.into_args()))
    }
}

impl NamedArgAppender for ValuesQuery {
    fn append_named_arg(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        name: &str,
    ) -> OrmResult<bool> {
        match name {
            "Columns" => {
                self.append_columns(fmter, out)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
