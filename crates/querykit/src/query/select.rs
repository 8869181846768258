use super::frozen::FrozenSelect;
use super::join::{self, JoinScope, RelationJoin};
use super::values::ValuesQuery;
use crate::dialect::{Dialect, Feature};
use crate::error::{BuildError, OrmError, OrmResult};
use crate::fmt::{
    ArgsFormatter, Formatter, NamedArgAppender, NopFormatter, QueryFormatter, QueryNode, SepNode,
    append_list, append_sep_nodes,
};
use crate::schema::{Entity, Model, Table};
use crate::value::Value;

/// Query of a common table expression.
#[derive(Debug, Clone)]
pub enum CteQuery {
    Select(Box<SelectQuery>),
    Values(Box<ValuesQuery>),
}

impl From<SelectQuery> for CteQuery {
    fn from(q: SelectQuery) -> Self {
        CteQuery::Select(Box::new(q))
    }
}

impl From<ValuesQuery> for CteQuery {
    fn from(q: ValuesQuery) -> Self {
        CteQuery::Values(Box::new(q))
    }
}

#[derive(Debug, Clone)]
struct Cte {
    name: String,
    query: CteQuery,
}

/// One WHERE entry: a condition or a parenthesized group.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereItem {
    Cond(SepNode),
    Group {
        sep: &'static str,
        items: Vec<WhereItem>,
    },
}

impl WhereItem {
    fn sep(&self) -> &'static str {
        match self {
            WhereItem::Cond(node) => node.sep,
            WhereItem::Group { sep, .. } => sep,
        }
    }
}

/// Conditions collected inside [`SelectQuery::where_group`].
#[derive(Debug, Clone, Default)]
pub struct WhereGroup {
    items: Vec<WhereItem>,
}

impl WhereGroup {
    pub fn where_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.items.push(WhereItem::Cond(SepNode::and(query, args)));
        self
    }

    pub fn where_or(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.items.push(WhereItem::Cond(SepNode::or(query, args)));
        self
    }

    pub fn where_group<F>(mut self, sep: &str, f: F) -> Self
    where
        F: FnOnce(WhereGroup) -> WhereGroup,
    {
        let inner = f(WhereGroup::default());
        if !inner.items.is_empty() {
            self.items.push(WhereItem::Group {
                sep: group_sep(sep),
                items: inner.items,
            });
        }
        self
    }
}

/// `"AND"` / `"OR"` in any case and spacing.
fn group_sep(sep: &str) -> &'static str {
    if sep.trim().eq_ignore_ascii_case("or") {
        " OR "
    } else {
        " AND "
    }
}

#[derive(Debug, Clone)]
struct ManualJoin {
    join: QueryNode,
    on: Vec<SepNode>,
}

#[derive(Debug, Clone)]
struct Union {
    op: &'static str,
    query: Box<SelectQuery>,
}

/// Which rows of a soft-delete table a SELECT sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DeletedFilter {
    #[default]
    Alive,
    Deleted,
    All,
}

/// Models wider than this render as `"alias".'N columns'` in placeholder mode.
const WIDE_MODEL_FIELDS: usize = 10;

/// SELECT query builder.
///
/// Builder methods consume and return the query. The first failure is kept
/// and returned from every render call; later calls stay chainable.
///
/// ```ignore
/// let sql = select()
///     .model::<Book>()
///     .relation("Author")
///     .where_expr("?TableAlias.id = ?", args![5])
///     .limit(10)
///     .to_sql(Dialect::Postgres)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    table: Option<&'static Table>,
    ctes: Vec<Cte>,
    distinct: bool,
    distinct_on: Vec<QueryNode>,
    model_table: Option<QueryNode>,
    tables: Vec<QueryNode>,
    columns: Vec<QueryNode>,
    excluded: Vec<String>,
    wheres: Vec<WhereItem>,
    deleted: DeletedFilter,
    joins: Vec<ManualJoin>,
    relations: Vec<RelationJoin>,
    group: Vec<QueryNode>,
    having: Vec<QueryNode>,
    order: Vec<QueryNode>,
    limit: Option<i64>,
    offset: Option<i64>,
    lock: Option<QueryNode>,
    unions: Vec<Union>,
    err: Option<BuildError>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_err(&mut self, err: BuildError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// The first builder error, if any.
    pub fn err(&self) -> Option<&BuildError> {
        self.err.as_ref()
    }

    /// Bind the query to `M`'s table.
    pub fn model<M: Model>(self) -> Self {
        self.table_model(M::table())
    }

    /// Bind the query to a table without a Rust model type.
    pub fn table_model(mut self, table: &'static Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn table_meta(&self) -> Option<&'static Table> {
        self.table
    }

    pub fn apply<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        f(self)
    }

    /// Freeze the query for execution.
    pub fn freeze(self) -> FrozenSelect {
        FrozenSelect::new(self)
    }

    // ------------------------------------------------------------------
    // Clauses
    // ------------------------------------------------------------------

    /// `WITH "name" AS (<query>)`
    pub fn with(mut self, name: impl Into<String>, query: impl Into<CteQuery>) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            query: query.into(),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn distinct_on(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.distinct_on.push(QueryNode::safe(query, args));
        self
    }

    pub fn table<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(idents(names));
        self
    }

    pub fn table_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.tables.push(QueryNode::safe(query, args));
        self
    }

    /// Replace the rendering of the model's own `"table" AS "alias"`.
    pub fn model_table_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.model_table = Some(QueryNode::safe(query, args));
        self
    }

    /// Select these columns. Model field names render alias-qualified.
    pub fn column<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(idents(names));
        self
    }

    pub fn column_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.columns.push(QueryNode::safe(query, args));
        self
    }

    /// Leave these columns out of the model's default column list.
    pub fn exclude_column<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.table.is_none() {
            self.set_err(BuildError::ModelRequired("exclude_column"));
            return self;
        }
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn where_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.wheres.push(WhereItem::Cond(SepNode::and(query, args)));
        self
    }

    pub fn where_or(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.wheres.push(WhereItem::Cond(SepNode::or(query, args)));
        self
    }

    /// Match `entity` by the model's primary key:
    /// `"alias"."pk" = <value>` for every pk field.
    pub fn where_pk(mut self, entity: &dyn Entity) -> Self {
        let Some(table) = self.table else {
            self.set_err(BuildError::ModelRequired("where_pk"));
            return self;
        };
        let mut query = String::new();
        let mut args = Vec::new();
        for field in table.pks() {
            if !query.is_empty() {
                query.push_str(" AND ");
            }
            query.push_str("? = ?");
            args.push(Value::Ident(format!("{}.{}", table.alias, field.sql_name)));
            args.push(entity.field_value(field.name));
        }
        if args.is_empty() {
            self.set_err(BuildError::NoPrimaryKey(table.name.to_string()));
            return self;
        }
        self.where_expr(query, args)
    }

    /// Only soft-deleted rows.
    pub fn where_deleted(self) -> Self {
        self.deleted_filter("where_deleted", DeletedFilter::Deleted)
    }

    /// Soft-deleted and live rows alike.
    pub fn where_all_with_deleted(self) -> Self {
        self.deleted_filter("where_all_with_deleted", DeletedFilter::All)
    }

    fn deleted_filter(mut self, op: &'static str, filter: DeletedFilter) -> Self {
        match self.table {
            None => self.set_err(BuildError::ModelRequired(op)),
            Some(table) if table.soft_delete_field().is_none() => {
                self.set_err(BuildError::SoftDeleteUnsupported(table.name.to_string()))
            }
            Some(_) => self.deleted = filter,
        }
        self
    }

    pub(crate) fn where_node(mut self, node: SepNode) -> Self {
        self.wheres.push(WhereItem::Cond(node));
        self
    }

    /// A parenthesized group of conditions, joined to the previous
    /// condition with `sep` (`"AND"` or `"OR"`).
    ///
    /// ```ignore
    /// q.where_expr("a = ?", args![1])
    ///     .where_group("OR", |g| g.where_expr("b = ?", args![2]).where_expr("c = ?", args![3]));
    /// // WHERE (a = 1) OR ((b = 2) AND (c = 3))
    /// ```
    pub fn where_group<F>(mut self, sep: &str, f: F) -> Self
    where
        F: FnOnce(WhereGroup) -> WhereGroup,
    {
        let inner = f(WhereGroup::default());
        if !inner.items.is_empty() {
            self.wheres.push(WhereItem::Group {
                sep: group_sep(sep),
                items: inner.items,
            });
        }
        self
    }

    pub fn group<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group.extend(idents(names));
        self
    }

    pub fn group_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.group.push(QueryNode::safe(query, args));
        self
    }

    pub fn having(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.having.push(QueryNode::safe(query, args));
        self
    }

    /// `order(["title", "id DESC"])`; a trailing direction is kept as keyword.
    pub fn order<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.order.push(order_node(name.into()));
        }
        self
    }

    pub fn order_expr(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.order.push(QueryNode::safe(query, args));
        self
    }

    /// A negative limit means count-only for [`FrozenSelect::scan_and_count`]
    /// and renders no LIMIT clause.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// `FOR <query>`, e.g. `lock_for("UPDATE SKIP LOCKED", vec![])`.
    pub fn lock_for(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.lock = Some(QueryNode::safe(query, args));
        self
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    // ------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------

    pub fn union(self, other: SelectQuery) -> Self {
        self.add_union(" UNION ", other)
    }

    pub fn union_all(self, other: SelectQuery) -> Self {
        self.add_union(" UNION ALL ", other)
    }

    pub fn intersect(self, other: SelectQuery) -> Self {
        self.add_union(" INTERSECT ", other)
    }

    pub fn intersect_all(self, other: SelectQuery) -> Self {
        self.add_union(" INTERSECT ALL ", other)
    }

    pub fn except(self, other: SelectQuery) -> Self {
        self.add_union(" EXCEPT ", other)
    }

    pub fn except_all(self, other: SelectQuery) -> Self {
        self.add_union(" EXCEPT ALL ", other)
    }

    fn add_union(mut self, op: &'static str, other: SelectQuery) -> Self {
        self.unions.push(Union {
            op,
            query: Box::new(other),
        });
        self
    }

    // ------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------

    /// `join("LEFT JOIN authors AS a", vec![])`
    pub fn join(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.joins.push(ManualJoin {
            join: QueryNode::safe(query, args),
            on: Vec::new(),
        });
        self
    }

    /// Add an AND condition to the last `join`.
    pub fn join_on(self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.add_join_on(SepNode::and(query, args))
    }

    /// Add an OR condition to the last `join`.
    pub fn join_on_or(self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.add_join_on(SepNode::or(query, args))
    }

    fn add_join_on(mut self, node: SepNode) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.on.push(node),
            None => self.set_err(BuildError::NoJoins),
        }
        self
    }

    /// Join a declared relation by path, e.g. `"Author"` or `"Author.Profile"`.
    pub fn relation(self, path: &str) -> Self {
        self.add_relation(path, None)
    }

    /// Join a relation and scope its last segment.
    ///
    /// ```ignore
    /// q.relation_with("Author", |s| s.columns(["id", "name"]).on("?TableAlias.id > ?", args![0]))
    /// ```
    pub fn relation_with<F>(self, path: &str, f: F) -> Self
    where
        F: FnOnce(JoinScope) -> JoinScope,
    {
        let scope = f(JoinScope::new());
        self.add_relation(path, Some(scope))
    }

    fn add_relation(mut self, path: &str, scope: Option<JoinScope>) -> Self {
        let Some(table) = self.table else {
            self.set_err(BuildError::ModelRequired("relation"));
            return self;
        };
        if let Err(err) = join::add_relation(&mut self.relations, table, table.alias, path, scope) {
            self.set_err(err);
        }
        self
    }

    /// Requested relations, in request order.
    pub fn relations(&self) -> &[RelationJoin] {
        &self.relations
    }

    pub(crate) fn set_relations(mut self, relations: Vec<RelationJoin>) -> Self {
        self.relations = relations;
        self
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

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

    /// Render the COUNT form with inlined literals.
    pub fn to_count_sql(&self, dialect: Dialect) -> OrmResult<String> {
        let mut out = String::new();
        self.append_count_query(&mut Formatter::new(dialect), &mut out)?;
        Ok(out)
    }

    pub fn append_query(&self, fmter: &mut dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        self.append_select(fmter, out, false)
    }

    /// Without GROUP BY / DISTINCT: the query with `count(*)` as its only
    /// column and no ORDER BY / LIMIT / OFFSET / FOR. Otherwise the whole
    /// query wrapped in `WITH _count_wrapper AS (...)`.
    pub fn append_count_query(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
    ) -> OrmResult<()> {
        self.append_select(fmter, out, true)
    }

    fn append_select(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        count: bool,
    ) -> OrmResult<()> {
        if let Some(err) = &self.err {
            return Err(err.clone().into());
        }

        let dialect = fmter.dialect();
        let wrap_count =
            count && (!self.group.is_empty() || self.distinct || !self.distinct_on.is_empty());
        let derived_count = wrap_count && !fmter.has_feature(Feature::Cte);

        if wrap_count {
            if derived_count {
                out.push_str("SELECT count(*) FROM (");
            } else {
                out.push_str("WITH _count_wrapper AS (");
            }
        }

        if !self.unions.is_empty() {
            out.push('(');
        }

        self.append_with(fmter, out)?;

        out.push_str("SELECT ");

        if !self.distinct_on.is_empty() {
            if !fmter.has_feature(Feature::DistinctOn) {
                return Err(OrmError::unsupported(
                    dialect.name(),
                    Feature::DistinctOn.name(),
                ));
            }
            out.push_str("DISTINCT ON (");
            append_list(&self.distinct_on, fmter, out, Some(self))?;
            out.push_str(") ");
        } else if self.distinct {
            out.push_str("DISTINCT ");
        }

        if count && !wrap_count {
            out.push_str("count(*)");
        } else {
            self.append_columns(fmter, out)?;
        }

        if self.has_tables() {
            out.push_str(" FROM ");
            self.append_tables(fmter, out)?;
        }

        join::for_each_to_one(&self.relations, &mut |j| {
            out.push(' ');
            j.append_join(fmter, out, Some(self))
        })?;

        for join in &self.joins {
            out.push(' ');
            join.join.append_query(fmter, out, Some(self))?;
            if !join.on.is_empty() {
                out.push_str(" ON ");
                append_sep_nodes(&join.on, fmter, out, Some(self))?;
            }
        }

        let soft_delete = match self.deleted {
            DeletedFilter::All => None,
            filter => self
                .table
                .and_then(|t| t.soft_delete_field().map(|f| (t, f, filter))),
        };
        if !self.wheres.is_empty() || soft_delete.is_some() {
            out.push_str(" WHERE ");
            if !self.wheres.is_empty() {
                let wrap = soft_delete.is_some() && self.wheres.len() > 1;
                if wrap {
                    out.push('(');
                }
                self.append_where_items(&self.wheres, fmter, out)?;
                if wrap {
                    out.push(')');
                }
            }
            if let Some((table, field, filter)) = soft_delete {
                if !self.wheres.is_empty() {
                    out.push_str(" AND ");
                }
                append_qualified(dialect, out, table.alias, field.sql_name);
                out.push_str(match filter {
                    DeletedFilter::Deleted => " IS NOT NULL",
                    _ => " IS NULL",
                });
            }
        }

        if !self.group.is_empty() {
            out.push_str(" GROUP BY ");
            append_list(&self.group, fmter, out, Some(self))?;
        }

        if !self.having.is_empty() {
            out.push_str(" HAVING ");
            for (i, having) in self.having.iter().enumerate() {
                if i > 0 {
                    out.push_str(" AND ");
                }
                out.push('(');
                having.append_query(fmter, out, Some(self))?;
                out.push(')');
            }
        }

        if !count {
            if !self.order.is_empty() {
                out.push_str(" ORDER BY ");
                append_list(&self.order, fmter, out, Some(self))?;
            }

            if let Some(limit) = self.limit.filter(|n| *n >= 0) {
                out.push_str(" LIMIT ");
                out.push_str(&limit.to_string());
            }

            if let Some(offset) = self.offset.filter(|n| *n > 0) {
                out.push_str(" OFFSET ");
                out.push_str(&offset.to_string());
            }

            if let Some(lock) = &self.lock {
                if !fmter.has_feature(Feature::SelectFor) {
                    return Err(OrmError::unsupported(
                        dialect.name(),
                        Feature::SelectFor.name(),
                    ));
                }
                out.push_str(" FOR ");
                lock.append_query(fmter, out, Some(self))?;
            }
        }

        if !self.unions.is_empty() {
            out.push(')');
            for union in &self.unions {
                out.push_str(union.op);
                out.push('(');
                union.query.append_query(fmter, out)?;
                out.push(')');
            }
        }

        if wrap_count {
            if derived_count {
                out.push_str(") AS _count_wrapper");
            } else {
                out.push_str(") SELECT count(*) FROM _count_wrapper");
            }
        }

        Ok(())
    }

    fn append_with(&self, fmter: &mut dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        if self.ctes.is_empty() {
            return Ok(());
        }

        let dialect = fmter.dialect();
        if !fmter.has_feature(Feature::Cte) {
            return Err(OrmError::unsupported(dialect.name(), Feature::Cte.name()));
        }

        out.push_str("WITH ");
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            dialect.append_ident(out, &cte.name);
            match &cte.query {
                CteQuery::Select(q) => {
                    out.push_str(" AS (");
                    q.append_query(fmter, out)?;
                }
                CteQuery::Values(q) => {
                    out.push_str(" (");
                    q.append_columns(fmter, out)?;
                    out.push_str(") AS (");
                    q.append_query(fmter, out)?;
                }
            }
            out.push(')');
        }
        out.push(' ');
        Ok(())
    }

    fn append_columns(&self, fmter: &mut dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        let dialect = fmter.dialect();
        let start = out.len();

        if !self.columns.is_empty() {
            let mut first = true;
            for col in &self.columns {
                if let QueryNode::Ident(name) = col {
                    if self.is_excluded(name) {
                        continue;
                    }
                }
                if !first {
                    out.push_str(", ");
                }
                first = false;
                self.append_column(fmter, out, col)?;
            }
        } else if let Some(table) = self.table {
            if fmter.is_nop() && table.fields.len() > WIDE_MODEL_FIELDS {
                dialect.append_ident(out, table.alias);
                out.push('.');
                Value::Text(format!("{} columns", table.fields.len()))
                    .append_literal(dialect, out);
            } else {
                self.append_model_columns(dialect, out, table);
            }
        } else {
            out.push('*');
        }

        join::for_each_to_one(&self.relations, &mut |j| {
            let mark = out.len();
            if out.len() != start {
                out.push_str(", ");
            }
            if j.append_columns(&*fmter, out) == 0 {
                out.truncate(mark);
            }
            Ok(())
        })
    }

    fn append_column(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        col: &QueryNode,
    ) -> OrmResult<()> {
        if let QueryNode::Ident(name) = col {
            if let Some((table, field)) = self
                .table
                .and_then(|t| t.field(name).map(|f| (t, f)))
            {
                append_qualified(fmter.dialect(), out, table.alias, field.sql_name);
                return Ok(());
            }
        }
        col.append_query(fmter, out, Some(self))
    }

    /// The model's non-excluded fields, alias-qualified.
    fn append_model_columns(&self, dialect: Dialect, out: &mut String, table: &'static Table) {
        let mut first = true;
        for field in table.fields {
            if self.is_excluded(field.name) || self.is_excluded(field.sql_name) {
                continue;
            }
            if !first {
                out.push_str(", ");
            }
            first = false;
            append_qualified(dialect, out, table.alias, field.sql_name);
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e == name)
    }

    fn has_tables(&self) -> bool {
        self.table.is_some() || self.model_table.is_some() || !self.tables.is_empty()
    }

    fn append_tables(&self, fmter: &mut dyn QueryFormatter, out: &mut String) -> OrmResult<()> {
        let start = out.len();

        if let Some(node) = &self.model_table {
            node.append_query(fmter, out, Some(self))?;
        } else if let Some(table) = self.table {
            let dialect = fmter.dialect();
            dialect.append_ident(out, table.name);
            if table.alias != table.name {
                out.push_str(" AS ");
                dialect.append_ident(out, table.alias);
            }
        }

        for table in &self.tables {
            if out.len() > start {
                out.push_str(", ");
            }
            table.append_query(fmter, out, Some(self))?;
        }
        Ok(())
    }

    fn append_where_items(
        &self,
        items: &[WhereItem],
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
    ) -> OrmResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(item.sep());
            }
            out.push('(');
            match item {
                WhereItem::Cond(cond) => cond.node.append_query(fmter, out, Some(self))?,
                WhereItem::Group { items, .. } => self.append_where_items(items, fmter, out)?,
            }
            out.push(')');
        }
        Ok(())
    }

    fn require_table(&self, name: &'static str) -> OrmResult<&'static Table> {
        self.table
            .ok_or(OrmError::Build(BuildError::ModelRequired(name)))
    }
}

impl NamedArgAppender for SelectQuery {
    fn append_named_arg(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        name: &str,
    ) -> OrmResult<bool> {
        let dialect = fmter.dialect();
        match name {
            "TableName" => {
                let table = self.require_table("?TableName")?;
                dialect.append_ident(out, table.name);
            }
            "TableAlias" => {
                let table = self.require_table("?TableAlias")?;
                dialect.append_ident(out, table.alias);
            }
            "TableColumns" => {
                let table = self.require_table("?TableColumns")?;
                for (i, field) in table.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    append_qualified(dialect, out, table.alias, field.sql_name);
                }
            }
            "PKs" => {
                let table = self.require_table("?PKs")?;
                for (i, field) in table.pks().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    append_qualified(dialect, out, table.alias, field.sql_name);
                }
            }
            "Columns" => {
                let table = self.require_table("?Columns")?;
                self.append_model_columns(dialect, out, table);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `"alias"."column"`
fn append_qualified(dialect: Dialect, out: &mut String, alias: &str, column: &str) {
    dialect.append_ident(out, alias);
    out.push('.');
    dialect.append_ident(out, column);
}

fn idents<I, S>(names: I) -> impl Iterator<Item = QueryNode>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(QueryNode::ident)
}

/// `"title DESC"` renders as `"title" DESC`; anything else as one identifier.
fn order_node(order: String) -> QueryNode {
    let Some((field, dir)) = order.split_once(' ') else {
        return QueryNode::Ident(order);
    };
    match dir.trim().to_ascii_uppercase().as_str() {
        "ASC" | "DESC" | "ASC NULLS FIRST" | "DESC NULLS FIRST" | "ASC NULLS LAST"
        | "DESC NULLS LAST" => QueryNode::safe(
            "? ?",
            vec![Value::ident(field), Value::safe(dir.trim().to_string())],
        ),
        _ => QueryNode::Ident(order),
    }
}
