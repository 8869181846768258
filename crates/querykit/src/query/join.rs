//! Relation joins and the to-one flattening resolver.
//!
//! Has-one / belongs-to joins are flattened into the owning SELECT:
//!
//! ```text
//! SELECT "book"."id", "author"."id" AS "author__id", ...
//! FROM "books" AS "book"
//! LEFT JOIN "authors" AS "author" ON ("author"."id" = "book"."author_id")
//! ```
//!
//! Has-many / many-to-many joins are only described here; they are loaded by
//! [`crate::relation`] after the owning rows are fetched.

use crate::error::{BuildError, OrmResult};
use crate::fmt::{NamedArgAppender, QueryFormatter, SepNode};
use crate::schema::{Relation, Table};
use crate::value::Value;
use heck::ToSnakeCase;

/// Maximum nesting of a relation path (`A.B.C...`).
pub const MAX_RELATION_DEPTH: usize = 16;

/// Column subset and extra ON conditions for one requested relation.
#[derive(Debug, Clone, Default)]
pub struct JoinScope {
    columns: Option<Vec<String>>,
    on: Vec<SepNode>,
}

impl JoinScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select only these related columns (may be called repeatedly).
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Select only these related columns. An empty list joins without columns.
    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cols = self.columns.get_or_insert_with(Vec::new);
        cols.extend(names.into_iter().map(Into::into));
        self
    }

    /// Extra condition joined with AND.
    pub fn on(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.on.push(SepNode::and(query, args));
        self
    }

    /// Extra condition joined with OR.
    pub fn on_or(mut self, query: impl Into<String>, args: Vec<Value>) -> Self {
        self.on.push(SepNode::or(query, args));
        self
    }
}

/// A requested relation.
#[derive(Debug, Clone)]
pub struct RelationJoin {
    pub(crate) relation: &'static Relation,
    pub(crate) base_table: &'static Table,
    pub(crate) base_alias: String,
    pub(crate) alias: String,
    /// Relation names from the root, e.g. `["Author", "Profile"]`.
    pub(crate) path: Vec<&'static str>,
    pub(crate) columns: Option<Vec<String>>,
    pub(crate) on: Vec<SepNode>,
    pub(crate) children: Vec<RelationJoin>,
}

impl RelationJoin {
    pub fn relation(&self) -> &'static Relation {
        self.relation
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn on_nodes(&self) -> &[SepNode] {
        &self.on
    }

    pub fn children(&self) -> &[RelationJoin] {
        &self.children
    }

    pub(crate) fn join_table(&self) -> &'static Table {
        self.relation.table()
    }

    /// `LEFT JOIN "<table>" AS "<alias>" ON (<keys>) [AND (<extra>)]...`
    pub(crate) fn append_join(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        model: Option<&dyn NamedArgAppender>,
    ) -> OrmResult<()> {
        let dialect = fmter.dialect();
        let join_table = self.join_table();

        out.push_str("LEFT JOIN ");
        dialect.append_ident(out, join_table.name);
        out.push_str(" AS ");
        dialect.append_ident(out, &self.alias);
        out.push_str(" ON (");
        for (i, (join_field, base_field)) in self
            .relation
            .join_fields
            .iter()
            .zip(self.relation.base_fields)
            .enumerate()
        {
            if i > 0 {
                out.push_str(" AND ");
            }
            dialect.append_ident(out, &self.alias);
            out.push('.');
            dialect.append_ident(out, sql_name(join_table, join_field));
            out.push_str(" = ");
            dialect.append_ident(out, &self.base_alias);
            out.push('.');
            dialect.append_ident(out, sql_name(self.base_table, base_field));
        }
        out.push(')');

        for on in &self.on {
            out.push_str(on.sep);
            out.push('(');
            on.node.append_query(fmter, out, model)?;
            out.push(')');
        }
        Ok(())
    }

    /// `"<alias>"."<col>" AS "<alias>__<col>"` for each selected column.
    ///
    /// Returns the number of columns appended.
    pub(crate) fn append_columns(&self, fmter: &dyn QueryFormatter, out: &mut String) -> usize {
        let dialect = fmter.dialect();
        let join_table = self.join_table();

        let columns: Vec<&str> = match &self.columns {
            Some(cols) => cols.iter().map(|c| sql_name(join_table, c)).collect(),
            None => join_table.fields.iter().map(|f| f.sql_name).collect(),
        };

        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            dialect.append_ident(out, &self.alias);
            out.push('.');
            dialect.append_ident(out, col);
            out.push_str(" AS ");
            dialect.append_ident(out, &format!("{}__{}", self.alias, col));
        }
        columns.len()
    }
}

/// SQL name of `field` in `table`, or `field` itself for unknown names.
pub(crate) fn sql_name<'a>(table: &'static Table, field: &'a str) -> &'a str {
    match table.field(field) {
        Some(f) => f.sql_name,
        None => field,
    }
}

/// Record the relation `path` (`"Author"`, `"Author.Profile"`) under `joins`.
///
/// Every segment must be declared by the table it hangs off. Requesting a path
/// that already exists reuses its descriptors; `scope` applies to the last
/// segment.
pub(crate) fn add_relation(
    joins: &mut Vec<RelationJoin>,
    table: &'static Table,
    root_alias: &str,
    path: &str,
    scope: Option<JoinScope>,
) -> Result<(), BuildError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() > MAX_RELATION_DEPTH {
        return Err(BuildError::RelationDepthExceeded {
            path: path.to_string(),
            max: MAX_RELATION_DEPTH,
        });
    }

    let mut level = joins;
    let mut base_table = table;
    let mut base_alias = root_alias.to_string();
    let mut names: Vec<&'static str> = Vec::with_capacity(segments.len());
    let mut scope = scope;

    for (depth, segment) in segments.iter().enumerate() {
        let relation =
            base_table
                .relation(segment)
                .ok_or_else(|| BuildError::RelationNotFound {
                    table: base_table.name.to_string(),
                    relation: segment.to_string(),
                })?;
        names.push(relation.name);

        let alias = if depth == 0 {
            relation.name.to_snake_case()
        } else {
            format!("{}__{}", base_alias, relation.name.to_snake_case())
        };

        let idx = match level.iter().position(|j| j.alias == alias) {
            Some(idx) => idx,
            None => {
                level.push(RelationJoin {
                    relation,
                    base_table,
                    base_alias: base_alias.clone(),
                    alias: alias.clone(),
                    path: names.clone(),
                    columns: None,
                    on: Vec::new(),
                    children: Vec::new(),
                });
                level.len() - 1
            }
        };

        let join = &mut level[idx];
        if depth + 1 == segments.len() {
            if let Some(scope) = scope.take() {
                if let Some(cols) = scope.columns {
                    join.columns = Some(cols);
                }
                join.on.extend(scope.on);
            }
        }

        base_table = relation.table();
        base_alias = alias;
        level = &mut join.children;
    }

    Ok(())
}

/// Visit to-one joins depth first, children before the next sibling.
///
/// Has-many / many-to-many joins and everything below them are skipped.
pub(crate) fn for_each_to_one<'a>(
    joins: &'a [RelationJoin],
    f: &mut dyn FnMut(&'a RelationJoin) -> OrmResult<()>,
) -> OrmResult<()> {
    walk_to_one(joins, 0, f)
}

fn walk_to_one<'a>(
    joins: &'a [RelationJoin],
    depth: usize,
    f: &mut dyn FnMut(&'a RelationJoin) -> OrmResult<()>,
) -> OrmResult<()> {
    if depth >= MAX_RELATION_DEPTH {
        return Err(BuildError::RelationDepthExceeded {
            path: joins.first().map(RelationJoin::path).unwrap_or_default(),
            max: MAX_RELATION_DEPTH,
        }
        .into());
    }
    for join in joins {
        if !join.relation.kind.is_to_one() {
            continue;
        }
        f(join)?;
        walk_to_one(&join.children, depth + 1, f)?;
    }
    Ok(())
}

/// The to-one joins below `join`, re-requested from `join`'s own table.
///
/// Used by the has-many loader: the related query is rooted at the related
/// table, so its nested joins get aliases relative to that root.
pub(crate) fn reroot_to_one(join: &RelationJoin) -> Result<Vec<RelationJoin>, BuildError> {
    let table = join.join_table();
    let mut out = Vec::new();
    for child in &join.children {
        reroot_into(child, join.path.len(), table, &mut out)?;
    }
    Ok(out)
}

fn reroot_into(
    join: &RelationJoin,
    skip: usize,
    table: &'static Table,
    out: &mut Vec<RelationJoin>,
) -> Result<(), BuildError> {
    if !join.relation.kind.is_to_one() {
        return Ok(());
    }
    let path = join.path[skip..].join(".");
    let scope = JoinScope {
        columns: join.columns.clone(),
        on: join.on.clone(),
    };
    add_relation(out, table, table.alias, &path, Some(scope))?;
    for child in &join.children {
        reroot_into(child, skip, table, out)?;
    }
    Ok(())
}

/// Has-many / many-to-many joins reachable through to-one joins, in join order.
pub(crate) fn collect_to_many(joins: &[RelationJoin]) -> Vec<&RelationJoin> {
    let mut out = Vec::new();
    collect_to_many_into(joins, &mut out);
    out
}

fn collect_to_many_into<'a>(joins: &'a [RelationJoin], out: &mut Vec<&'a RelationJoin>) {
    for join in joins {
        if join.relation.kind.is_to_one() {
            collect_to_many_into(&join.children, out);
        } else {
            out.push(join);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::fmt::Formatter;
    use crate::schema::{Field, Relation};

    static NODES: Table = Table {
        name: "nodes",
        alias: "node",
        fields: &[Field::new("id").pk(), Field::new("parent_id")],
        relations: &[
            Relation::belongs_to("Parent", nodes, &["parent_id"], &["id"]),
            Relation::has_many("Children", nodes, &["id"], &["parent_id"]),
        ],
    };

    fn nodes() -> &'static Table {
        &NODES
    }

    #[test]
    fn test_self_reference_builds_finite_chain() {
        let mut joins = Vec::new();
        add_relation(&mut joins, &NODES, "node", "Parent.Parent", None).unwrap();
        add_relation(&mut joins, &NODES, "node", "Parent", None).unwrap();

        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].alias, "parent");
        assert_eq!(joins[0].children[0].alias, "parent__parent");
        assert_eq!(joins[0].children[0].base_alias, "parent");
        assert_eq!(joins[0].children[0].path(), "Parent.Parent");
    }

    #[test]
    fn test_depth_limit() {
        let path = vec!["Parent"; MAX_RELATION_DEPTH + 1].join(".");
        let mut joins = Vec::new();
        let err = add_relation(&mut joins, &NODES, "node", &path, None).unwrap_err();
        assert!(matches!(err, BuildError::RelationDepthExceeded { .. }));
    }

    #[test]
    fn test_unknown_relation_names_table() {
        let mut joins = Vec::new();
        let err = add_relation(&mut joins, &NODES, "node", "Parent.Sibling", None).unwrap_err();
        assert_eq!(
            err,
            BuildError::RelationNotFound {
                table: "nodes".into(),
                relation: "Sibling".into(),
            }
        );
    }

    #[test]
    fn test_join_and_columns_render() {
        let mut joins = Vec::new();
        let scope = JoinScope::new()
            .columns(["id"])
            .on("?0 = ?0", vec![Value::from(1)]);
        add_relation(&mut joins, &NODES, "node", "Parent", Some(scope)).unwrap();

        let mut fmter = Formatter::new(Dialect::Postgres);
        let mut out = String::new();
        joins[0].append_join(&mut fmter, &mut out, None).unwrap();
        assert_eq!(
            out,
            "LEFT JOIN \"nodes\" AS \"parent\" ON (\"parent\".\"id\" = \"node\".\"parent_id\") AND (1 = 1)"
        );

        let mut out = String::new();
        assert_eq!(joins[0].append_columns(&fmter, &mut out), 1);
        assert_eq!(out, "\"parent\".\"id\" AS \"parent__id\"");
    }

    #[test]
    fn test_to_many_joins_are_not_flattened() {
        let mut joins = Vec::new();
        add_relation(&mut joins, &NODES, "node", "Children", None).unwrap();
        add_relation(&mut joins, &NODES, "node", "Parent.Children", None).unwrap();

        let mut seen = Vec::new();
        for_each_to_one(&joins, &mut |j| {
            seen.push(j.alias.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["parent"]);

        let many: Vec<String> = collect_to_many(&joins).iter().map(|j| j.path()).collect();
        assert_eq!(many, vec!["Children", "Parent.Children"]);
    }
}
