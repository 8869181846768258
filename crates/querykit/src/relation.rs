//! Has-many / many-to-many loading.
//!
//! After the owning rows are scanned, every to-many relation runs exactly one
//! extra query filtered by the collected parent keys. Matching rows are
//! grouped by key and handed to each parent via [`Entity::set_relation`].

use crate::client::GenericClient;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::query::SelectQuery;
use crate::query::join::{RelationJoin, collect_to_many, reroot_to_one, sql_name};
use crate::row::Row;
use crate::schema::{Entity, RelationKind};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Column carrying the owning key in many-to-many result rows.
pub const PARENT_ID_ALIAS: &str = "__querykit_parent_id";

/// Load every to-many relation in `joins` (sequentially, in join order).
pub(crate) async fn load_relations<C: GenericClient>(
    db: &Db<C>,
    joins: &[RelationJoin],
    entities: &mut [&mut dyn Entity],
) -> OrmResult<()> {
    for join in collect_to_many(joins) {
        load_relation(db, join, entities).await?;
    }
    Ok(())
}

async fn load_relation<C: GenericClient>(
    db: &Db<C>,
    join: &RelationJoin,
    entities: &mut [&mut dyn Entity],
) -> OrmResult<()> {
    if !collect_to_many(join.children()).is_empty() {
        return Err(OrmError::unsupported(
            db.dialect().name(),
            format!("has-many relations nested below {:?}", join.path()),
        ));
    }

    let relation = join.relation();
    let owner_path = &join.path[..join.path.len() - 1];
    let mut parents: Vec<&mut dyn Entity> = entities
        .iter_mut()
        .filter_map(|e| owner(&mut **e, owner_path))
        .collect();

    let parent_keys: Vec<Option<(String, Vec<Value>)>> = parents
        .iter()
        .map(|p| entity_key(&**p, relation.base_fields))
        .collect();

    let mut seen = HashSet::new();
    let keys: Vec<Vec<Value>> = parent_keys
        .iter()
        .flatten()
        .filter(|(k, _)| seen.insert(k.clone()))
        .map(|(_, values)| values.clone())
        .collect();

    tracing::trace!(
        target: "querykit.sql",
        relation = %join.path(),
        parents = parents.len(),
        keys = keys.len(),
        "loading relation"
    );

    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    if !keys.is_empty() {
        let (query, key_columns) = relation_query(join, keys)?;
        let sql = query.to_sql(db.dialect())?;
        for row in db.query(&sql).await? {
            let key = row_key(&row, &key_columns);
            if let Some(key) = key {
                groups.entry(key).or_default().push(row);
            }
        }
    }

    for (parent, key) in parents.iter_mut().zip(parent_keys) {
        let rows = key
            .and_then(|(k, _)| groups.get(&k).cloned())
            .unwrap_or_default();
        parent.set_relation(relation.name, rows)?;
    }
    Ok(())
}

/// The query loading `join` for `keys`, plus the result columns holding
/// each row's owning key.
fn relation_query(
    join: &RelationJoin,
    keys: Vec<Vec<Value>>,
) -> OrmResult<(SelectQuery, Vec<String>)> {
    let relation = join.relation();
    let table = relation.table();

    let mut query = SelectQuery::new()
        .table_model(table)
        .set_relations(reroot_to_one(join)?);

    let key_columns: Vec<String> = match (relation.kind, relation.m2m) {
        (RelationKind::ManyToMany, Some(m2m)) => {
            let join_field = relation.join_fields.first().copied().unwrap_or("id");
            query = query
                .column_expr(
                    "? AS ?",
                    vec![
                        Value::ident(format!("{}.{}", m2m.table, m2m.base_column)),
                        Value::ident(PARENT_ID_ALIAS),
                    ],
                )
                .apply(|q| match join.columns() {
                    Some(cols) => q.column(cols.iter().cloned()),
                    None => q.column_expr("?TableColumns", vec![]),
                })
                .join("JOIN ?", vec![Value::ident(m2m.table)])
                .join_on(
                    "? = ?TableAlias.?",
                    vec![
                        Value::ident(format!("{}.{}", m2m.table, m2m.join_column)),
                        Value::ident(sql_name(table, join_field)),
                    ],
                )
                .where_expr(
                    "? IN (?)",
                    vec![
                        Value::ident(format!("{}.{}", m2m.table, m2m.base_column)),
                        Value::List(keys.into_iter().flatten().collect()),
                    ],
                );
            vec![PARENT_ID_ALIAS.to_string()]
        }
        _ => {
            let key_columns: Vec<String> = relation
                .join_fields
                .iter()
                .map(|f| sql_name(table, f).to_string())
                .collect();

            if let Some(cols) = join.columns() {
                let missing: Vec<String> = key_columns
                    .iter()
                    .filter(|k| !cols.iter().any(|c| sql_name(table, c) == k.as_str()))
                    .cloned()
                    .collect();
                query = query.column(cols.iter().cloned()).column(missing);
            }

            query = if key_columns.len() == 1 {
                query.where_expr(
                    "?TableAlias.? IN (?)",
                    vec![
                        Value::ident(key_columns[0].clone()),
                        Value::List(keys.into_iter().flatten().collect()),
                    ],
                )
            } else {
                let template = key_columns
                    .iter()
                    .map(|_| "?TableAlias.? = ?")
                    .collect::<Vec<_>>()
                    .join(" AND ");
                query.where_group("AND", |mut g| {
                    for key in keys {
                        let args = key_columns
                            .iter()
                            .zip(key)
                            .flat_map(|(col, v)| [Value::ident(col.clone()), v])
                            .collect();
                        g = g.where_or(template.clone(), args);
                    }
                    g
                })
            };
            key_columns
        }
    };

    for node in join.on_nodes() {
        query = query.where_node(node.clone());
    }

    Ok((query, key_columns))
}

/// Walk `path` through to-one relations starting at `entity`.
fn owner<'e>(entity: &'e mut dyn Entity, path: &[&str]) -> Option<&'e mut dyn Entity> {
    let mut current = entity;
    for name in path {
        current = current.related_mut(name)?;
    }
    Some(current)
}

/// `None` when any key field is NULL.
fn entity_key(entity: &dyn Entity, fields: &[&str]) -> Option<(String, Vec<Value>)> {
    let values: Vec<Value> = fields.iter().map(|f| entity.field_value(f)).collect();
    let key = join_keys(values.iter().map(Value::as_key))?;
    Some((key, values))
}

fn row_key(row: &Row, columns: &[String]) -> Option<String> {
    join_keys(columns.iter().map(|c| row.value(c).and_then(Value::as_key)))
}

fn join_keys(parts: impl Iterator<Item = Option<String>>) -> Option<String> {
    let parts: Option<Vec<String>> = parts.collect();
    parts.map(|p| p.join("\u{1f}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::query::join::{JoinScope, add_relation};
    use crate::schema::{Field, ManyToMany, Relation, Table};

    static AUTHORS: Table = Table {
        name: "authors",
        alias: "author",
        fields: &[Field::new("id").pk(), Field::new("name")],
        relations: &[
            Relation::has_many("Books", books, &["id"], &["author_id"]),
            Relation::has_many("Drafts", books, &["id"], &["editor_id"]),
            Relation::many_to_many(
                "Tags",
                tags,
                &["id"],
                &["id"],
                ManyToMany {
                    table: "author_tags",
                    base_column: "author_id",
                    join_column: "tag_id",
                },
            ),
        ],
    };

    static BOOKS: Table = Table {
        name: "books",
        alias: "book",
        fields: &[Field::new("id").pk(), Field::new("author_id"), Field::new("title")],
        relations: &[Relation::belongs_to("Author", authors, &["author_id"], &["id"])],
    };

    static TAGS: Table = Table {
        name: "tags",
        alias: "tag",
        fields: &[Field::new("id").pk(), Field::new("label")],
        relations: &[],
    };

    fn authors() -> &'static Table {
        &AUTHORS
    }

    fn books() -> &'static Table {
        &BOOKS
    }

    fn tags() -> &'static Table {
        &TAGS
    }

    #[test]
    fn test_has_many_query_filters_by_keys() {
        let mut joins = Vec::new();
        add_relation(&mut joins, &AUTHORS, "author", "Books", None).unwrap();
        add_relation(&mut joins, &AUTHORS, "author", "Books.Author", None).unwrap();

        let (query, key_columns) =
            relation_query(&joins[0], vec![vec![Value::from(1)], vec![Value::from(2)]]).unwrap();
        assert_eq!(key_columns, vec!["author_id"]);
        assert_eq!(
            query.to_sql(Dialect::Postgres).unwrap(),
            "SELECT \"book\".\"id\", \"book\".\"author_id\", \"book\".\"title\", \
             \"author\".\"id\" AS \"author__id\", \"author\".\"name\" AS \"author__name\" \
             FROM \"books\" AS \"book\" \
             LEFT JOIN \"authors\" AS \"author\" ON (\"author\".\"id\" = \"book\".\"author_id\") \
             WHERE (\"book\".\"author_id\" IN (1, 2))"
        );
    }

    #[test]
    fn test_undeclared_key_field_keeps_its_name() {
        let mut joins = Vec::new();
        let scope = JoinScope::new().column("title");
        add_relation(&mut joins, &AUTHORS, "author", "Drafts", Some(scope)).unwrap();

        let (query, key_columns) = relation_query(&joins[0], vec![vec![Value::from(3)]]).unwrap();
        assert_eq!(key_columns, vec!["editor_id"]);
        assert_eq!(
            query.to_sql(Dialect::Postgres).unwrap(),
            "SELECT \"book\".\"title\", \"editor_id\" \
             FROM \"books\" AS \"book\" \
             WHERE (\"book\".\"editor_id\" IN (3))"
        );
    }

    #[test]
    fn test_many_to_many_query_selects_parent_id() {
        let mut joins = Vec::new();
        add_relation(&mut joins, &AUTHORS, "author", "Tags", None).unwrap();

        let (query, key_columns) = relation_query(&joins[0], vec![vec![Value::from(7)]]).unwrap();
        assert_eq!(key_columns, vec![PARENT_ID_ALIAS]);
        assert_eq!(
            query.to_sql(Dialect::Postgres).unwrap(),
            "SELECT \"author_tags\".\"author_id\" AS \"__querykit_parent_id\", \
             \"tag\".\"id\", \"tag\".\"label\" \
             FROM \"tags\" AS \"tag\" \
             JOIN \"author_tags\" ON (\"author_tags\".\"tag_id\" = \"tag\".\"id\") \
             WHERE (\"author_tags\".\"author_id\" IN (7))"
        );
    }

    #[test]
    fn test_keys_match_across_int_and_text() {
        let row = Row::from_pairs([("author_id", Value::from("7"))]);
        assert_eq!(row_key(&row, &["author_id".to_string()]), Some("7".to_string()));
        assert_eq!(
            join_keys([Some("7".to_string())].into_iter()),
            Value::from(7).as_key()
        );
        assert_eq!(join_keys([None].into_iter()), None);
    }
}
