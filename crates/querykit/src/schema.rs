//! Table metadata: the contract between models and the query builders.
//!
//! Metadata is plain `'static` data, so it can be declared in statics:
//!
//! ```ignore
//! static BOOKS: Table = Table {
//!     name: "books",
//!     alias: "book",
//!     fields: &[Field::new("id").pk(), Field::new("title"), Field::new("author_id")],
//!     relations: &[Relation::belongs_to("Author", authors, &["author_id"], &["id"])],
//! };
//! fn authors() -> &'static Table { &AUTHORS }
//! ```
//!
//! Related tables are referenced through `fn() -> &'static Table` so that
//! self-referencing and mutually-referencing tables can be declared.

use crate::error::OrmResult;
use crate::row::{FromRow, Row};
use crate::value::Value;

/// How a relation resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
    ManyToMany,
}

impl RelationKind {
    /// At most one related row per owning row (flattened into the SELECT).
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationKind::HasOne | RelationKind::BelongsTo)
    }
}

/// One column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Name used by [`Entity::field_value`].
    pub name: &'static str,
    /// Column name in SQL.
    pub sql_name: &'static str,
    /// Declared SQL type, appended as a cast in VALUES lists.
    pub sql_type: Option<&'static str>,
    /// Part of the primary key.
    pub pk: bool,
    /// Set when the row is soft deleted; SELECTs skip rows where it is not NULL.
    pub soft_delete: bool,
}

impl Field {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            sql_name: name,
            sql_type: None,
            pk: false,
            soft_delete: false,
        }
    }

    pub const fn column(mut self, sql_name: &'static str) -> Self {
        self.sql_name = sql_name;
        self
    }

    pub const fn sql_type(mut self, sql_type: &'static str) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    pub const fn pk(mut self) -> Self {
        self.pk = true;
        self
    }

    pub const fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }
}

/// Junction table of a many-to-many relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManyToMany {
    pub table: &'static str,
    /// Junction column pointing at the owning row.
    pub base_column: &'static str,
    /// Junction column pointing at the related row.
    pub join_column: &'static str,
}

/// A declared relation.
///
/// The join condition is `join_table.join_fields[i] = base.base_fields[i]`.
/// For many-to-many, `base_fields` are the owner's key and `join_fields` the
/// related key, both matched through [`ManyToMany`].
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub join_table: fn() -> &'static Table,
    pub base_fields: &'static [&'static str],
    pub join_fields: &'static [&'static str],
    pub m2m: Option<ManyToMany>,
}

impl Relation {
    pub const fn has_one(
        name: &'static str,
        join_table: fn() -> &'static Table,
        base_fields: &'static [&'static str],
        join_fields: &'static [&'static str],
    ) -> Self {
        Self::new(RelationKind::HasOne, name, join_table, base_fields, join_fields)
    }

    pub const fn belongs_to(
        name: &'static str,
        join_table: fn() -> &'static Table,
        base_fields: &'static [&'static str],
        join_fields: &'static [&'static str],
    ) -> Self {
        Self::new(RelationKind::BelongsTo, name, join_table, base_fields, join_fields)
    }

    pub const fn has_many(
        name: &'static str,
        join_table: fn() -> &'static Table,
        base_fields: &'static [&'static str],
        join_fields: &'static [&'static str],
    ) -> Self {
        Self::new(RelationKind::HasMany, name, join_table, base_fields, join_fields)
    }

    pub const fn many_to_many(
        name: &'static str,
        join_table: fn() -> &'static Table,
        base_fields: &'static [&'static str],
        join_fields: &'static [&'static str],
        m2m: ManyToMany,
    ) -> Self {
        let mut rel = Self::new(
            RelationKind::ManyToMany,
            name,
            join_table,
            base_fields,
            join_fields,
        );
        rel.m2m = Some(m2m);
        rel
    }

    const fn new(
        kind: RelationKind,
        name: &'static str,
        join_table: fn() -> &'static Table,
        base_fields: &'static [&'static str],
        join_fields: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind,
            join_table,
            base_fields,
            join_fields,
            m2m: None,
        }
    }

    /// Metadata of the related table.
    pub fn table(&self) -> &'static Table {
        (self.join_table)()
    }
}

/// Metadata of one table.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub alias: &'static str,
    pub fields: &'static [Field],
    pub relations: &'static [Relation],
}

impl Table {
    /// Look a field up by name or SQL name.
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields
            .iter()
            .find(|f| f.name == name || f.sql_name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Primary key fields, in declaration order.
    pub fn pks(&self) -> impl Iterator<Item = &'static Field> {
        self.fields.iter().filter(|f| f.pk)
    }

    pub fn soft_delete_field(&self) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.soft_delete)
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Object-safe access to one model instance.
pub trait Entity: Send + Sync {
    /// Value of the field named `field` (see [`Field::name`]).
    fn field_value(&self, field: &str) -> Value;

    /// Attach the rows loaded for a has-many / many-to-many relation.
    ///
    /// Called once per parent, with an empty vector when nothing matched.
    fn set_relation(&mut self, relation: &str, rows: Vec<Row>) -> OrmResult<()> {
        let _ = (relation, rows);
        Ok(())
    }

    /// The nested entity of a has-one / belongs-to relation, if decoded.
    ///
    /// Needed to load has-many relations that hang below a to-one relation.
    fn related_mut(&mut self, relation: &str) -> Option<&mut dyn Entity> {
        let _ = relation;
        None
    }

    /// Called after a SELECT materialized this entity.
    fn after_select(&mut self) -> OrmResult<()> {
        Ok(())
    }
}

/// A type bound to a table.
pub trait Model: Entity + FromRow + Sized + 'static {
    fn table() -> &'static Table;
}

#[cfg(test)]
mod tests {
    use super::*;

    static USERS: Table = Table {
        name: "users",
        alias: "user",
        fields: &[
            Field::new("id").pk().sql_type("bigint"),
            Field::new("email").column("email_address"),
        ],
        relations: &[Relation::has_many("Posts", posts, &["id"], &["user_id"])],
    };

    static POSTS: Table = Table {
        name: "posts",
        alias: "post",
        fields: &[Field::new("id").pk(), Field::new("user_id")],
        relations: &[Relation::belongs_to("User", users, &["user_id"], &["id"])],
    };

    fn users() -> &'static Table {
        &USERS
    }

    fn posts() -> &'static Table {
        &POSTS
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(USERS.field("email").map(|f| f.sql_name), Some("email_address"));
        assert_eq!(USERS.field("email_address").map(|f| f.name), Some("email"));
        assert!(!USERS.has_field("missing"));
        assert_eq!(USERS.pks().map(|f| f.name).collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_relations_resolve_through_fn_pointers() {
        let posts = USERS.relation("Posts").unwrap();
        assert_eq!(posts.kind, RelationKind::HasMany);
        assert_eq!(posts.table().name, "posts");
        let back = posts.table().relation("User").unwrap();
        assert!(back.kind.is_to_one());
        assert_eq!(back.table().name, "users");
    }
}
