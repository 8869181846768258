//! # querykit
//!
//! A composable SELECT / VALUES query builder that renders the same query
//! either with inlined literals or with placeholders.
//!
//! ## Features
//!
//! - **Dual rendering**: `to_sql` inlines dialect literals, `to_template_sql`
//!   renders `?` for every argument, `to_sql_with_args` binds
//! - **Relations**: has-one / belongs-to joins flattened into the SELECT,
//!   has-many / many-to-many loaded with one extra query each
//! - **Bulk values**: `VALUES` lists from typed models or dynamic rows
//! - **Dialects**: Postgres, MySQL and SQLite capability sets
//! - **Execution**: scan, count and concurrent scan-and-count over any
//!   `GenericClient`, with timeouts and `tracing` SQL logs
//!
//! ```ignore
//! use querykit::{Dialect, args, select};
//!
//! let q = select().model::<Book>().where_expr("id = ?", args![5]).limit(10);
//! assert_eq!(
//!     q.to_sql(Dialect::Postgres)?,
//!     r#"SELECT "book"."id", "book"."title" FROM "books" AS "book" WHERE (id = 5) LIMIT 10"#,
//! );
//! assert_eq!(
//!     q.to_template_sql(Dialect::Postgres)?,
//!     r#"SELECT "book"."id", "book"."title" FROM "books" AS "book" WHERE (id = ?) LIMIT 10"#,
//! );
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod fmt;
pub mod query;
pub mod relation;
pub mod row;
pub mod schema;
pub mod value;

pub use client::GenericClient;
pub use config::{DbConfig, LogLevel};
pub use db::Db;
pub use dialect::{Dialect, Feature, Features};
pub use error::{BuildError, OrmError, OrmResult};
pub use fmt::{ArgsFormatter, Formatter, NamedArgAppender, NopFormatter, QueryFormatter, QueryNode};
pub use query::{
    CteQuery, FrozenSelect, JoinScope, ScanCount, SelectQuery, TableModel, ValuesQuery, WhereGroup,
    select,
};
pub use row::{Destination, FromRow, Row, ValueMap};
pub use schema::{Entity, Field, ManyToMany, Model, Relation, RelationKind, Table};
pub use value::{FromValue, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, pooled_db};
