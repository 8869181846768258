//! Query builders.
//!
//! [`SelectQuery`] and [`ValuesQuery`] accumulate clauses by value and render
//! through any [`crate::fmt::QueryFormatter`]. Execution goes through
//! [`FrozenSelect`].

mod frozen;
pub mod join;
mod model;
mod select;
mod values;

pub use frozen::{FrozenSelect, ScanCount};
pub use join::{JoinScope, MAX_RELATION_DEPTH, RelationJoin};
pub use model::{ORDER_COLUMN, TableModel};
pub use select::{CteQuery, SelectQuery, WhereGroup, WhereItem};
pub use values::ValuesQuery;

/// Start a SELECT.
pub fn select() -> SelectQuery {
    SelectQuery::new()
}
