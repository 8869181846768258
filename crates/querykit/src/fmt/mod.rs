//! Formatters: how argument values end up in rendered SQL.
//!
//! Every clause node renders itself through a [`QueryFormatter`]. The same
//! built query can be rendered by any of them:
//!
//! - [`Formatter`]: literal mode, values are inlined as dialect literals
//! - [`NopFormatter`]: placeholder mode, every argument becomes `?`
//! - [`ArgsFormatter`]: bind mode, dialect placeholders plus an argument list
//!
//! ```ignore
//! let q = select().model::<Book>().where_expr("id = ?", args![5]);
//! q.to_sql(Dialect::Postgres)?;          // ... WHERE (id = 5)
//! q.to_template_sql(Dialect::Postgres)?; // ... WHERE (id = ?)
//! ```

mod node;
mod template;

pub use node::{QueryNode, SepNode};
pub(crate) use node::{append_list, append_sep_nodes};
pub use template::{NamedArgAppender, format_query};

use crate::dialect::{Dialect, Feature};
use crate::value::Value;

/// Renders argument values into an output buffer.
pub trait QueryFormatter {
    /// Dialect used for identifiers, literals and capability checks.
    fn dialect(&self) -> Dialect;

    /// Capability check used by clause rendering.
    fn has_feature(&self, feature: Feature) -> bool {
        self.dialect().has(feature)
    }

    /// `true` for placeholder (template) rendering.
    fn is_nop(&self) -> bool {
        false
    }

    /// Append one argument.
    fn append_arg(&mut self, out: &mut String, value: &Value);
}

/// Literal mode: arguments are interpolated as quoted SQL literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    dialect: Dialect,
}

impl Formatter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl QueryFormatter for Formatter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn append_arg(&mut self, out: &mut String, value: &Value) {
        value.append_literal(self.dialect, out);
    }
}

/// Placeholder mode: every argument position renders as `?`.
///
/// The output depends only on the query shape, never on bound data.
/// `Ident` and `Safe` arguments are part of that shape and stay inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopFormatter {
    dialect: Dialect,
}

impl NopFormatter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl QueryFormatter for NopFormatter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn is_nop(&self) -> bool {
        true
    }

    fn append_arg(&mut self, out: &mut String, value: &Value) {
        match value {
            Value::Ident(_) | Value::Safe(_) => value.append_literal(self.dialect, out),
            _ => out.push('?'),
        }
    }
}

/// Bind mode: arguments render as positional placeholders and are collected.
///
/// `Ident` and `Safe` arguments are structural and stay inline.
#[derive(Debug, Clone, Default)]
pub struct ArgsFormatter {
    dialect: Dialect,
    args: Vec<Value>,
}

impl ArgsFormatter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            args: Vec::new(),
        }
    }

    /// Collected arguments, in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

impl QueryFormatter for ArgsFormatter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn append_arg(&mut self, out: &mut String, value: &Value) {
        match value {
            Value::Ident(_) | Value::Safe(_) => value.append_literal(self.dialect, out),
            Value::List(items) if !items.is_empty() => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.append_arg(out, item);
                }
            }
            other => {
                self.args.push(other.clone());
                self.dialect.append_placeholder(out, self.args.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatters_render_same_arg_differently() {
        let v = Value::from("bob");

        let mut out = String::new();
        Formatter::new(Dialect::Postgres).append_arg(&mut out, &v);
        assert_eq!(out, "'bob'");

        let mut out = String::new();
        NopFormatter::new(Dialect::Postgres).append_arg(&mut out, &v);
        assert_eq!(out, "?");

        let mut fmter = ArgsFormatter::new(Dialect::Postgres);
        let mut out = String::new();
        fmter.append_arg(&mut out, &v);
        fmter.append_arg(&mut out, &Value::from(vec![1, 2]));
        assert_eq!(out, "$1$2, $3");
        assert_eq!(fmter.args().len(), 3);
    }

    #[test]
    fn test_args_formatter_keeps_identifiers_inline() {
        let mut fmter = ArgsFormatter::new(Dialect::Postgres);
        let mut out = String::new();
        fmter.append_arg(&mut out, &Value::ident("name"));
        assert_eq!(out, "\"name\"");
        assert!(fmter.args().is_empty());
    }
}
