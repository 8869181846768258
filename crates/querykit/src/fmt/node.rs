//! Clause nodes.

use super::{NamedArgAppender, QueryFormatter, format_query};
use crate::error::OrmResult;
use crate::value::Value;

/// One clause fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A SQL template with positional arguments.
    Safe { query: String, args: Vec<Value> },
    /// A caller-supplied identifier, rendered quoted.
    Ident(String),
}

impl QueryNode {
    pub fn safe(query: impl Into<String>, args: Vec<Value>) -> Self {
        QueryNode::Safe {
            query: query.into(),
            args,
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        QueryNode::Ident(name.into())
    }

    /// Number of argument positions this node carries.
    pub fn arg_count(&self) -> usize {
        match self {
            QueryNode::Safe { args, .. } => args.len(),
            QueryNode::Ident(_) => 0,
        }
    }

    pub fn append_query(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        model: Option<&dyn NamedArgAppender>,
    ) -> OrmResult<()> {
        match self {
            QueryNode::Safe { query, args } => format_query(fmter, out, query, args, model),
            QueryNode::Ident(name) => {
                fmter.dialect().append_ident(out, name);
                Ok(())
            }
        }
    }
}

/// A node plus the separator used to join it with its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct SepNode {
    pub sep: &'static str,
    pub node: QueryNode,
}

impl SepNode {
    pub fn and(query: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sep: " AND ",
            node: QueryNode::safe(query, args),
        }
    }

    pub fn or(query: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sep: " OR ",
            node: QueryNode::safe(query, args),
        }
    }
}

/// Append `(node) sep (node) ...`.
pub(crate) fn append_sep_nodes(
    nodes: &[SepNode],
    fmter: &mut dyn QueryFormatter,
    out: &mut String,
    model: Option<&dyn NamedArgAppender>,
) -> OrmResult<()> {
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(n.sep);
        }
        out.push('(');
        n.node.append_query(fmter, out, model)?;
        out.push(')');
    }
    Ok(())
}

/// Append `node, node, ...`.
pub(crate) fn append_list(
    nodes: &[QueryNode],
    fmter: &mut dyn QueryFormatter,
    out: &mut String,
    model: Option<&dyn NamedArgAppender>,
) -> OrmResult<()> {
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        n.append_query(fmter, out, model)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::fmt::Formatter;

    #[test]
    fn test_ident_node_is_never_value_escaped() {
        let node = QueryNode::ident("it's");
        let mut out = String::new();
        node.append_query(&mut Formatter::new(Dialect::Postgres), &mut out, None)
            .unwrap();
        assert_eq!(out, "\"it's\"");
    }

    #[test]
    fn test_sep_nodes() {
        let nodes = vec![
            SepNode::and("a = ?", vec![Value::from(1)]),
            SepNode::or("b IS NULL", vec![]),
            SepNode::and("c > ?", vec![Value::from(2)]),
        ];
        let mut out = String::new();
        append_sep_nodes(&nodes, &mut Formatter::new(Dialect::Postgres), &mut out, None).unwrap();
        assert_eq!(out, "(a = 1) OR (b IS NULL) AND (c > 2)");
    }
}
