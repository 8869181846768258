//! `?` template expansion.

use super::QueryFormatter;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Expands `?Name` references on behalf of the query that owns a template.
pub trait NamedArgAppender {
    /// Append the expansion of `name`.
    ///
    /// Returns `Ok(false)` when the name is not known to this query.
    fn append_named_arg(
        &self,
        fmter: &mut dyn QueryFormatter,
        out: &mut String,
        name: &str,
    ) -> OrmResult<bool>;
}

/// Render `template` with `args` into `out`.
///
/// - `?` takes the next positional argument
/// - `?0`, `?1`, ... take the argument at that index
/// - `?Name` is expanded by `model`
/// - `\?` renders a literal `?`
pub fn format_query(
    fmter: &mut dyn QueryFormatter,
    out: &mut String,
    template: &str,
    args: &[Value],
    model: Option<&dyn NamedArgAppender>,
) -> OrmResult<()> {
    let bytes = template.as_bytes();
    let mut next_arg = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'?') => {
                out.push_str(&template[start..i]);
                out.push('?');
                i += 2;
                start = i;
            }
            b'?' => {
                out.push_str(&template[start..i]);
                i += 1;

                let name_start = i;
                if bytes.get(i).is_some_and(u8::is_ascii_digit) {
                    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                        i += 1;
                    }
                    let index: usize = template[name_start..i].parse().map_err(|_| {
                        OrmError::MissingArgument {
                            template: template.to_string(),
                            index: usize::MAX,
                        }
                    })?;
                    append_positional(fmter, out, template, args, index)?;
                } else if bytes
                    .get(i)
                    .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
                {
                    while bytes
                        .get(i)
                        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    {
                        i += 1;
                    }
                    let name = &template[name_start..i];
                    let handled = match model {
                        Some(model) => model.append_named_arg(fmter, out, name)?,
                        None => false,
                    };
                    if !handled {
                        return Err(OrmError::UnknownPlaceholder(name.to_string()));
                    }
                } else {
                    append_positional(fmter, out, template, args, next_arg)?;
                    next_arg += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&template[start..]);
    Ok(())
}

fn append_positional(
    fmter: &mut dyn QueryFormatter,
    out: &mut String,
    template: &str,
    args: &[Value],
    index: usize,
) -> OrmResult<()> {
    let arg = args.get(index).ok_or_else(|| OrmError::MissingArgument {
        template: template.to_string(),
        index,
    })?;
    fmter.append_arg(out, arg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::fmt::{Formatter, NopFormatter};

    struct Named;

    impl NamedArgAppender for Named {
        fn append_named_arg(
            &self,
            fmter: &mut dyn QueryFormatter,
            out: &mut String,
            name: &str,
        ) -> OrmResult<bool> {
            if name == "TableName" {
                fmter.dialect().append_ident(out, "users");
                return Ok(true);
            }
            Ok(false)
        }
    }

    fn literal(template: &str, args: &[Value]) -> OrmResult<String> {
        let mut out = String::new();
        format_query(
            &mut Formatter::new(Dialect::Postgres),
            &mut out,
            template,
            args,
            Some(&Named),
        )?;
        Ok(out)
    }

    #[test]
    fn test_positional_args() {
        let out = literal("a = ? AND b = ?", &[Value::from(1), Value::from("x")]).unwrap();
        assert_eq!(out, "a = 1 AND b = 'x'");
    }

    #[test]
    fn test_indexed_args() {
        let out = literal("a = ?1 OR b = ?0 OR c = ?1", &[Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(out, "a = 2 OR b = 1 OR c = 2");
    }

    #[test]
    fn test_named_args_expand_in_both_modes() {
        assert_eq!(literal("SELECT * FROM ?TableName", &[]).unwrap(), "SELECT * FROM \"users\"");

        let mut out = String::new();
        format_query(
            &mut NopFormatter::new(Dialect::Postgres),
            &mut out,
            "?TableName.id = ?",
            &[Value::from(3)],
            Some(&Named),
        )
        .unwrap();
        assert_eq!(out, "\"users\".id = ?");
    }

    #[test]
    fn test_escaped_question_mark() {
        assert_eq!(literal("data \\? 'key'", &[]).unwrap(), "data ? 'key'");
    }

    #[test]
    fn test_unknown_named_arg_is_an_error() {
        let err = literal("?Nope", &[]).unwrap_err();
        assert!(matches!(err, OrmError::UnknownPlaceholder(name) if name == "Nope"));
    }

    #[test]
    fn test_missing_argument_is_an_error() {
        let err = literal("a = ? AND b = ?", &[Value::from(1)]).unwrap_err();
        assert!(matches!(err, OrmError::MissingArgument { index: 1, .. }));
    }
}
