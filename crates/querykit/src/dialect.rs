//! SQL dialects and their capability sets.
//!
//! Rendering never hard-codes dialect syntax; it asks the [`Dialect`] for its
//! [`Features`] and for identifier quoting.

use std::fmt;

/// A single dialect capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Feature {
    /// `WITH name AS (...)`
    Cte = 1 << 0,
    /// `SELECT DISTINCT ON (...)`
    DistinctOn = 1 << 1,
    /// `RETURNING ...`
    Returning = 1 << 2,
    /// `VALUES ROW(...), ROW(...)`
    ValuesRow = 1 << 3,
    /// `value::type` casts
    DoubleColonCast = 1 << 4,
    /// `SELECT ... FOR UPDATE`
    SelectFor = 1 << 5,
}

impl Feature {
    fn bit(self) -> u32 {
        self as u32
    }

    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Cte => "common table expressions",
            Feature::DistinctOn => "DISTINCT ON",
            Feature::Returning => "RETURNING",
            Feature::ValuesRow => "VALUES ROW(...)",
            Feature::DoubleColonCast => ":: casts",
            Feature::SelectFor => "SELECT ... FOR",
        }
    }
}

/// A set of [`Feature`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features(u32);

impl Features {
    /// The empty set.
    pub const fn empty() -> Self {
        Features(0)
    }

    /// Build a set from a list of features.
    pub fn from_slice(features: &[Feature]) -> Self {
        features.iter().fold(Self::empty(), |set, f| set.with(*f))
    }

    /// Return a copy with `feature` added.
    pub fn with(self, feature: Feature) -> Self {
        Features(self.0 | feature.bit())
    }

    /// Return a copy with `feature` removed.
    pub fn without(self, feature: Feature) -> Self {
        Features(self.0 & !feature.bit())
    }

    /// Check whether `feature` is in the set.
    pub fn has(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Dialect name.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Capability set of this dialect.
    pub fn features(self) -> Features {
        match self {
            Dialect::Postgres => Features::from_slice(&[
                Feature::Cte,
                Feature::DistinctOn,
                Feature::Returning,
                Feature::DoubleColonCast,
                Feature::SelectFor,
            ]),
            Dialect::MySql => {
                Features::from_slice(&[Feature::Cte, Feature::ValuesRow, Feature::SelectFor])
            }
            Dialect::Sqlite => Features::from_slice(&[Feature::Cte, Feature::Returning]),
        }
    }

    /// Shorthand for `self.features().has(feature)`.
    pub fn has(self, feature: Feature) -> bool {
        self.features().has(feature)
    }

    /// Identifier quote character.
    pub fn ident_quote(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }

    /// Append a quoted identifier.
    ///
    /// Dotted names are quoted per segment and `*` stays bare, so
    /// `u.*` renders as `"u".*`.
    pub fn append_ident(self, out: &mut String, ident: &str) {
        let quote = self.ident_quote();
        for (i, part) in ident.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            if part == "*" {
                out.push('*');
                continue;
            }
            out.push(quote);
            for ch in part.chars() {
                if ch == quote {
                    out.push(quote);
                }
                out.push(ch);
            }
            out.push(quote);
        }
    }

    /// Quote an identifier into a new string.
    pub fn quote_ident(self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        self.append_ident(&mut out, ident);
        out
    }

    /// Positional bind placeholder for the 1-based argument `index`.
    pub fn append_placeholder(self, out: &mut String, index: usize) {
        match self {
            Dialect::Postgres => {
                out.push('$');
                out.push_str(&index.to_string());
            }
            Dialect::MySql | Dialect::Sqlite => out.push('?'),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_sets() {
        assert!(Dialect::Postgres.has(Feature::DistinctOn));
        assert!(!Dialect::Postgres.has(Feature::ValuesRow));
        assert!(Dialect::MySql.has(Feature::ValuesRow));
        assert!(!Dialect::Sqlite.has(Feature::DoubleColonCast));

        let set = Features::empty().with(Feature::Cte).with(Feature::Returning);
        assert!(set.has(Feature::Cte));
        assert!(!set.without(Feature::Cte).has(Feature::Cte));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(Dialect::Postgres.quote_ident("users"), "\"users\"");
        assert_eq!(Dialect::Postgres.quote_ident("u.id"), "\"u\".\"id\"");
        assert_eq!(Dialect::Postgres.quote_ident("u.*"), "\"u\".*");
        assert_eq!(Dialect::Postgres.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySql.quote_ident("users"), "`users`");
    }

    #[test]
    fn test_placeholders() {
        let mut out = String::new();
        Dialect::Postgres.append_placeholder(&mut out, 3);
        Dialect::Sqlite.append_placeholder(&mut out, 3);
        assert_eq!(out, "$3?");
    }
}
