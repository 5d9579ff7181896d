//! Boolean category query AST and the feed-path query syntax.
//!
//! The feed path embeds `(scheme)term` predicates combined left-to-right
//! with `AND` / `OR` tokens. `NOT` has no surface syntax; the node exists
//! for upstream tagging producers that emit query trees directly.

use crate::entry::CategoryTerm;
use crate::error::QueryError;
use serde::{Deserialize, Serialize};

/// A tree of term predicates over one collection's category indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryQuery {
    /// Match entries carrying the term. A `None` scheme matches the term
    /// under any scheme.
    Simple {
        scheme: Option<String>,
        term: String,
    },
    /// Sorted intersection of both children.
    And(Box<CategoryQuery>, Box<CategoryQuery>),
    /// Sorted union of both children, deduplicated.
    Or(Box<CategoryQuery>, Box<CategoryQuery>),
    /// The ambient entry universe minus the inner result. Only
    /// meaningful relative to a floor, never as a standalone term.
    Not(Box<CategoryQuery>),
}

impl CategoryQuery {
    pub fn simple(scheme: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Simple {
            scheme: Some(scheme.into()),
            term: term.into(),
        }
    }

    pub fn term_only(term: impl Into<String>) -> Self {
        Self::Simple {
            scheme: None,
            term: term.into(),
        }
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl From<CategoryTerm> for CategoryQuery {
    fn from(t: CategoryTerm) -> Self {
        Self::simple(t.scheme, t.term)
    }
}

/// Parse one `(scheme)term` or bare `term` predicate.
fn parse_predicate(token: &str) -> Result<CategoryQuery, QueryError> {
    if let Some(rest) = token.strip_prefix('(') {
        let close = rest.find(')').ok_or_else(|| QueryError::UnbalancedScheme {
            input: token.to_string(),
        })?;
        let scheme = &rest[..close];
        let term = &rest[close + 1..];
        if scheme.is_empty() {
            return Err(QueryError::UnbalancedScheme {
                input: token.to_string(),
            });
        }
        if term.is_empty() {
            return Err(QueryError::EmptyTerm);
        }
        Ok(CategoryQuery::simple(scheme, term))
    } else if token.contains(')') {
        Err(QueryError::UnbalancedScheme {
            input: token.to_string(),
        })
    } else if token.is_empty() {
        Err(QueryError::EmptyTerm)
    } else {
        Ok(CategoryQuery::term_only(token))
    }
}

/// Parse a feed-path category query.
///
/// Tokens are separated by `/` or whitespace; predicates alternate with
/// `AND` / `OR` operators and fold left-to-right:
/// `(urn:color)red AND (urn:size)big OR small` parses as
/// `Or(And(red, big), small)`.
pub fn parse_category_query(input: &str) -> Result<CategoryQuery, QueryError> {
    let mut tokens = input
        .split(|c: char| c == '/' || c.is_whitespace())
        .filter(|t| !t.is_empty());

    let first = tokens.next().ok_or(QueryError::Empty)?;
    let mut query = parse_predicate(first)?;

    while let Some(op) = tokens.next() {
        let rhs = tokens.next().ok_or_else(|| QueryError::DanglingOperator {
            operator: op.to_string(),
        })?;
        let rhs = parse_predicate(rhs)?;
        query = match op {
            "AND" => query.and(rhs),
            "OR" => query.or(rhs),
            other => {
                return Err(QueryError::DanglingOperator {
                    operator: other.to_string(),
                })
            }
        };
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_predicate() {
        let q = parse_category_query("(urn:color)red").unwrap();
        assert_eq!(q, CategoryQuery::simple("urn:color", "red"));
    }

    #[test]
    fn parses_schemeless_term() {
        let q = parse_category_query("red").unwrap();
        assert_eq!(q, CategoryQuery::term_only("red"));
    }

    #[test]
    fn folds_left_to_right() {
        let q = parse_category_query("(a)x AND (a)y OR (b)z").unwrap();
        assert_eq!(
            q,
            CategoryQuery::simple("a", "x")
                .and(CategoryQuery::simple("a", "y"))
                .or(CategoryQuery::simple("b", "z"))
        );
    }

    #[test]
    fn slash_separated_path_form() {
        let q = parse_category_query("(urn:color)red/AND/(urn:size)big").unwrap();
        assert_eq!(
            q,
            CategoryQuery::simple("urn:color", "red").and(CategoryQuery::simple("urn:size", "big"))
        );
    }

    #[test]
    fn rejects_unbalanced_scheme() {
        assert!(matches!(
            parse_category_query("(urn:color red"),
            Err(QueryError::UnbalancedScheme { .. })
        ));
        assert!(matches!(
            parse_category_query("urn:color)red"),
            Err(QueryError::UnbalancedScheme { .. })
        ));
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(matches!(
            parse_category_query("(a)x AND"),
            Err(QueryError::DanglingOperator { .. })
        ));
        assert!(matches!(
            parse_category_query("(a)x XOR (a)y"),
            Err(QueryError::DanglingOperator { .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse_category_query("  "), Err(QueryError::Empty)));
        assert!(matches!(
            parse_category_query("(scheme)"),
            Err(QueryError::EmptyTerm)
        ));
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        // Lowercase keeps generated tokens clear of the operator
        // keywords and the separator characters.
        const TOKEN: &str = "[a-z][a-z0-9:._-]{0,8}";

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// Rendering a predicate chain and parsing it back
            /// reproduces the left-folded tree exactly.
            #[test]
            fn prop_parse_inverts_rendering(
                scheme in TOKEN,
                term in TOKEN,
                rest in prop::collection::vec((any::<bool>(), TOKEN, TOKEN), 0..5),
            ) {
                let mut rendered = format!("({scheme}){term}");
                let mut expected = CategoryQuery::simple(scheme, term);
                for (is_and, scheme, term) in rest {
                    let op = if is_and { "AND" } else { "OR" };
                    rendered.push_str(&format!(" {op} ({scheme}){term}"));
                    let rhs = CategoryQuery::simple(scheme, term);
                    expected = if is_and { expected.and(rhs) } else { expected.or(rhs) };
                }
                prop_assert_eq!(parse_category_query(&rendered).unwrap(), expected);
            }

            /// A bare token always parses as a schemeless predicate.
            #[test]
            fn prop_bare_token_is_schemeless(term in TOKEN) {
                prop_assert_eq!(
                    parse_category_query(&term).unwrap(),
                    CategoryQuery::term_only(term)
                );
            }
        }
    }
}
