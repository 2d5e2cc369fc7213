// ============================================================================
// Query Filter
// ============================================================================
//
// Backend-independent boolean expression tree over field comparisons.
// A filter is built once per call, owned by the request context, and never
// mutated after compilation.
//
// ============================================================================

pub mod compiler;
pub mod eval;

pub use compiler::{Query, compile_filter};

use crate::core::ID_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LesserThan,
    LesserOrEqual,
    In,
    NotIn,
    Exists,
    NotExists,
    Matches,
}

impl Comparator {
    /// Comparators that order values rather than test equality.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterOrEqual | Self::LesserThan | Self::LesserOrEqual
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LesserThan => "<",
            Self::LesserOrEqual => "<=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Exists => "exists",
            Self::NotExists => "not exists",
            Self::Matches => "matches",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Comparison {
        key: String,
        comparator: Comparator,
        value: Json,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Starts a comparison on the given key.
    ///
    /// ```
    /// use manipulate::filter::Filter;
    ///
    /// let filter = Filter::and([
    ///     Filter::key("status").equals("open"),
    ///     Filter::key("priority").greater_than(2),
    /// ]);
    /// ```
    pub fn key(key: impl Into<String>) -> KeyFilter {
        KeyFilter { key: key.into() }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison {
                key,
                comparator: comparator @ (Comparator::Exists | Comparator::NotExists),
                ..
            } => write!(f, "{} {}", key, comparator),
            Self::Comparison {
                key,
                comparator,
                value,
            } => write!(f, "{} {} {}", key, comparator, value),
            Self::And(children) => write_group(f, children, " and "),
            Self::Or(children) => write_group(f, children, " or "),
            Self::Not(child) => write!(f, "not ({})", child),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[Filter], separator: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

/// Pending comparison on one key, see [`Filter::key`].
#[derive(Debug, Clone)]
pub struct KeyFilter {
    key: String,
}

impl KeyFilter {
    fn with(self, comparator: Comparator, value: Json) -> Filter {
        Filter::Comparison {
            key: self.key,
            comparator,
            value,
        }
    }

    pub fn equals(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::Equal, value.into())
    }

    pub fn not_equals(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::NotEqual, value.into())
    }

    pub fn greater_than(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::GreaterThan, value.into())
    }

    pub fn greater_or_equal_than(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::GreaterOrEqual, value.into())
    }

    pub fn lesser_than(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::LesserThan, value.into())
    }

    pub fn lesser_or_equal_than(self, value: impl Into<Json>) -> Filter {
        self.with(Comparator::LesserOrEqual, value.into())
    }

    pub fn in_values<V: Into<Json>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        let values = values.into_iter().map(Into::into).collect();
        self.with(Comparator::In, Json::Array(values))
    }

    pub fn not_in_values<V: Into<Json>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        let values = values.into_iter().map(Into::into).collect();
        self.with(Comparator::NotIn, Json::Array(values))
    }

    pub fn exists(self) -> Filter {
        self.with(Comparator::Exists, Json::Null)
    }

    pub fn not_exists(self) -> Filter {
        self.with(Comparator::NotExists, Json::Null)
    }

    /// Regular expression match on a text field.
    pub fn matches(self, pattern: impl Into<String>) -> Filter {
        self.with(Comparator::Matches, Json::String(pattern.into()))
    }
}

/// Document field a filter key refers to. `id` addresses the identifier.
pub(crate) fn storage_key(key: &str) -> &str {
    if key.eq_ignore_ascii_case("id") {
        ID_FIELD
    } else {
        key
    }
}
