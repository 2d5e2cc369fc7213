use super::{Comparator, Filter, storage_key};
use crate::core::{Document, json_compare, json_equals, lookup_path};
use regex::Regex;
use serde_json::Value as Json;
use std::cmp::Ordering;

impl Filter {
    /// Evaluates the filter in memory against a stored document.
    ///
    /// This is the reference semantics every compiled query must agree
    /// with. A missing field never satisfies an equality or ordering
    /// predicate except equality with `null`.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Comparison {
                key,
                comparator,
                value,
            } => compare_field(lookup_path(doc, storage_key(key)), *comparator, value),
            Filter::And(children) => children.iter().all(|child| child.matches(doc)),
            Filter::Or(children) => children.iter().any(|child| child.matches(doc)),
            Filter::Not(child) => !child.matches(doc),
        }
    }
}

fn compare_field(field: Option<&Json>, comparator: Comparator, operand: &Json) -> bool {
    match comparator {
        Comparator::Equal => equals(field, operand),
        Comparator::NotEqual => !equals(field, operand),
        Comparator::GreaterThan => ordered(field, operand, |o| o == Ordering::Greater),
        Comparator::GreaterOrEqual => ordered(field, operand, |o| o != Ordering::Less),
        Comparator::LesserThan => ordered(field, operand, |o| o == Ordering::Less),
        Comparator::LesserOrEqual => ordered(field, operand, |o| o != Ordering::Greater),
        Comparator::In => member(field, operand),
        Comparator::NotIn => !member(field, operand),
        Comparator::Exists => field.is_some(),
        Comparator::NotExists => field.is_none(),
        Comparator::Matches => match (field, operand) {
            (Some(Json::String(text)), Json::String(pattern)) => {
                Regex::new(pattern).is_ok_and(|re| re.is_match(text))
            }
            _ => false,
        },
    }
}

fn equals(field: Option<&Json>, operand: &Json) -> bool {
    match field {
        Some(value) => json_equals(value, operand),
        None => operand.is_null(),
    }
}

fn ordered(field: Option<&Json>, operand: &Json, accept: impl Fn(Ordering) -> bool) -> bool {
    field
        .and_then(|value| json_compare(value, operand))
        .is_some_and(accept)
}

fn member(field: Option<&Json>, operand: &Json) -> bool {
    match operand {
        Json::Array(candidates) => candidates.iter().any(|candidate| equals(field, candidate)),
        _ => false,
    }
}
