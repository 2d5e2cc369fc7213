// ============================================================================
// Filter Compiler
// ============================================================================
//
// Translates a Query Filter into the document store's native query
// language: a JSON object using `$and`, `$or`, `$nor` and per-field
// operator objects. Each combinator becomes exactly one node, so the
// compiled query keeps the shape of the input tree.
//
// ============================================================================

use super::{Comparator, Filter, storage_key};
use crate::core::{Document, ManipError, Result};
use regex::Regex;
use serde_json::{Value as Json, json};

/// Backend-native query for the document store.
pub type Query = Document;

/// Compiles an optional filter. An absent filter matches everything.
pub fn compile_filter(filter: Option<&Filter>) -> Result<Query> {
    match filter {
        None => Ok(Query::new()),
        Some(filter) => compile_node(filter),
    }
}

fn compile_node(filter: &Filter) -> Result<Query> {
    let mut query = Query::new();

    match filter {
        Filter::Comparison {
            key,
            comparator,
            value,
        } => {
            let key = validate_key(key)?;
            query.insert(key.to_string(), compile_comparison(key, *comparator, value)?);
        }
        Filter::And(children) => {
            query.insert("$and".into(), compile_children("and", children)?);
        }
        Filter::Or(children) => {
            query.insert("$or".into(), compile_children("or", children)?);
        }
        Filter::Not(child) => {
            query.insert("$nor".into(), Json::Array(vec![Json::Object(compile_node(child)?)]));
        }
    }

    Ok(query)
}

fn compile_children(operator: &str, children: &[Filter]) -> Result<Json> {
    if children.is_empty() {
        return Err(ManipError::CannotBuildQuery(format!(
            "'{}' requires at least one operand",
            operator
        )));
    }

    let compiled = children
        .iter()
        .map(|child| compile_node(child).map(Json::Object))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json::Array(compiled))
}

fn compile_comparison(key: &str, comparator: Comparator, value: &Json) -> Result<Json> {
    let operator = match comparator {
        Comparator::Equal => "$eq",
        Comparator::NotEqual => "$ne",
        Comparator::GreaterThan => "$gt",
        Comparator::GreaterOrEqual => "$gte",
        Comparator::LesserThan => "$lt",
        Comparator::LesserOrEqual => "$lte",
        Comparator::In => "$in",
        Comparator::NotIn => "$nin",
        Comparator::Exists => return Ok(json!({ "$exists": true })),
        Comparator::NotExists => return Ok(json!({ "$exists": false })),
        Comparator::Matches => "$regex",
    };

    if comparator.is_ordering() && !is_orderable(value) {
        return Err(unsupported(key, comparator, value));
    }

    match comparator {
        Comparator::In | Comparator::NotIn if !value.is_array() => {
            return Err(unsupported(key, comparator, value));
        }
        Comparator::Matches => {
            let Json::String(pattern) = value else {
                return Err(unsupported(key, comparator, value));
            };
            Regex::new(pattern).map_err(|err| {
                ManipError::CannotBuildQuery(format!("invalid pattern for '{}': {}", key, err))
            })?;
        }
        _ => {}
    }

    let mut operation = Document::new();
    operation.insert(operator.to_string(), value.clone());
    Ok(Json::Object(operation))
}

fn validate_key(key: &str) -> Result<&str> {
    if key.is_empty() {
        return Err(ManipError::CannotBuildQuery("empty filter key".into()));
    }
    if key.starts_with('$') {
        return Err(ManipError::CannotBuildQuery(format!(
            "filter key '{}' cannot start with '$'",
            key
        )));
    }
    Ok(storage_key(key))
}

fn is_orderable(value: &Json) -> bool {
    matches!(value, Json::Number(_) | Json::String(_) | Json::Bool(_))
}

fn unsupported(key: &str, comparator: Comparator, value: &Json) -> ManipError {
    ManipError::CannotBuildQuery(format!(
        "unsupported predicate: {} {} {}",
        key, comparator, value
    ))
}
