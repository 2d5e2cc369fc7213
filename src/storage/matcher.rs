// ============================================================================
// Native Query Matcher
// ============================================================================
//
// Evaluates document-store queries (`{"$and": [...]}`, `{"age": {"$gt": 3}}`)
// against stored documents. Several keys in one query object are an
// implicit AND, like the server does.
//
// ============================================================================

use crate::connection::{BackendError, BackendResult};
use crate::core::{Document, json_compare, json_equals, lookup_path};
use crate::filter::Query;
use regex::Regex;
use serde_json::Value as Json;
use std::cmp::Ordering;

pub fn matches(query: &Query, doc: &Document) -> BackendResult<bool> {
    for (key, condition) in query {
        let satisfied = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(clause, doc)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_clause(key, condition, doc)?,
            "$nor" => !any_clause(key, condition, doc)?,
            operator if operator.starts_with('$') => {
                return Err(BackendError::Execution(format!(
                    "unknown top level operator: {}",
                    operator
                )));
            }
            field => field_matches(lookup_path(doc, field), condition)?,
        };

        if !satisfied {
            return Ok(false);
        }
    }

    Ok(true)
}

fn any_clause(operator: &str, condition: &Json, doc: &Document) -> BackendResult<bool> {
    for clause in clauses(operator, condition)? {
        if matches(clause, doc)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn clauses<'a>(operator: &str, condition: &'a Json) -> BackendResult<Vec<&'a Query>> {
    let Json::Array(items) = condition else {
        return Err(BackendError::Execution(format!("{} must be an array", operator)));
    };
    if items.is_empty() {
        return Err(BackendError::Execution(format!(
            "{} must be a nonempty array",
            operator
        )));
    }

    items
        .iter()
        .map(|item| match item {
            Json::Object(clause) => Ok(clause),
            _ => Err(BackendError::Execution(format!(
                "{} argument's entries must be objects",
                operator
            ))),
        })
        .collect()
}

fn field_matches(field: Option<&Json>, condition: &Json) -> BackendResult<bool> {
    let operators = match condition {
        Json::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops,
        _ => return Ok(equals(field, condition)),
    };

    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => ordered(field, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(field, operand, |o| o != Ordering::Less),
            "$lt" => ordered(field, operand, |o| o == Ordering::Less),
            "$lte" => ordered(field, operand, |o| o != Ordering::Greater),
            "$in" => member(operator, field, operand)?,
            "$nin" => !member(operator, field, operand)?,
            "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
            "$regex" => regex_matches(field, operand)?,
            other => {
                return Err(BackendError::Execution(format!("unknown operator: {}", other)));
            }
        };

        if !satisfied {
            return Ok(false);
        }
    }

    Ok(true)
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

fn member(operator: &str, field: Option<&Json>, operand: &Json) -> BackendResult<bool> {
    let Json::Array(candidates) = operand else {
        return Err(BackendError::Execution(format!("{} needs an array", operator)));
    };
    Ok(candidates.iter().any(|candidate| equals(field, candidate)))
}

fn regex_matches(field: Option<&Json>, operand: &Json) -> BackendResult<bool> {
    let Json::String(pattern) = operand else {
        return Err(BackendError::Execution("$regex has to be a string".into()));
    };
    let re = Regex::new(pattern)
        .map_err(|err| BackendError::Execution(format!("invalid regular expression: {}", err)))?;

    Ok(matches!(field, Some(Json::String(text)) if re.is_match(text)))
}
