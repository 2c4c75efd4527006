use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::ast::Operator;
use crate::condition::NativeCondition;
use crate::error::SiftResult;

/// Translates logical entity and field names into backend-native names.
///
/// The default implementations are the identity, which is what most
/// backends want; a mapped backend overrides them with its own renaming.
pub trait Observer {
    fn fire_entity(&self, entity: &str) -> String {
        entity.to_string()
    }

    fn fire_field(&self, _entity: &str, field: &str) -> String {
        field.to_string()
    }
}

/// Observer that keeps every name as written.
pub struct IdentityObserver;

impl Observer for IdentityObserver {}

/// Key/value pair handed to `put`, with an optional time-to-live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvPayload {
    pub key: Value,
    pub value: Value,
    pub ttl: Option<Duration>,
}

/// Fully resolved select handed to the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPayload {
    pub entity: String,
    /// Empty means every field
    pub fields: Vec<String>,
    pub condition: Option<NativeCondition>,
    pub sorts: Vec<(String, SortOrder)>,
    pub skip: u64,
    /// Zero means no limit
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Entity with resolved fields, the payload of insert and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub entity: String,
    /// Field declaration order is preserved; nested objects stay nested
    pub fields: Vec<(String, Value)>,
    /// Only populated for insert
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePayload {
    pub entity: String,
    pub condition: Option<NativeCondition>,
}

/// The pluggable storage collaborator.
///
/// The engine validates and assembles queries; execution semantics,
/// blocking included, belong entirely to the implementor. The engine never
/// calls a manager with a payload that failed validation.
pub trait StorageManager {
    fn get(&self, keys: &[Value]) -> SiftResult<Vec<Value>>;

    fn put(&self, payload: KvPayload) -> SiftResult<()>;

    fn remove(&self, keys: &[Value]) -> SiftResult<()>;

    fn select(&self, payload: SelectPayload) -> SiftResult<Vec<Value>>;

    fn update(&self, payload: EntityPayload) -> SiftResult<Vec<Value>>;

    fn insert(&self, payload: EntityPayload) -> SiftResult<Vec<Value>>;

    fn delete(&self, payload: DeletePayload) -> SiftResult<()>;
}

/// Evaluate a native condition against a JSON document. Backends are free
/// to compile conditions into their own plans; this reference evaluation
/// is handy for in-memory managers and tests.
pub fn matches(condition: &NativeCondition, document: &Value) -> bool {
    match condition {
        NativeCondition::Leaf {
            field,
            operator,
            value,
        } => {
            let actual = lookup(document, field);
            match operator {
                Operator::Eq => actual == Some(value),
                Operator::Gt => compare(actual, value).is_some_and(|o| o.is_gt()),
                Operator::Gte => compare(actual, value).is_some_and(|o| o.is_ge()),
                Operator::Lt => compare(actual, value).is_some_and(|o| o.is_lt()),
                Operator::Lte => compare(actual, value).is_some_and(|o| o.is_le()),
                Operator::Like => like(actual, value),
                Operator::Between => match value {
                    Value::Array(bounds) if bounds.len() == 2 => {
                        compare(actual, &bounds[0]).is_some_and(|o| o.is_ge())
                            && compare(actual, &bounds[1]).is_some_and(|o| o.is_le())
                    }
                    _ => false,
                },
                Operator::In => match value {
                    Value::Array(candidates) => {
                        actual.is_some_and(|a| candidates.iter().any(|c| c == a))
                    }
                    _ => false,
                },
            }
        }
        NativeCondition::Not(inner) => !matches(inner, document),
        NativeCondition::And(operands) => operands.iter().all(|c| matches(c, document)),
        NativeCondition::Or(operands) => operands.iter().any(|c| matches(c, document)),
    }
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// LIKE with `%` as the any-length wildcard.
fn like(actual: Option<&Value>, pattern: &Value) -> bool {
    let (Some(Value::String(actual)), Value::String(pattern)) = (actual, pattern) else {
        return false;
    };

    if !pattern.contains('%') {
        return actual == pattern;
    }

    let parts: Vec<&str> = pattern.split('%').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    let Some(after_prefix) = actual.strip_prefix(first) else {
        return false;
    };
    let Some(mut remaining) = after_prefix.strip_suffix(last) else {
        return false;
    };

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    true
}
