use serde_json::Value;
use std::collections::HashMap;

use crate::error::{SiftError, SiftResult};

/// Registry of named parameters for a prepared statement.
///
/// Names are collected during resolution in first-seen order, deduplicated
/// by name. Values arrive later through [`Params::bind`]; a name binds at
/// most once, and execution requires every declared name to be bound.
#[derive(Debug, Default)]
pub struct Params {
    names: Vec<String>,
    values: HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter name observed during resolution. Idempotent
    /// per name; first-seen order is preserved.
    pub fn declare(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) -> SiftResult<()> {
        if !self.names.iter().any(|n| n == name) {
            return Err(SiftError::Parse(format!(
                "Unknown parameter '{}'; declared parameters: {:?}",
                name, self.names
            )));
        }
        if self.values.contains_key(name) {
            return Err(SiftError::IllegalState(format!(
                "Parameter '{}' is already bound",
                name
            )));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Declared names in first-seen order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True only when every declared name has a bound value.
    pub fn is_complete(&self) -> bool {
        self.names.iter().all(|n| self.values.contains_key(n))
    }

    /// Declared names still waiting for a value.
    pub fn unbound(&self) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| !self.values.contains_key(n.as_str()))
            .map(|n| n.as_str())
            .collect()
    }
}
