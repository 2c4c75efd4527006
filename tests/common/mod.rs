//! Shared in-memory storage fixture for integration tests.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};
use siftql::storage::matches;
use siftql::{
    DeletePayload, EntityPayload, KvPayload, SiftResult, SelectPayload, SortOrder, StorageManager,
};

/// Install a subscriber routing engine logs through the test writer, so
/// `RUST_LOG=siftql=debug cargo test` shows cache and dispatch activity.
/// Subsequent calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A minimal single-threaded storage collaborator. It keeps a key/value
/// map and per-entity document lists, and records every payload it
/// receives so tests can assert on what the engine assembled.
#[derive(Default)]
pub struct MemoryManager {
    kv: RefCell<HashMap<String, Value>>,
    documents: RefCell<HashMap<String, Vec<Value>>>,
    pub put_payloads: RefCell<Vec<KvPayload>>,
    pub update_payloads: RefCell<Vec<EntityPayload>>,
    pub insert_payloads: RefCell<Vec<EntityPayload>>,
    pub select_payloads: RefCell<Vec<SelectPayload>>,
    pub delete_payloads: RefCell<Vec<DeletePayload>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn with_documents(entity: &str, documents: Vec<Value>) -> Self {
        let manager = Self::new();
        manager
            .documents
            .borrow_mut()
            .insert(entity.to_string(), documents);
        manager
    }

    pub fn documents(&self, entity: &str) -> Vec<Value> {
        self.documents
            .borrow()
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    pub fn kv_value(&self, key: &Value) -> Option<Value> {
        self.kv.borrow().get(&key.to_string()).cloned()
    }

    fn fields_to_document(fields: &[(String, Value)]) -> Value {
        let mut map = Map::new();
        for (field, value) in fields {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

impl StorageManager for MemoryManager {
    fn get(&self, keys: &[Value]) -> SiftResult<Vec<Value>> {
        let kv = self.kv.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| kv.get(&key.to_string()).cloned())
            .collect())
    }

    fn put(&self, payload: KvPayload) -> SiftResult<()> {
        self.kv
            .borrow_mut()
            .insert(payload.key.to_string(), payload.value.clone());
        self.put_payloads.borrow_mut().push(payload);
        Ok(())
    }

    fn remove(&self, keys: &[Value]) -> SiftResult<()> {
        let mut kv = self.kv.borrow_mut();
        for key in keys {
            kv.remove(&key.to_string());
        }
        Ok(())
    }

    fn select(&self, payload: SelectPayload) -> SiftResult<Vec<Value>> {
        let documents = self.documents.borrow();
        let mut rows: Vec<Value> = documents
            .get(&payload.entity)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| {
                        payload
                            .condition
                            .as_ref()
                            .is_none_or(|condition| matches(condition, doc))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for (field, order) in payload.sorts.iter().rev() {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let skip = payload.skip as usize;
        let mut rows: Vec<Value> = rows.into_iter().skip(skip).collect();
        if payload.limit > 0 {
            rows.truncate(payload.limit as usize);
        }

        if !payload.fields.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| {
                    let mut projected = Map::new();
                    for field in &payload.fields {
                        if let Some(value) = row.get(field) {
                            projected.insert(field.clone(), value.clone());
                        }
                    }
                    Value::Object(projected)
                })
                .collect();
        }

        self.select_payloads.borrow_mut().push(payload);
        Ok(rows)
    }

    fn update(&self, payload: EntityPayload) -> SiftResult<Vec<Value>> {
        let mut documents = self.documents.borrow_mut();
        let docs = documents.entry(payload.entity.clone()).or_default();
        for doc in docs.iter_mut() {
            if let Value::Object(map) = doc {
                for (field, value) in &payload.fields {
                    map.insert(field.clone(), value.clone());
                }
            }
        }
        let updated = docs.clone();
        drop(documents);
        self.update_payloads.borrow_mut().push(payload);
        Ok(updated)
    }

    fn insert(&self, payload: EntityPayload) -> SiftResult<Vec<Value>> {
        let document = Self::fields_to_document(&payload.fields);
        self.documents
            .borrow_mut()
            .entry(payload.entity.clone())
            .or_default()
            .push(document.clone());
        self.insert_payloads.borrow_mut().push(payload);
        Ok(vec![document])
    }

    fn delete(&self, payload: DeletePayload) -> SiftResult<()> {
        let mut documents = self.documents.borrow_mut();
        if let Some(docs) = documents.get_mut(&payload.entity) {
            match &payload.condition {
                Some(condition) => docs.retain(|doc| !matches(condition, doc)),
                None => docs.clear(),
            }
        }
        drop(documents);
        self.delete_payloads.borrow_mut().push(payload);
        Ok(())
    }
}
