use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::ast::Statement;
use crate::cache::ParseCache;
use crate::condition;
use crate::error::{SiftError, SiftResult};
use crate::params::Params;
use crate::parser;
use crate::prepared::PreparedStatement;
use crate::resolver::{resolve, ParamScope};
use crate::storage::{
    DeletePayload, EntityPayload, KvPayload, Observer, SelectPayload, SortOrder, StorageManager,
};

/// Shortest statement the dispatcher accepts (`get` plus a key).
const MIN_QUERY_LENGTH: usize = 4;

const DOCUMENT_VERBS: [&str; 4] = ["select", "update", "insert", "delete"];
const KEY_VALUE_PREFIXES: [&str; 4] = ["get", "put", "del", "rem"];

/// A fully resolved statement, ready to hand to the storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    Get(Vec<Value>),
    Put(KvPayload),
    Remove(Vec<Value>),
    Select(SelectPayload),
    Update(EntityPayload),
    Insert(EntityPayload),
    Delete(DeletePayload),
}

/// Resolve a parsed statement into its native payload. The declaring pass
/// runs this with `ParamScope::Declaring` purely for parameter registration
/// and validation; the payload itself is discarded.
pub(crate) fn assemble(
    statement: &Statement,
    observer: &dyn Observer,
    scope: &mut ParamScope<'_>,
) -> SiftResult<Payload> {
    match statement {
        Statement::Get(get) => {
            let mut keys = Vec::with_capacity(get.keys.len());
            for key in &get.keys {
                keys.push(resolve(key, scope)?);
            }
            Ok(Payload::Get(keys))
        }
        Statement::Put(put) => Ok(Payload::Put(KvPayload {
            key: resolve(&put.key, scope)?,
            value: resolve(&put.value, scope)?,
            ttl: put.ttl,
        })),
        Statement::Remove(remove) => {
            let mut keys = Vec::with_capacity(remove.keys.len());
            for key in &remove.keys {
                keys.push(resolve(key, scope)?);
            }
            Ok(Payload::Remove(keys))
        }
        Statement::Select(select) => {
            let entity = observer.fire_entity(&select.entity);
            let condition = select
                .condition
                .as_ref()
                .map(|c| condition::build(c, &select.entity, observer, scope))
                .transpose()?;

            Ok(Payload::Select(SelectPayload {
                fields: select
                    .fields
                    .iter()
                    .map(|f| observer.fire_field(&select.entity, f))
                    .collect(),
                sorts: select
                    .sorts
                    .iter()
                    .map(|s| {
                        let order = if s.ascending {
                            SortOrder::Asc
                        } else {
                            SortOrder::Desc
                        };
                        (observer.fire_field(&select.entity, &s.field), order)
                    })
                    .collect(),
                skip: select.skip,
                limit: select.limit,
                condition,
                entity,
            }))
        }
        Statement::Update(update) => Ok(Payload::Update(entity_payload(
            &update.entity,
            &update.fields,
            None,
            observer,
            scope,
        )?)),
        Statement::Insert(insert) => Ok(Payload::Insert(entity_payload(
            &insert.entity,
            &insert.fields,
            insert.ttl,
            observer,
            scope,
        )?)),
        Statement::Delete(delete) => {
            let condition = delete
                .condition
                .as_ref()
                .map(|c| condition::build(c, &delete.entity, observer, scope))
                .transpose()?;
            Ok(Payload::Delete(DeletePayload {
                entity: observer.fire_entity(&delete.entity),
                condition,
            }))
        }
    }
}

fn entity_payload(
    entity: &str,
    fields: &[(String, crate::ast::QueryValue)],
    ttl: Option<std::time::Duration>,
    observer: &dyn Observer,
    scope: &mut ParamScope<'_>,
) -> SiftResult<EntityPayload> {
    let mut resolved = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        resolved.push((observer.fire_field(entity, field), resolve(value, scope)?));
    }
    Ok(EntityPayload {
        entity: observer.fire_entity(entity),
        fields: resolved,
        ttl,
    })
}

/// Resolve and run a statement against the storage collaborator.
pub(crate) fn execute(
    statement: &Statement,
    manager: &dyn StorageManager,
    observer: &dyn Observer,
    scope: &mut ParamScope<'_>,
) -> SiftResult<Vec<Value>> {
    debug!(statement = statement.kind(), "executing statement");
    match assemble(statement, observer, scope)? {
        Payload::Get(keys) => manager.get(&keys),
        Payload::Put(payload) => {
            manager.put(payload)?;
            Ok(Vec::new())
        }
        Payload::Remove(keys) => {
            manager.remove(&keys)?;
            Ok(Vec::new())
        }
        Payload::Select(payload) => manager.select(payload),
        Payload::Update(payload) => manager.update(payload),
        Payload::Insert(payload) => manager.insert(payload),
        Payload::Delete(payload) => {
            manager.delete(payload)?;
            Ok(Vec::new())
        }
    }
}

fn check_kind(statement: &Statement, expected: &'static str) -> SiftResult<()> {
    if statement.kind() == expected {
        Ok(())
    } else {
        Err(SiftError::Parse(format!(
            "Expected a {} statement, got a {} statement",
            expected,
            statement.kind()
        )))
    }
}

fn query_with_kind(
    text: &str,
    expected: &'static str,
    manager: &dyn StorageManager,
    observer: &dyn Observer,
) -> SiftResult<Vec<Value>> {
    let statement = parser::parse(text)?;
    check_kind(&statement, expected)?;
    execute(&statement, manager, observer, &mut ParamScope::Forbidden)
}

fn prepare_with_kind<'a>(
    text: &str,
    expected: &'static str,
    manager: &'a dyn StorageManager,
    observer: &'a dyn Observer,
) -> SiftResult<PreparedStatement<'a>> {
    let statement = parser::parse(text)?;
    check_kind(&statement, expected)?;
    prepare_statement(Arc::new(statement), manager, observer)
}

fn prepare_statement<'a>(
    statement: Arc<Statement>,
    manager: &'a dyn StorageManager,
    observer: &'a dyn Observer,
) -> SiftResult<PreparedStatement<'a>> {
    let mut params = Params::new();
    assemble(
        &statement,
        observer,
        &mut ParamScope::Declaring(&mut params),
    )?;
    Ok(PreparedStatement::new(statement, params, manager, observer))
}

macro_rules! statement_parser {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name;

        impl $name {
            /// Parse and execute immediately; parameters are not allowed.
            pub fn query(
                &self,
                text: &str,
                manager: &dyn StorageManager,
                observer: &dyn Observer,
            ) -> SiftResult<Vec<Value>> {
                query_with_kind(text, $kind, manager, observer)
            }

            /// Parse into an unexecuted statement; parameters are allowed
            /// and bound later.
            pub fn prepare<'a>(
                &self,
                text: &str,
                manager: &'a dyn StorageManager,
                observer: &'a dyn Observer,
            ) -> SiftResult<PreparedStatement<'a>> {
                prepare_with_kind(text, $kind, manager, observer)
            }
        }
    };
}

statement_parser!(
    /// Engine for `get` statements.
    GetParser,
    "get"
);
statement_parser!(
    /// Engine for `put` statements.
    PutParser,
    "put"
);
statement_parser!(
    /// Engine for `remove`/`del` statements.
    RemoveParser,
    "remove"
);
statement_parser!(
    /// Engine for `select` statements.
    SelectParser,
    "select"
);
statement_parser!(
    /// Engine for `update` statements.
    UpdateParser,
    "update"
);
statement_parser!(
    /// Engine for `insert` statements.
    InsertParser,
    "insert"
);
statement_parser!(
    /// Engine for `delete` statements.
    DeleteParser,
    "delete"
);

/// Front door of the engine: validates the command verb, memoizes parses
/// and routes statements to execution or preparation.
#[derive(Default)]
pub struct QueryParser {
    cache: ParseCache,
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, resolve and execute immediately. Parameters are not allowed
    /// on this path; use [`QueryParser::prepare`] for parameterized
    /// queries.
    pub fn query(
        &self,
        text: &str,
        manager: &dyn StorageManager,
        observer: &dyn Observer,
    ) -> SiftResult<Vec<Value>> {
        let statement = self.parse_cached(text)?;
        execute(&statement, manager, observer, &mut ParamScope::Forbidden)
    }

    /// As [`QueryParser::query`], expecting at most one result row.
    pub fn query_single(
        &self,
        text: &str,
        manager: &dyn StorageManager,
        observer: &dyn Observer,
    ) -> SiftResult<Option<Value>> {
        let mut rows = self.query(text, manager, observer)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(SiftError::AmbiguousResult(n)),
        }
    }

    /// Parse into a prepared statement whose parameters are bound later.
    pub fn prepare<'a>(
        &self,
        text: &str,
        manager: &'a dyn StorageManager,
        observer: &'a dyn Observer,
    ) -> SiftResult<PreparedStatement<'a>> {
        let statement = self.parse_cached(text)?;
        prepare_statement(statement, manager, observer)
    }

    fn parse_cached(&self, text: &str) -> SiftResult<Arc<Statement>> {
        Self::validate_verb(text)?;
        self.cache.get_or_parse(text.trim(), parser::parse)
    }

    /// Cheap dispatch check before any grammar work: a minimum length and
    /// a recognized verb. Document statements dispatch on the leading
    /// keyword, key/value statements on a fixed three-character prefix.
    fn validate_verb(text: &str) -> SiftResult<()> {
        let trimmed = text.trim();
        if trimmed.len() < MIN_QUERY_LENGTH {
            return Err(SiftError::Parse(format!(
                "Query too short to hold a statement: '{}'",
                trimmed
            )));
        }

        let verb = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        if DOCUMENT_VERBS.contains(&verb.as_str()) {
            return Ok(());
        }
        if let Some(prefix) = verb.get(..3) {
            if KEY_VALUE_PREFIXES.contains(&prefix) {
                return Ok(());
            }
        }

        Err(SiftError::Parse(format!(
            "Unrecognized command '{}' in query '{}'",
            verb, trimmed
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_verb_accepts_known_commands() {
        for text in [
            "get \"a\"",
            "put {\"a\", 1}",
            "del \"a\"",
            "remove \"a\"",
            "select from God",
            "update God (name = \"Diana\")",
            "insert God (name = \"Diana\")",
            "delete from God",
        ] {
            assert!(QueryParser::validate_verb(text).is_ok(), "rejected {}", text);
        }
    }

    #[test]
    fn test_validate_verb_rejects_unknown_and_short() {
        assert!(QueryParser::validate_verb("gut \"a\"").is_err());
        assert!(QueryParser::validate_verb("drop God").is_err());
        assert!(QueryParser::validate_verb("ge").is_err());
        assert!(QueryParser::validate_verb("   ").is_err());
    }
}
