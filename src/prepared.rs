use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::ast::Statement;
use crate::error::{SiftError, SiftResult};
use crate::executor;
use crate::params::Params;
use crate::resolver::ParamScope;
use crate::storage::{Observer, StorageManager};

/// A parsed statement awaiting parameter values.
///
/// Lifecycle is bind-then-execute, exactly once: after a successful
/// validation the statement transitions to executed and stays there, so a
/// prepared statement is never shared across threads or replayed.
pub struct PreparedStatement<'a> {
    statement: Arc<Statement>,
    params: Params,
    manager: &'a dyn StorageManager,
    observer: &'a dyn Observer,
    executed: bool,
}

impl std::fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("statement", &self.statement)
            .field("params", &self.params)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}

impl<'a> PreparedStatement<'a> {
    pub(crate) fn new(
        statement: Arc<Statement>,
        params: Params,
        manager: &'a dyn StorageManager,
        observer: &'a dyn Observer,
    ) -> Self {
        Self {
            statement,
            params,
            manager,
            observer,
            executed: false,
        }
    }

    /// Bind a value to a declared parameter. Fails for names the statement
    /// never declared and for names already bound.
    pub fn bind(&mut self, name: &str, value: Value) -> SiftResult<&mut Self> {
        self.params.bind(name, value)?;
        Ok(self)
    }

    /// Declared parameter names in first-seen order.
    pub fn parameters(&self) -> &[String] {
        self.params.names()
    }

    /// True once every declared parameter has a bound value.
    pub fn is_complete(&self) -> bool {
        self.params.is_complete()
    }

    /// Execute the statement and return its result rows.
    pub fn result(&mut self) -> SiftResult<Vec<Value>> {
        if self.executed {
            return Err(SiftError::IllegalState(
                "Prepared statement was already executed".to_string(),
            ));
        }
        if !self.params.is_complete() {
            return Err(SiftError::Parse(format!(
                "Cannot execute with unbound parameters: {:?}",
                self.params.unbound()
            )));
        }

        // Terminal from here on, even if the collaborator fails
        self.executed = true;
        debug!(statement = self.statement.kind(), "executing prepared statement");
        executor::execute(
            &self.statement,
            self.manager,
            self.observer,
            &mut ParamScope::Binding(&self.params),
        )
    }

    /// Execute expecting at most one result row.
    pub fn single_result(&mut self) -> SiftResult<Option<Value>> {
        let mut rows = self.result()?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(SiftError::AmbiguousResult(n)),
        }
    }
}
