//! SiftQL is a small textual query language for key/value and document
//! style stores. Query text is parsed into an immutable AST, resolved into
//! a backend-neutral condition algebra and entity payloads, and either
//! executed immediately or compiled into a bind-then-execute prepared
//! statement. Storage itself is a collaborator behind the
//! [`StorageManager`] trait; this crate only parses, validates and
//! assembles queries.
//!
//! ```no_run
//! use siftql::{IdentityObserver, QueryParser, StorageManager};
//!
//! fn run(manager: &dyn StorageManager) -> siftql::SiftResult<()> {
//!     let parser = QueryParser::new();
//!
//!     // Immediate path: no parameters allowed
//!     let rows = parser.query("select from God where age > 18", manager, &IdentityObserver)?;
//!
//!     // Prepared path: bind, then execute exactly once
//!     let mut statement =
//!         parser.prepare("update God (name = @name)", manager, &IdentityObserver)?;
//!     statement.bind("name", "Diana".into())?;
//!     let _updated = statement.result()?;
//!     let _ = rows;
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod cache;
pub mod condition;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod params;
pub mod parser;
pub mod prepared;
pub mod resolver;
pub mod storage;

pub use ast::{
    Condition, DeleteQuery, GetQuery, InsertQuery, Operator, PutQuery, QueryValue, RemoveQuery,
    SelectQuery, Sort, Statement, UpdateQuery,
};
pub use cache::ParseCache;
pub use condition::NativeCondition;
pub use error::{SiftError, SiftResult};
pub use executor::{
    DeleteParser, GetParser, InsertParser, PutParser, QueryParser, RemoveParser, SelectParser,
    UpdateParser,
};
pub use params::Params;
pub use parser::parse;
pub use prepared::PreparedStatement;
pub use storage::{
    DeletePayload, EntityPayload, IdentityObserver, KvPayload, Observer, SelectPayload, SortOrder,
    StorageManager,
};
