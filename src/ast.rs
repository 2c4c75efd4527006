use serde_json::Number;
use std::time::Duration;

/// A value as it appears in query text, before resolution.
///
/// Parse artifacts are pure data: nodes are created once by the parser and
/// never mutated, so a cached statement can be shared freely.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Numeric literal (signed and decimal forms)
    Number(Number),

    /// Quoted string literal
    Text(String),

    /// Boolean literal
    Bool(bool),

    /// Array literal `{a, b}` or parenthesized list `(a, b)`
    Array(Vec<QueryValue>),

    /// JSON-like object literal, pair order preserved
    Object(Vec<(String, QueryValue)>),

    /// Named parameter `@name`, resolved at bind time
    Parameter(String),

    /// Function call, e.g. `convert("2018-01-10", date)`
    FunctionCall {
        name: String,
        args: Vec<QueryValue>,
    },
}

/// Leaf comparison operators over entity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Between,
    In,
}

/// A condition over entity fields: a leaf comparison or a boolean
/// combinator. AND/OR keep their operands in declared order; NOT holds
/// exactly one operand and is never collapsed at this level.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf {
        field: String,
        operator: Operator,
        value: QueryValue,
    },
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

/// `get key, key` or `get {key, key}`
#[derive(Debug, Clone, PartialEq)]
pub struct GetQuery {
    pub keys: Vec<QueryValue>,
}

/// `put {key, value}` with an optional `ttl N unit` clause
#[derive(Debug, Clone, PartialEq)]
pub struct PutQuery {
    pub key: QueryValue,
    pub value: QueryValue,
    pub ttl: Option<Duration>,
}

/// `remove key, key` (also spelled `del`)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveQuery {
    pub keys: Vec<QueryValue>,
}

/// `select fields from entity where ... order by ... skip N limit N`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub entity: String,
    /// Empty means every field
    pub fields: Vec<String>,
    pub condition: Option<Condition>,
    pub sorts: Vec<Sort>,
    pub skip: u64,
    pub limit: u64,
}

/// `update entity (field = value, ...)` or `update entity {json}`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub entity: String,
    pub fields: Vec<(String, QueryValue)>,
}

/// `insert entity (field = value, ...)` with an optional TTL clause
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub entity: String,
    pub fields: Vec<(String, QueryValue)>,
    pub ttl: Option<Duration>,
}

/// `delete from entity where ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub entity: String,
    pub condition: Option<Condition>,
}

/// A complete parsed statement of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Get(GetQuery),
    Put(PutQuery),
    Remove(RemoveQuery),
    Select(SelectQuery),
    Update(UpdateQuery),
    Insert(InsertQuery),
    Delete(DeleteQuery),
}

impl Statement {
    /// Statement kind name, used in dispatch and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Get(_) => "get",
            Statement::Put(_) => "put",
            Statement::Remove(_) => "remove",
            Statement::Select(_) => "select",
            Statement::Update(_) => "update",
            Statement::Insert(_) => "insert",
            Statement::Delete(_) => "delete",
        }
    }
}
