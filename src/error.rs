use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiftError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Arity error: {0}")]
    Arity(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Ambiguous result: expected at most one result, got {0}")]
    AmbiguousResult(usize),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Query execution error: {0}")]
    Execution(String),
}

pub type SiftResult<T> = Result<T, SiftError>;

impl serde::Serialize for SiftError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
