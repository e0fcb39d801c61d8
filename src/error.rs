use thiserror::Error;

/// Crate-wide error type.
///
/// The variants are distinguished by how callers recover: `Io` and `Db`
/// simply propagate, `TransactionAborted` obliges the caller to roll the
/// transaction back via `Transaction::abort`, and `NoSuchElement` signals a
/// violation of the iterator protocol (calling `next` past the end).
#[derive(Error, Debug)]
pub enum DbError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("db error: {0}")]
    Db(String),

    #[error("transaction aborted")]
    TransactionAborted,

    #[error("no such element: {0}")]
    NoSuchElement(String),
}

impl DbError {
    pub(crate) fn db(msg: impl Into<String>) -> Self {
        DbError::Db(msg.into())
    }

    pub(crate) fn no_such_element(msg: impl Into<String>) -> Self {
        DbError::NoSuchElement(msg.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;
