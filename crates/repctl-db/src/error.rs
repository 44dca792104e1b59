use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connect(#[source] tokio_postgres::Error),
    #[error("query failed: {0}")]
    Query(#[source] tokio_postgres::Error),
    #[error("node {0} not found in the catalog")]
    NodeNotFound(i32),
    #[error("node {0:?} not found in the catalog")]
    NodeNameNotFound(String),
    #[error("no primary is registered in the catalog")]
    NoPrimary,
    #[error("replication slot {0:?} not found")]
    SlotNotFound(String),
    #[error("row had an unexpected shape: {0}")]
    MalformedRow(String),
}

impl From<tokio_postgres::Error> for Error {
    fn from(source: tokio_postgres::Error) -> Self {
        Error::Query(source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
