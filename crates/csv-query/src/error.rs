use thiserror::Error;

use crate::reader::ReadError;
use crate::sql::QueryError;

/// Any failure of [`crate::query_csv`]. Nothing is recovered except the documented `"auto"`
/// encoding retry, which never surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input file is missing or unreadable.
    InputAccess,
    /// The file's bytes are invalid for the selected encoding.
    Decode,
    /// The delimited text is malformed, or a cell does not fit a forced type.
    ParseStructure,
    /// A parse option is invalid (including unknown encodings).
    InvalidOption,
    QuerySyntax,
    /// The query names a table, column or function that does not exist.
    QueryReference,
    /// Any other failure inside the query engine.
    QueryEngine,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Read(err) => match err {
                ReadError::Io { .. } => ErrorKind::InputAccess,
                ReadError::Decode(_) => ErrorKind::Decode,
                ReadError::Structure { .. }
                | ReadError::EmptyInput
                | ReadError::InvalidValue { .. } => ErrorKind::ParseStructure,
                ReadError::InvalidOption { .. } | ReadError::UnknownEncoding(_) => {
                    ErrorKind::InvalidOption
                }
            },
            Error::Query(err) => match err {
                QueryError::Syntax(_) => ErrorKind::QuerySyntax,
                QueryError::Reference(_) => ErrorKind::QueryReference,
                QueryError::NoResultSet
                | QueryError::EmptyTable(_)
                | QueryError::Sqlite(_)
                | QueryError::Table(_) => ErrorKind::QueryEngine,
            },
        }
    }
}
