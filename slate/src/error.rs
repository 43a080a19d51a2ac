use std::fmt::Display;
use std::io;

/// Slate errors.
///
/// These are the recoverable failures of the storage layer. Programmer
/// errors (unlocking a page that is not held, pulling from an operator that
/// was never opened) are bugs and panic instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The transaction lost a wound-wait conflict and must roll back. Once a
    /// transaction has been wounded, every further lock acquisition it
    /// attempts also fails with this error until it completes.
    TransactionAborted,
    /// Semantic failure: a schema mismatch, a full page or pool, a tuple
    /// without a record id, a page presented to the wrong file.
    Db(String),
    /// An underlying file I/O failure.
    Io(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::TransactionAborted => write!(f, "transaction aborted"),
            Error::Db(msg) => write!(f, "{msg}"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// A slate Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;
