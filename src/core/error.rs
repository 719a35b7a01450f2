use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    InvalidDocument,
    RebuildFailed,
    Corrupted,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn invalid_document(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidDocument, context.into())
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    pub fn corrupted(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Corrupted, context.into())
    }

    /// Wraps any failure that happened while a rebuild was in flight.
    pub fn rebuild_failed(cause: &Error) -> Self {
        Error::new(
            ErrorKind::RebuildFailed,
            format!("rebuild rolled back: {}", cause),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
