/// Failures reported by the persistence and sensor-directory collaborators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Persistence,
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            IngestError::NotFound(_) => ErrorKind::NotFound,
            IngestError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// HTTP-style status for transport adapters.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Persistence => 500,
        }
    }
}
