use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found")]
    NotFound,

    #[error("content not found: {}", .0.join(","))]
    ContentNotFound(Vec<String>),

    #[error("user not found: {}", .0.join(","))]
    UserNotFound(Vec<String>),

    #[error("already exists")]
    AlreadyExists,

    #[error("token lookup collision")]
    TokenLookupCollision,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("access denied")]
    AccessDenied,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("dependency missing: {}", .0.join(","))]
    DependencyMissing(Vec<String>),

    #[error("recursive dependency: {}", .0.join(","))]
    RecursiveDependency(Vec<String>),

    #[error("relation tree exceeds {0} nodes")]
    RelationLimit(usize),

    #[error("file is still referenced by: {}", .0.join(","))]
    CannotDelete(Vec<String>),

    #[error("commit failed at operation {index}: {source}")]
    Commit {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Business rules a batch can trip over while committing: uniqueness,
    /// vanished rows and the guards re-checked inside the transaction.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::AlreadyExists
                | Self::TokenLookupCollision
                | Self::DependencyMissing(_)
                | Self::CannotDelete(_)
        )
    }

    /// Unwraps a commit failure caused by a rejection, so callers see the
    /// rule that was broken rather than the batch position.
    #[must_use]
    pub fn into_rejection(self) -> Self {
        match self {
            Self::Commit { source, .. } if source.is_rejection() => *source,
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
