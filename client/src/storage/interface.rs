use std::{future::Future, pin::Pin};

/// Boxed future returned by every [`TokenStorage`] operation.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Which of the two persisted bearer tokens an operation refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Storage key of the token.
    pub fn key(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

pub trait TokenStorage: Send + Sync + 'static {
    fn load(&self, kind: TokenKind) -> StorageFuture<'static, Option<String>>;

    /// Stores a token, replacing any previous value of the same kind.
    fn store<'a>(&self, kind: TokenKind, value: &'a str) -> StorageFuture<'a, ()>;

    /// Removes a token. Removing an absent token is not an error.
    fn remove(&self, kind: TokenKind) -> StorageFuture<'static, ()>;
}

/// Error type for token storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        Self::Other(Box::new(error))
    }
}
