use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::storage::interface::{StorageFuture, TokenKind, TokenStorage};

/// In-memory token storage. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tokens: Arc<Mutex<HashMap<TokenKind, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a token without going through the async interface.
    #[must_use]
    pub fn get(&self, kind: TokenKind) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl TokenStorage for MemoryStorage {
    fn load(&self, kind: TokenKind) -> StorageFuture<'static, Option<String>> {
        let value = self.get(kind);
        Box::pin(async move { Ok(value) })
    }

    fn store<'a>(&self, kind: TokenKind, value: &'a str) -> StorageFuture<'a, ()> {
        let tokens = Arc::clone(&self.tokens);
        Box::pin(async move {
            tokens
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(kind, value.to_string());
            Ok(())
        })
    }

    fn remove(&self, kind: TokenKind) -> StorageFuture<'static, ()> {
        let tokens = Arc::clone(&self.tokens);
        Box::pin(async move {
            tokens
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind);
            Ok(())
        })
    }
}
