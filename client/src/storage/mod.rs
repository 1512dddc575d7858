//! # Persisted client state
//!
//! The client persists exactly two values, the access and refresh bearer tokens. They are read at
//! start-up to restore a session and attached to every outgoing request.

pub mod clients;
pub mod interface;

pub use interface::{StorageError, StorageFuture, TokenKind, TokenStorage};
