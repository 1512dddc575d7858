//! # Token storage backends
//!
//! This module contains storage clients which implement [`TokenStorage`] using various
//! backends.
//!
//! [`TokenStorage`]: crate::storage::interface::TokenStorage

pub mod memory;
#[cfg(feature = "sqlite3")]
pub mod sqlite;
