//! # Backend collaborator
//!
//! [`interface::BackendClient`] describes every REST operation the client needs. Implementations
//! live in [`clients`].

pub mod clients;
pub mod interface;

pub use interface::{BackendClient, BackendError, BackendFuture, ErrorBody, FieldIssue};
