//! # Backend clients
//!
//! [`http::HttpBackend`] talks to the real REST backend. [`memory::MemoryBackend`] keeps accounts
//! and vehicles in process and is used to exercise the session and form logic without a server.

pub mod http;
pub mod memory;
