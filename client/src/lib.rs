//! # Autotrips client
//!
//! Client-side core of the Autotrips vehicle logistics application: the session/authorization
//! state holder, the multi-record vehicle form engine, and the REST backend client they share.

pub mod backend;
pub mod config;
pub mod forms;
pub mod models;
pub mod routing;
pub mod session;
pub mod storage;
pub mod users;
pub mod vehicles;
