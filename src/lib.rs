//! Dialect-aware CRUD compiler and transactional executor.
//!
//! JSON filter/update documents are ingested into a logical statement AST
//! ([`ast`]), rendered for MySQL, PostgreSQL or SQL Server through the
//! [`dialect`] adapters, and executed by [`db::SqlEngine`] over a pluggable
//! [`db::Backend`].

pub mod ast;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod model;

pub use config::EngineConfig;
pub use db::{Backend, SqlEngine, TableDescription, Transaction};
pub use dialect::Dialect;
pub use error::{BatchFailure, Error, Result};
