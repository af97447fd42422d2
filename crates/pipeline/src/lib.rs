//! Transactional materialization of extracted legacy objects.
//!
//! [`engine::ImportEngine`] runs each import on one pooled connection in
//! one transaction: the table is created, loaded, and reconciled together
//! or not at all. The audit trail is written on the pool afterwards so it
//! survives a rollback.

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod loader;
pub mod materializer;
pub mod query;
pub mod reconciler;
pub mod results;
pub mod session;

pub use engine::{EngineSettings, ImportEngine, QueryImportRequest, TableImportRequest};
pub use error::{ErrorKind, ImportError, ImportResult};
