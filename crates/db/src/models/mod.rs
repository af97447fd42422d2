//! Row structs and create DTOs for the administrative tables.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct
//! matching the database row and a create DTO for inserts.

pub mod import_issue;
pub mod import_log;
pub mod target_database;
