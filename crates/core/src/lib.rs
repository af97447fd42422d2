//! Pure building blocks for materializing legacy desktop-database objects
//! into PostgreSQL.
//!
//! Nothing in this crate touches the database, spawns tasks, or performs
//! I/O. The transactional engine in `accessmig-pipeline` drives these
//! functions and executes the statements they produce.

pub mod column_plan;
pub mod config;
pub mod conversion;
pub mod ddl;
pub mod error;
pub mod expression;
pub mod extraction;
pub mod issues;
pub mod naming;
pub mod phase;
pub mod type_mapping;
pub mod types;
