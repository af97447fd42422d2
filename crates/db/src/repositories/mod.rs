//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Catalog lookups and the audit
//! inserts instead accept any executor or connection so they can run inside
//! a caller's transaction.

pub mod catalog_repo;
pub mod import_issue_repo;
pub mod import_log_repo;
pub mod target_database_repo;

pub use catalog_repo::CatalogRepo;
pub use import_issue_repo::ImportIssueRepo;
pub use import_log_repo::ImportLogRepo;
pub use target_database_repo::TargetDatabaseRepo;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 500;

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

pub(crate) fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
