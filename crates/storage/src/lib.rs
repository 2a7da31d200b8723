//! Postgres operations for the mirror schema.
//!
//! Schema (managed externally, migrations are out of scope):
//! `projects(key unique, name, url)`,
//! `issues(key unique, ...)`,
//! `authors(id, display_name unique)`,
//! `status_changes(issue_id, author_id, created, from_status, to_status,
//! unique(issue_id, created))`.

pub mod authors;
pub mod batches;
pub mod pool;
pub mod projects;
