//! Normalized row shapes persisted by the ETL engine.
//!
//! These mirror the relational schema (managed externally): `projects`,
//! `issues`, `authors` and `status_changes`. Authors have no struct of
//! their own — they exist only as ids resolved during transformation.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A mirrored project. Inserted once when first requested, never deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub key: String,
    pub name: String,
    pub url: String,
}

/// A normalized issue, upserted by `key`.
///
/// On conflict only `updated` and `status` are overwritten; the remaining
/// columns keep their first-ingested values.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub key: String,
    pub project_key: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Derived from changelog history, not an upstream field.
    pub closed: Option<DateTime<Utc>>,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: String,
    pub status: String,
    pub time_spent: i64,
    pub creator_id: i64,
    pub assignee_id: Option<i64>,
}

/// One recorded status transition, unique on `(issue_key, created)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeRow {
    pub issue_key: String,
    pub author_id: i64,
    pub created: DateTime<Utc>,
    pub from_status: String,
    pub to_status: String,
}

/// Pagination metadata for the project-listing read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: usize,
    pub page_count: usize,
    pub total_count: usize,
}
