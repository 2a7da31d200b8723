//! Maps upstream records into normalized rows.
//!
//! Author display names resolve to stable numeric ids through the storage
//! layer's get-or-create; no upstream author id is trusted. The `closed`
//! timestamp does not exist upstream — it is derived from the changelog.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use trackmirror_core::models::{IssueRow, ProjectRow, StatusChangeRow};
use trackmirror_jira::models::{Changelog, JiraIssue, JiraProject};
use trackmirror_storage::authors;

/// Fixed datetime format used by the upstream API.
const UPSTREAM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Locate the upstream project matching `key` and shape it for persistence.
pub fn pick_project(projects: &[JiraProject], key: &str) -> Option<ProjectRow> {
    projects.iter().find(|p| p.key == key).map(|p| ProjectRow {
        key: p.key.clone(),
        name: p.name.clone(),
        url: p.url.clone(),
    })
}

/// Normalize one upstream issue, resolving creator and assignee ids.
pub async fn map_issue(
    pool: &PgPool,
    issue: &JiraIssue,
    project_key: &str,
) -> Result<IssueRow, sqlx::Error> {
    let creator_id = authors::get_or_create(pool, &issue.fields.creator.display_name).await?;
    let assignee_id = match &issue.fields.assignee {
        Some(assignee) => Some(authors::get_or_create(pool, &assignee.display_name).await?),
        None => None,
    };

    Ok(IssueRow {
        key: issue.key.clone(),
        project_key: project_key.to_string(),
        created: parse_upstream_time(&issue.fields.created),
        updated: parse_upstream_time(&issue.fields.updated),
        closed: closed_timestamp(&issue.changelog),
        summary: issue.fields.summary.clone().unwrap_or_default(),
        description: issue.fields.description.clone().unwrap_or_default(),
        issue_type: issue.fields.issuetype.name.clone(),
        priority: issue.fields.priority.name.clone(),
        status: issue.fields.status.name.clone(),
        time_spent: issue.fields.timespent.unwrap_or(0),
        creator_id,
        assignee_id,
    })
}

/// One row per changelog item whose field is "status", with the history
/// author resolved to an id.
pub async fn extract_status_changes(
    pool: &PgPool,
    issue: &JiraIssue,
) -> Result<Vec<StatusChangeRow>, sqlx::Error> {
    let mut changes = Vec::new();
    for history in &issue.changelog.histories {
        for item in &history.items {
            if item.field != "status" {
                continue;
            }
            let author_id = authors::get_or_create(pool, &history.author.display_name).await?;
            changes.push(StatusChangeRow {
                issue_key: issue.key.clone(),
                author_id,
                created: parse_upstream_time(&history.created),
                from_status: item.from.clone().unwrap_or_default(),
                to_status: item.to.clone().unwrap_or_default(),
            });
        }
    }
    Ok(changes)
}

/// Derive when an issue was closed: the creation time of the most recent
/// history containing a status transition to "closed" (case-insensitive).
/// `None` when the issue never closed.
pub fn closed_timestamp(changelog: &Changelog) -> Option<DateTime<Utc>> {
    changelog
        .histories
        .iter()
        .rev()
        .find(|history| {
            history.items.iter().any(|item| {
                item.field == "status"
                    && item
                        .to
                        .as_deref()
                        .is_some_and(|to| to.eq_ignore_ascii_case("closed"))
            })
        })
        .map(|history| parse_upstream_time(&history.created))
}

/// Parse an upstream timestamp, degrading to the Unix epoch on failure.
///
/// Swallowing the parse error mirrors the upstream connector's historical
/// behavior; the warn log makes bad values visible without failing a batch.
pub(crate) fn parse_upstream_time(value: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(value, UPSTREAM_TIME_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(err) => {
            warn!(value, %err, "unparseable upstream timestamp, storing epoch");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}
