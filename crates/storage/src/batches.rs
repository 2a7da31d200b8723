use sqlx::PgPool;

use trackmirror_core::models::{IssueRow, StatusChangeRow};

/// Persist one batch atomically: upsert every issue, insert every status
/// change, then commit. Any error rolls the whole batch back (the
/// transaction is dropped un-committed), so no partial batch is visible.
///
/// Issue conflicts overwrite only `updated` and `status`; the other columns
/// keep their first-ingested values. Whether re-ingestion should also
/// refresh summary/priority/assignee is an open policy question — see
/// DESIGN.md before widening this.
pub async fn commit_batch(
    pool: &PgPool,
    issues: &[IssueRow],
    changes: &[StatusChangeRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for issue in issues {
        sqlx::query(
            "INSERT INTO issues (key, project_key, created, updated, closed, summary, \
             description, issue_type, priority, status, time_spent, creator_id, assignee_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (key) DO UPDATE SET \
                 updated = EXCLUDED.updated, \
                 status = EXCLUDED.status",
        )
        .bind(&issue.key)
        .bind(&issue.project_key)
        .bind(issue.created)
        .bind(issue.updated)
        .bind(issue.closed)
        .bind(&issue.summary)
        .bind(&issue.description)
        .bind(&issue.issue_type)
        .bind(&issue.priority)
        .bind(&issue.status)
        .bind(issue.time_spent)
        .bind(issue.creator_id)
        .bind(issue.assignee_id)
        .execute(&mut *tx)
        .await?;
    }

    // Simultaneous transitions on one issue collapse to one stored row.
    for change in changes {
        sqlx::query(
            "INSERT INTO status_changes (issue_id, author_id, created, from_status, to_status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (issue_id, created) DO NOTHING",
        )
        .bind(&change.issue_key)
        .bind(change.author_id)
        .bind(change.created)
        .bind(&change.from_status)
        .bind(&change.to_status)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
