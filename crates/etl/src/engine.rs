//! Update engine: drives fetch → transform → persist for a set of
//! requested project keys.
//!
//! Two concurrency levels: one task per requested key (unbounded), and one
//! task per issue batch within a key, bounded by a semaphore sized to the
//! configured thread count. A shared [`Cancel`] flag implements
//! first-error-wins: the first failing unit flips it, siblings bail at
//! their next check, and exactly one error reaches the caller.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use trackmirror_core::config::JiraConfig;
use trackmirror_core::models::{PageInfo, ProjectRow};
use trackmirror_core::Cancel;
use trackmirror_jira::models::JiraProject;
use trackmirror_jira::JiraClient;
use trackmirror_storage::{batches, projects};

use crate::error::EtlError;
use crate::paginator::{self, Batch};
use crate::transform;

#[derive(Clone)]
pub struct Etl {
    client: Arc<JiraClient>,
    pool: sqlx::PgPool,
    thread_count: usize,
    page_size: u64,
}

impl Etl {
    /// The client pool and storage handle are owned by the caller and
    /// injected here; the engine holds no process-wide state.
    pub fn new(client: Arc<JiraClient>, pool: sqlx::PgPool, cfg: &JiraConfig) -> Self {
        Self {
            client,
            pool,
            thread_count: cfg.thread_count.max(1),
            page_size: cfg.page_size,
        }
    }

    // ── Write path ──────────────────────────────────────────────

    /// Mirror every requested project. Fails with the first error from any
    /// unit; everything already committed stays committed.
    pub async fn update_projects(&self, keys: &[String]) -> Result<(), EtlError> {
        let cancel = Cancel::new();
        let mut tasks = JoinSet::new();

        for key in keys {
            let etl = self.clone();
            let cancel = cancel.clone();
            let key = key.clone();
            tasks.spawn(async move {
                etl.update_project(&key, &cancel)
                    .await
                    .map_err(|source| EtlError::Project {
                        key,
                        source: Box::new(source),
                    })
            });
        }

        drain_first_error(&mut tasks, &cancel).await
    }

    async fn update_project(&self, key: &str, cancel: &Cancel) -> Result<(), EtlError> {
        if !projects::exists(&self.pool, key).await? {
            info!(project = key, "project not in store, fetching metadata");
            let upstream = self.client.list_projects(cancel).await?;
            let row = transform::pick_project(&upstream, key)
                .ok_or_else(|| EtlError::ProjectNotFound(key.to_string()))?;
            projects::save(&self.pool, &row).await?;
        }

        self.load_issues(key, cancel).await
    }

    async fn load_issues(&self, key: &str, cancel: &Cancel) -> Result<(), EtlError> {
        let total = self.client.issue_count(key, cancel).await?;
        if total == 0 {
            info!(project = key, "no issues upstream, nothing to do");
            return Ok(());
        }

        let plan = paginator::plan(total, self.page_size);
        info!(project = key, total, batches = plan.len(), "loading issues");

        let semaphore = Arc::new(Semaphore::new(self.thread_count));
        let mut tasks = JoinSet::new();

        for batch in plan {
            if cancel.is_cancelled() {
                break;
            }
            // Acquire before spawning so at most `thread_count` batches run.
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|err| EtlError::Task(err.to_string()))?;

            let etl = self.clone();
            let cancel = cancel.clone();
            let key = key.to_string();
            tasks.spawn(async move {
                let _permit = permit;
                etl.load_batch(&key, batch, &cancel).await
            });
        }

        drain_first_error(&mut tasks, cancel).await
    }

    async fn load_batch(&self, key: &str, batch: Batch, cancel: &Cancel) -> Result<(), EtlError> {
        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }
        debug!(project = key, start_at = batch.start_at, "loading batch");
        let page = self
            .client
            .search_issues(key, batch.start_at, batch.max_results, cancel)
            .await?;
        debug!(project = key, start_at = batch.start_at, fetched = page.issues.len(), "batch fetched");

        let mut issues = Vec::with_capacity(page.issues.len());
        let mut changes = Vec::new();
        for raw in &page.issues {
            issues.push(transform::map_issue(&self.pool, raw, key).await?);
            changes.extend(transform::extract_status_changes(&self.pool, raw).await?);
        }

        // A sibling may have failed while this batch was transforming; do
        // not start a transaction for work nobody will wait for.
        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }
        batches::commit_batch(&self.pool, &issues, &changes).await?;
        Ok(())
    }

    // ── Read path ───────────────────────────────────────────────

    /// Serve the project-listing collaborator: the full upstream project
    /// list, filtered and paginated in memory. Not concurrency-sensitive.
    pub async fn list_projects(
        &self,
        page: usize,
        limit: usize,
        search: &str,
    ) -> Result<(Vec<ProjectRow>, PageInfo), EtlError> {
        let upstream = self.client.list_projects(&Cancel::new()).await?;
        let filtered = filter_projects(&upstream, search);
        Ok(paginate(filtered, page, limit))
    }
}

/// Await every spawned unit; on the first failure flip the cancel flag so
/// the rest stop at their next check. Later errors are discarded.
async fn drain_first_error(
    tasks: &mut JoinSet<Result<(), EtlError>>,
    cancel: &Cancel,
) -> Result<(), EtlError> {
    let mut first_err = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap_or_else(|err| Err(EtlError::Task(err.to_string())));
        if let Err(err) = result {
            if first_err.is_none() {
                cancel.cancel();
                first_err = Some(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn filter_projects(upstream: &[JiraProject], search: &str) -> Vec<ProjectRow> {
    let needle = search.to_lowercase();
    upstream
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.key.to_lowercase().contains(&needle)
        })
        .map(|p| ProjectRow {
            key: p.key.clone(),
            name: p.name.clone(),
            url: p.url.clone(),
        })
        .collect()
}

fn paginate(filtered: Vec<ProjectRow>, page: usize, limit: usize) -> (Vec<ProjectRow>, PageInfo) {
    let page = page.max(1);
    let limit = limit.max(1);
    let total_count = filtered.len();

    let offset = (page - 1).saturating_mul(limit).min(total_count);
    let end = offset.saturating_add(limit).min(total_count);

    let info = PageInfo {
        current_page: page,
        page_count: total_count.div_ceil(limit),
        total_count,
    };
    (filtered[offset..end].to_vec(), info)
}
