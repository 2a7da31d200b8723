use thiserror::Error;

use trackmirror_jira::FetchError;

/// Errors surfaced by an update run. Exactly one of these reaches the
/// caller: the first failing unit wins, siblings are cancelled and their
/// errors discarded.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("project {0} not found upstream")]
    ProjectNotFound(String),

    #[error("update cancelled")]
    Cancelled,

    #[error("project {key} update failed: {source}")]
    Project {
        key: String,
        #[source]
        source: Box<EtlError>,
    },

    #[error("worker task failed: {0}")]
    Task(String),
}
