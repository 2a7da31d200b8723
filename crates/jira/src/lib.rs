pub mod backoff;
pub mod client;
pub mod models;

pub use backoff::BackoffPolicy;
pub use client::{FetchError, JiraClient};
pub use models::*;
