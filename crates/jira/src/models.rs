//! Wire shapes for the upstream REST API (`/rest/api/2`).
//!
//! Fields the upstream is known to null out (description, timespent,
//! assignee, from/to strings) are `Option` and defaulted during
//! transformation; timestamps stay raw strings here and are parsed by the
//! transformer.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JiraProject {
    pub key: String,
    pub name: String,
    #[serde(rename = "self")]
    pub url: String,
}

/// Response of `/rest/api/2/search`. The count call (`maxResults=0`) reuses
/// this shape and reads only `total`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: IssueFields,
    #[serde(default)]
    pub changelog: Changelog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueFields {
    pub created: String,
    pub updated: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub issuetype: Named,
    pub priority: Named,
    pub status: Named,
    #[serde(default)]
    pub timespent: Option<i64>,
    pub creator: Author,
    #[serde(default)]
    pub assignee: Option<Author>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<History>,
}

/// One changelog entry: a set of field transitions made at one instant.
#[derive(Debug, Clone, Deserialize)]
pub struct History {
    pub created: String,
    pub author: Author,
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryItem {
    pub field: String,
    #[serde(rename = "fromString", default)]
    pub from: Option<String>,
    #[serde(rename = "toString", default)]
    pub to: Option<String>,
}
