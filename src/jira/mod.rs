//! The slice of the jira issue api the receivers need.
//!
//! Receivers only talk to jira through [IssueService], [http_client::Client]
//! implements it against the jira REST api.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod http_client;
pub mod settings;

#[cfg(test)]
pub(crate) mod fake;

/// statuses of the jira api worth retrying
const RETRYABLE_STATUS: [u16; 2] = [500, 503];

/// error returned by [IssueService] calls
#[derive(Error, Debug)]
pub enum JiraError {
	/// jira answered with a non 2xx status
	#[error("JIRA request {url} returned status {status}, body {body:?}")]
	Status {
		/// name of the api call
		api: &'static str,
		/// url of the request
		url: String,
		/// http status code
		status: u16,
		/// response body
		body: String,
	},
	/// the request didn't get a (readable) response
	#[error("JIRA request {api} failed")]
	Transport {
		/// name of the api call
		api: &'static str,
		/// error reported by the http client
		#[source]
		source: reqwest::Error,
	},
}

impl JiraError {
	/// only internal server errors and unavailable services are worth another
	/// try, everything else will fail again
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Status { status, .. } => RETRYABLE_STATUS.contains(status),
			Self::Transport { .. } => false,
		}
	}
}

/// Issue operations receivers depend on.
#[async_trait]
pub trait IssueService: Send + Sync {
	/// search issues with a JQL query
	async fn search(&self, jql: &str, options: &SearchOptions) -> Result<Vec<Issue>, JiraError>;

	/// list the workflow transitions currently available for an issue
	async fn get_transitions(&self, id: &str) -> Result<Vec<Transition>, JiraError>;

	/// create an issue, returns id and key of the new issue
	async fn create(&self, issue: &Issue) -> Result<IssueRef, JiraError>;

	/// update only the given fields of an issue
	async fn update(&self, key: &str, fields: &Map<String, Value>) -> Result<(), JiraError>;

	/// move an issue along a workflow transition
	async fn do_transition(&self, id: &str, transition_id: &str) -> Result<(), JiraError>;
}

/// options for [IssueService::search]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
	/// fields to include in the returned issues
	pub fields: Vec<String>,
	/// maximum number of returned issues
	pub max_results: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
/// a jira issue
pub struct Issue {
	/// numeric id, empty for issues not created yet
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub id: String,
	/// human readable key, e.g. `AB-123`
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub key: String,
	/// the requested fields
	pub fields: IssueFields,
}

/// id and key of a newly created issue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueRef {
	#[allow(clippy::missing_docs_in_private_items)]
	pub id: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
/// The issue fields we read or write. Fields not requested in a search stay at
/// their default.
pub struct IssueFields {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	#[allow(clippy::missing_docs_in_private_items)]
	pub project: Option<Key>,
	#[serde(rename = "issuetype", default, skip_serializing_if = "Option::is_none")]
	#[allow(clippy::missing_docs_in_private_items)]
	pub issue_type: Option<Name>,
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub summary: String,
	/// jira returns `null` for empty descriptions
	#[serde(default, deserialize_with = "null_as_empty")]
	pub description: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	#[allow(clippy::missing_docs_in_private_items)]
	pub labels: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	#[allow(clippy::missing_docs_in_private_items)]
	pub priority: Option<Name>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	#[allow(clippy::missing_docs_in_private_items)]
	pub components: Vec<Name>,
	#[serde(default, skip_serializing)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub status: Option<IssueStatus>,
	#[serde(default, skip_serializing)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub resolution: Option<Name>,
	/// point in time the issue got resolved
	#[serde(default, skip_serializing, deserialize_with = "time::deserialize")]
	pub resolutiondate: Option<DateTime<Utc>>,
	/// custom fields, sent as they are
	#[serde(flatten)]
	pub unknowns: Map<String, Value>,
}

/// object referenced by its name, e.g. `{"name": "Bug"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Name {
	#[allow(clippy::missing_docs_in_private_items)]
	pub name: String,
}

/// object referenced by its key, e.g. `{"key": "AB"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Key {
	#[allow(clippy::missing_docs_in_private_items)]
	pub key: String,
}

impl Name {
	/// `{"name": name}`
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

impl Key {
	/// `{"key": key}`
	pub fn new(key: impl Into<String>) -> Self {
		Self { key: key.into() }
	}
}

/// workflow status of an issue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatus {
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub name: String,
	/// coarse classification shared by all workflows
	pub status_category: StatusCategory,
}

/// One of the fixed jira status categories: `new`, `indeterminate` or `done`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusCategory {
	#[allow(clippy::missing_docs_in_private_items)]
	pub key: String,
}

/// key of the status category of resolved issues
pub const STATUS_CATEGORY_DONE: &str = "done";

impl IssueStatus {
	/// true if the issue counts as resolved
	pub fn is_done(&self) -> bool {
		self.status_category.key == STATUS_CATEGORY_DONE
	}
}

impl Issue {
	/// true if the issue's status belongs to the `done` category
	pub fn is_done(&self) -> bool {
		self.fields.status.as_ref().map_or(false, IssueStatus::is_done)
	}

	/// name of the resolution, if resolved
	pub fn resolution(&self) -> Option<&str> {
		self.fields.resolution.as_ref().map(|resolution| resolution.name.as_str())
	}
}

/// a workflow transition available for an issue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transition {
	#[allow(clippy::missing_docs_in_private_items)]
	pub id: String,
	/// display name, matched against the configured state names
	pub name: String,
}

/// deserializes `null` into an empty string
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// jira timestamps look like `2022-05-01T10:00:00.000+0000`, which isn't valid
/// rfc3339
mod time {
	use chrono::{DateTime, Utc};
	use serde::{de::Error, Deserialize, Deserializer};

	/// format of jira timestamps
	const JIRA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

	/// parse a timestamp in jira or rfc3339 format
	pub(super) fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
		DateTime::parse_from_str(value, JIRA_FORMAT)
			.or_else(|_| DateTime::parse_from_rfc3339(value))
			.map(|time| time.with_timezone(&Utc))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<String>::deserialize(deserializer)? {
			Some(value) if !value.is_empty() => parse(&value).map(Some).map_err(D::Error::custom),
			_ => Ok(None),
		}
	}
}
