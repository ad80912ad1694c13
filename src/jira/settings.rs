//! connection settings of a jira instance

use std::time::Duration;

use url::Url;

/// default timeout of jira requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
/// how to reach and authenticate against jira
pub struct JiraSettings {
	/// base url of the jira instance, e.g. `https://example.atlassian.net`
	pub api_url: Url,
	/// credentials
	pub auth: Auth,
	/// timeout of a single request
	pub timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
/// jira credentials
pub enum Auth {
	/// http basic auth
	Basic {
		#[allow(clippy::missing_docs_in_private_items)]
		user: String,
		#[allow(clippy::missing_docs_in_private_items)]
		password: String,
	},
	/// personal access token sent as bearer token
	PersonalAccessToken(String),
}

impl std::fmt::Debug for Auth {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Basic { user, .. } => {
				f.debug_struct("Basic")
					.field("user", user)
					.field("password", &"<redacted>")
					.finish()
			}
			Self::PersonalAccessToken(_) => {
				f.debug_tuple("PersonalAccessToken").field(&"<redacted>").finish()
			}
		}
	}
}
