//! looks up the issue a notification should be applied to

use chrono::{DateTime, Utc};

use super::{NotifyError, Receiver};
use crate::{
	identity::quote,
	jira::{Issue, SearchOptions},
};

/// Two results are enough to notice that more than one issue carries the same
/// identifier label.
const MAX_RESULTS: u32 = 2;

/// Fields read from found issues. The description is read so it only gets
/// rewritten if it actually changed.
const SEARCH_FIELDS: [&str; 5] =
	["summary", "description", "status", "resolution", "resolutiondate"];

/// query for the issues of `project` labeled `label`, most recently resolved
/// first
pub(super) fn search_query(project: &str, label: &str) -> String {
	format!("project={} and labels={} order by resolutiondate desc", quote(project), quote(label))
}

/// The number of an issue key, `AB-12` -> `12`.
fn issue_number(issue: &Issue) -> Option<u64> {
	issue.key.rsplit('-').next()?.parse().ok()
}

/// Picks the first issue of the search order. If the first two issues got
/// resolved at the same time the more recently created one wins.
fn pick(mut issues: Vec<Issue>) -> Option<Issue> {
	if issues.len() > 1
		&& issues[0].fields.resolutiondate == issues[1].fields.resolutiondate
		&& issue_number(&issues[1]) > issue_number(&issues[0])
	{
		issues.swap(0, 1);
	}

	issues.into_iter().next()
}

/// True if `resolved` plus `reopen_duration` lies before `now`. A duration of
/// zero never expires.
pub(super) fn is_too_old(
	resolved: DateTime<Utc>,
	reopen_duration: std::time::Duration,
	now: DateTime<Utc>,
) -> bool {
	if reopen_duration.is_zero() {
		return false;
	}

	match chrono::Duration::from_std(reopen_duration) {
		Ok(duration) => resolved.checked_add_signed(duration).map_or(false, |until| until < now),
		// too large to ever expire
		Err(_) => false,
	}
}

impl Receiver {
	/// Search the most recently resolved issue of `project` carrying `label`.
	async fn search(&self, project: &str, label: &str) -> Result<Option<Issue>, NotifyError> {
		let query = search_query(project, label);
		let options = SearchOptions {
			fields: SEARCH_FIELDS.iter().map(|field| field.to_string()).collect(),
			max_results: MAX_RESULTS,
		};

		tracing::debug!("search {query:?} {options:?}");
		let issues = self.client.search(&query, &options).await?;

		if issues.len() > 1 {
			let keys: Vec<&str> = issues.iter().map(|issue| issue.key.as_str()).collect();
			tracing::warn!(
				"more than one issue matched {query:?}, picking most recently resolved: {keys:?}"
			);
		}

		match pick(issues) {
			Some(issue) => {
				tracing::debug!("found issue {} for {query:?}", issue.key);
				Ok(Some(issue))
			}
			None => {
				tracing::debug!("no results for {query:?}");
				Ok(None)
			}
		}
	}

	/// Returns the issue to apply the notification to, if any. Issues resolved
	/// longer than `reopen_duration` ago are left alone, a new issue gets
	/// created instead.
	pub(super) async fn find_issue_to_reuse(
		&self,
		project: &str,
		label: &str,
	) -> Result<Option<Issue>, NotifyError> {
		let issue = match self.search(project, label).await? {
			Some(issue) => issue,
			None => return Ok(None),
		};

		if let Some(resolved) = issue.fields.resolutiondate {
			if is_too_old(resolved, self.conf.reopen_duration, self.clock.now()) {
				tracing::debug!(
					"existing resolved issue {} is too old to reopen, skipping \
					 (label {label}, resolved {}, reopen duration {:?})",
					issue.key,
					resolved.to_rfc3339(),
					self.conf.reopen_duration,
				);
				return Ok(None);
			}
		}

		Ok(Some(issue))
	}
}
