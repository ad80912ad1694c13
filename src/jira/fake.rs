//! in memory [IssueService] counting every call, used to test receivers without
//! a jira instance

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{
	Issue, IssueFields, IssueRef, IssueService, IssueStatus, JiraError, Key, Name, SearchOptions,
	StatusCategory, Transition,
};

/// id of the transition back into an open state
pub(crate) const REOPEN_ID: &str = "11";
/// id of the transition resolving an issue
pub(crate) const RESOLVE_ID: &str = "31";

/// calls made against [Fake]
#[derive(Debug, Default, Clone)]
pub(crate) struct Calls {
	pub search: Vec<String>,
	pub get_transitions: Vec<String>,
	pub create: Vec<Issue>,
	pub update: Vec<(String, Map<String, Value>)>,
	pub do_transition: Vec<(String, String)>,
}

impl Calls {
	/// number of calls changing jira
	pub fn mutations(&self) -> usize {
		self.create.len() + self.update.len() + self.do_transition.len()
	}
}

/// a transition offered for every issue
#[derive(Debug, Clone)]
struct FakeTransition {
	transition: Transition,
	category: &'static str,
	resolution: Option<&'static str>,
}

#[derive(Debug)]
struct State {
	issues: Vec<Issue>,
	transitions: Vec<FakeTransition>,
	calls: Calls,
	/// api name and status every call of this api fails with
	fail: Option<(&'static str, u16)>,
}

#[derive(Debug)]
pub(crate) struct Fake {
	state: Mutex<State>,
}

pub(crate) fn status(category: &str) -> IssueStatus {
	IssueStatus {
		name: category.to_string(),
		status_category: StatusCategory { key: category.to_string() },
	}
}

/// an issue in the `new` status category
pub(crate) fn open_issue(key: &str, label: &str, summary: &str) -> Issue {
	let project = key.split('-').next().unwrap_or_default();
	Issue {
		id: key.to_string(),
		key: key.to_string(),
		fields: IssueFields {
			project: Some(Key::new(project)),
			summary: summary.to_string(),
			labels: vec![label.to_string()],
			status: Some(status("new")),
			..Default::default()
		},
	}
}

/// an issue resolved with `resolution` at `resolved`
pub(crate) fn resolved_issue(
	key: &str,
	label: &str,
	summary: &str,
	resolution: &str,
	resolved: DateTime<Utc>,
) -> Issue {
	let mut issue = open_issue(key, label, summary);
	issue.fields.status = Some(status("done"));
	issue.fields.resolution = Some(Name::new(resolution));
	issue.fields.resolutiondate = Some(resolved);
	issue
}

/// splits `project="<project>" and labels="<label>" order by ...` into project
/// and label
fn parse_jql(jql: &str) -> Option<(String, String)> {
	let rest = jql.strip_prefix("project=\"")?;
	let (project, rest) = rest.split_once("\" and labels=")?;
	let label = rest.strip_suffix(" order by resolutiondate desc")?;
	let label = label.strip_prefix('"')?.strip_suffix('"')?;

	Some((project.to_string(), label.replace("\\\"", "\"").replace("\\\\", "\\")))
}

impl Fake {
	pub fn new() -> Self {
		let transitions = vec![
			FakeTransition {
				transition: Transition { id: REOPEN_ID.to_string(), name: "To Do".to_string() },
				category: "new",
				resolution: None,
			},
			FakeTransition {
				transition: Transition { id: RESOLVE_ID.to_string(), name: "Done".to_string() },
				category: "done",
				resolution: Some("Done"),
			},
		];

		Self {
			state: Mutex::new(State {
				issues: Vec::new(),
				transitions,
				calls: Calls::default(),
				fail: None,
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap()
	}

	pub fn with_issue(self, issue: Issue) -> Self {
		self.state().issues.push(issue);
		self
	}

	/// let every call of `api` fail with `status`
	pub fn failing(self, api: &'static str, status: u16) -> Self {
		self.state().fail = Some((api, status));
		self
	}

	pub fn calls(&self) -> Calls {
		self.state().calls.clone()
	}

	pub fn issue(&self, key: &str) -> Option<Issue> {
		self.state().issues.iter().find(|issue| issue.key == key).cloned()
	}

	pub fn issues(&self) -> Vec<Issue> {
		self.state().issues.clone()
	}
}

impl State {
	fn check(&self, api: &'static str) -> Result<(), JiraError> {
		match self.fail {
			Some((failing, status)) if failing == api => Err(JiraError::Status {
				api,
				url: format!("http://jira.fake/{api}"),
				status,
				body: "injected failure".to_string(),
			}),
			_ => Ok(()),
		}
	}

	fn issue_mut(&mut self, id: &str) -> Option<&mut Issue> {
		self.issues.iter_mut().find(|issue| issue.key == id || issue.id == id)
	}
}

#[async_trait]
impl IssueService for Fake {
	async fn search(&self, jql: &str, options: &SearchOptions) -> Result<Vec<Issue>, JiraError> {
		let mut state = self.state();
		state.calls.search.push(jql.to_string());
		state.check("Issue.Search")?;

		let (project, label) = match parse_jql(jql) {
			Some(parsed) => parsed,
			None => panic!("unexpected query {jql}"),
		};

		let mut found: Vec<Issue> = state
			.issues
			.iter()
			.filter(|issue| {
				issue.fields.project.as_ref().map(|p| p.key.as_str()) == Some(project.as_str())
					&& issue.fields.labels.contains(&label)
			})
			.cloned()
			.collect();

		// descending, unresolved issues first
		found.sort_by(|a, b| match (a.fields.resolutiondate, b.fields.resolutiondate) {
			(None, None) => std::cmp::Ordering::Equal,
			(None, Some(_)) => std::cmp::Ordering::Less,
			(Some(_), None) => std::cmp::Ordering::Greater,
			(Some(a), Some(b)) => b.cmp(&a),
		});
		found.truncate(options.max_results as usize);

		Ok(found)
	}

	async fn get_transitions(&self, id: &str) -> Result<Vec<Transition>, JiraError> {
		let mut state = self.state();
		state.calls.get_transitions.push(id.to_string());
		state.check("Issue.GetTransitions")?;

		Ok(state.transitions.iter().map(|t| t.transition.clone()).collect())
	}

	async fn create(&self, issue: &Issue) -> Result<IssueRef, JiraError> {
		let mut state = self.state();
		state.calls.create.push(issue.clone());
		state.check("Issue.Create")?;

		let project = issue.fields.project.as_ref().map(|p| p.key.clone()).unwrap_or_default();
		let number = state.issues.len() + 1;
		let created =
			IssueRef { id: (10000 + number).to_string(), key: format!("{project}-{number}") };

		let mut stored = issue.clone();
		stored.id = created.id.clone();
		stored.key = created.key.clone();
		stored.fields.status = Some(status("new"));
		state.issues.push(stored);

		Ok(created)
	}

	async fn update(&self, key: &str, fields: &Map<String, Value>) -> Result<(), JiraError> {
		let mut state = self.state();
		state.calls.update.push((key.to_string(), fields.clone()));
		state.check("Issue.Update")?;

		if let Some(issue) = state.issue_mut(key) {
			for (field, value) in fields {
				let value = value.as_str().unwrap_or_default().to_string();
				match field.as_str() {
					"summary" => issue.fields.summary = value,
					"description" => issue.fields.description = value,
					_ => {}
				}
			}
		}

		Ok(())
	}

	async fn do_transition(&self, id: &str, transition_id: &str) -> Result<(), JiraError> {
		let mut state = self.state();
		state.calls.do_transition.push((id.to_string(), transition_id.to_string()));
		state.check("Issue.DoTransition")?;

		let transition =
			state.transitions.iter().find(|t| t.transition.id == transition_id).cloned();
		if let (Some(transition), Some(issue)) = (transition, state.issue_mut(id)) {
			issue.fields.status = Some(status(transition.category));
			issue.fields.resolution = transition.resolution.map(Name::new);
		}

		Ok(())
	}
}
