//! Creates, updates, reopens and resolves jira issues for alertmanager
//! notifications.
//!
//! Nothing is stored locally. For every notification the issue of an alert
//! group is looked up again by its identifier label, which makes it safe for
//! alertmanager to deliver a notification more than once:
//!
//! - no issue and firing alerts: create an issue
//! - issue found: refresh summary and description, then
//!   - no firing alerts: resolve it if it is open and auto resolve is configured
//!   - still open: nothing to do
//!   - resolved as won't fix: leave it resolved
//!   - resolved otherwise: reopen it

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tera::Context;
use thiserror::Error;

use self::settings::ReceiverConfig;
use crate::{
	alert::Data,
	identity,
	jira::{IssueService, JiraError},
	template::{RenderError, Template},
};

pub mod settings;

mod create;
mod finder;
mod transition;


/// error returned by [Receiver::notify]
#[derive(Error, Debug)]
pub enum NotifyError {
	/// a configured template couldn't be rendered
	#[error("render {what}")]
	Render {
		/// which template failed
		what: &'static str,
		#[source]
		#[allow(clippy::missing_docs_in_private_items)]
		source: RenderError,
	},
	/// a jira request failed
	#[error(transparent)]
	Jira(#[from] JiraError),
	/// the issue's workflow doesn't offer the configured transition
	#[error("JIRA state {state:?} does not exist or no transition possible for {key}")]
	Transition {
		/// the configured transition name
		state: String,
		/// the issue
		key: String,
	},
}

impl NotifyError {
	/// true if alertmanager should deliver the notification again later
	pub fn should_retry(&self) -> bool {
		match self {
			Self::Jira(err) => err.is_retryable(),
			Self::Render { .. } | Self::Transition { .. } => false,
		}
	}
}

/// source of the current time
pub trait Clock: Send + Sync {
	/// the current time
	fn now(&self) -> DateTime<Utc>;
}

/// the system clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// An alertmanager receiver together with its jira configuration
pub struct Receiver {
	/// jira issue api
	client: Arc<dyn IssueService>,
	/// receiver configuration
	conf: Arc<ReceiverConfig>,
	/// renderer for all configured templates
	template: Arc<Template>,
	/// used to decide if a resolved issue is too old to reopen
	clock: Box<dyn Clock>,
}

impl Receiver {
	/// construct receiver
	pub fn new(
		client: Arc<dyn IssueService>,
		conf: Arc<ReceiverConfig>,
		template: Arc<Template>,
	) -> Self {
		Self { client, conf, template, clock: Box::new(SystemClock) }
	}

	/// replace the system clock
	#[cfg(test)]
	pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
		self.clock = Box::new(clock);
		self
	}

	/// name of the alertmanager receiver
	pub fn name(&self) -> &str {
		&self.conf.name
	}

	/// Manages jira issues based on an alertmanager webhook notification.
	///
	/// The alerts are regrouped according to `group_issue_by` first, every
	/// group gets processed in order. The first failing group aborts the
	/// notification, redelivering it is safe.
	///
	/// # Arguments
	///
	/// * `data` - the webhook notification
	///
	/// * `hash_jira_label` - use the fixed length hashed identifier label
	pub async fn notify(&self, data: &Data, hash_jira_label: bool) -> Result<(), NotifyError> {
		for group in data.group_by(self.conf.group_issue_by) {
			self.notify_group(&group, hash_jira_label).await?;
		}

		Ok(())
	}

	/// reconcile the issue of a single group
	async fn notify_group(&self, data: &Data, hash_jira_label: bool) -> Result<(), NotifyError> {
		let context =
			Template::context(data).map_err(|source| NotifyError::Render { what: "data", source })?;

		let project = self.render("project", &self.conf.project, &context)?;
		// always rendered so the summary reflects the current state of the group
		let summary = self.render("summary", &self.conf.summary, &context)?;
		let description = self.render("description", &self.conf.description, &context)?;

		let id_label = self.issue_identifier_label(data, &context, hash_jira_label)?;

		let mut labels = Vec::new();
		if self.conf.add_common_labels {
			labels.extend(
				data.common_labels.iter().map(|(name, value)| identity::label_pair(name, value)),
			);
		}
		labels.push(id_label.clone());

		if let Some(issue) = self.find_issue_to_reuse(&project, &id_label).await? {
			if issue.fields.summary != summary {
				self.update_field(&issue.key, "summary", summary).await?;
			}

			if issue.fields.description != description {
				self.update_field(&issue.key, "description", description).await?;
			}

			if !data.has_firing() {
				if issue.is_done() {
					tracing::debug!(
						"no firing alert; issue {} is already resolved ({labels:?})",
						issue.key
					);
					return Ok(());
				}

				if let Some(auto_resolve) = &self.conf.auto_resolve {
					tracing::debug!("no firing alert; resolving issue {} ({labels:?})", issue.key);
					return self.do_transition(&issue.key, &auto_resolve.state).await;
				}

				tracing::debug!(
					"no firing alert; summary checked, nothing else to do for {} ({labels:?})",
					issue.key
				);
				return Ok(());
			}

			// the set of jira status categories is fixed
			if !issue.is_done() {
				tracing::debug!("issue {} is unresolved, all is done ({labels:?})", issue.key);
				return Ok(());
			}

			if let (Some(wont_fix), Some(resolution)) =
				(&self.conf.wont_fix_resolution, issue.resolution())
			{
				if wont_fix == resolution {
					tracing::info!(
						"issue {} was resolved as {resolution:?}, not reopening ({labels:?})",
						issue.key
					);
					return Ok(());
				}
			}

			tracing::info!("issue {} was recently resolved, reopening ({labels:?})", issue.key);
			return self.do_transition(&issue.key, &self.conf.reopen_state).await;
		}

		if !data.has_firing() {
			tracing::debug!("no firing alert; nothing to do ({labels:?})");
			return Ok(());
		}

		tracing::info!("no recent matching issue found, creating new issue ({labels:?})");

		let issue = self.build_issue(data, &context, project, summary, description, labels)?;
		self.create(&issue).await
	}

	/// render one of the configured templates
	fn render(
		&self,
		what: &'static str,
		template: &str,
		context: &Context,
	) -> Result<String, NotifyError> {
		self.template
			.execute(template, context)
			.map_err(|source| NotifyError::Render { what, source })
	}

	/// The label identifying the issue of this group. Rendered from
	/// `issue_identifier_label` if configured, derived from the group labels
	/// otherwise.
	fn issue_identifier_label(
		&self,
		data: &Data,
		context: &Context,
		hash_jira_label: bool,
	) -> Result<String, NotifyError> {
		match &self.conf.issue_identifier_label {
			Some(template) => Ok(identity::strip_spaces(&self.render(
				"issue identifier label",
				template,
				context,
			)?)),
			None => Ok(identity::group_ticket_label(&data.group_labels, hash_jira_label)),
		}
	}

	/// update a single text field of an issue
	async fn update_field(
		&self,
		key: &str,
		field: &'static str,
		value: String,
	) -> Result<(), NotifyError> {
		tracing::debug!("updating {field} of issue {key}: {value:?}");

		let mut fields = Map::new();
		fields.insert(field.to_owned(), Value::String(value));
		self.client.update(key, &fields).await?;

		tracing::debug!("issue {key} {field} updated");
		Ok(())
	}
}
