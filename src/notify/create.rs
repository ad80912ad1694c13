//! builds and creates new issues

use tera::Context;

use super::{NotifyError, Receiver};
use crate::{
	alert::Data,
	identity,
	jira::{Issue, IssueFields, Key, Name},
};

impl Receiver {
	/// Assembles a new issue from the rendered templates.
	///
	/// # Arguments
	///
	/// * `data` - the alert group
	///
	/// * `context` - `data` prepared for rendering
	///
	/// * `labels` - identifier label and, if configured, common labels
	pub(super) fn build_issue(
		&self,
		data: &Data,
		context: &Context,
		project: String,
		summary: String,
		description: String,
		mut labels: Vec<String>,
	) -> Result<Issue, NotifyError> {
		let issue_type = self.render("issue type", &self.conf.issue_type, context)?;

		let priority = match &self.conf.priority {
			Some(priority) => Some(Name::new(self.render("issue priority", priority, context)?)),
			None => None,
		};

		let components = self
			.conf
			.components
			.iter()
			.map(|component| Ok(Name::new(self.render("issue component", component, context)?)))
			.collect::<Result<Vec<_>, NotifyError>>()?;

		if self.conf.add_group_labels {
			labels.extend(
				data.group_labels.iter().map(|(name, value)| identity::label_pair(name, value)),
			);
		}

		let mut unknowns = serde_json::Map::with_capacity(self.conf.fields.len());
		for (field, value) in &self.conf.fields {
			let value = self
				.template
				.deep_copy(value, context)
				.map_err(|source| NotifyError::Render { what: "custom field", source })?;
			unknowns.insert(field.clone(), value);
		}

		Ok(Issue {
			fields: IssueFields {
				project: Some(Key::new(project)),
				issue_type: Some(Name::new(issue_type)),
				summary,
				description,
				labels,
				priority,
				components,
				unknowns,
				..Default::default()
			},
			..Default::default()
		})
	}

	/// create `issue` in jira
	pub(super) async fn create(&self, issue: &Issue) -> Result<(), NotifyError> {
		tracing::debug!("create {:?}", issue.fields);

		let created = self.client.create(issue).await?;

		tracing::info!("issue created: {} (id {})", created.key, created.id);
		Ok(())
	}
}
