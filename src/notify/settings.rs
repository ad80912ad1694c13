//! config file options of a receiver
//!
//! Receivers inherit every option they don't set from the `defaults` section.

use std::{collections::HashSet, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::{Map, Value};
use serde_with::{serde_as, DeserializeAs};
use url::Url;

use crate::{
	alert::GroupIssueBy,
	jira::settings::{Auth, JiraSettings, DEFAULT_TIMEOUT},
};

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
/// receiver options as written in the config file, every option is optional
/// because it may be inherited
pub struct ReceiverSettings {
	/// alertmanager receiver name this configuration applies to
	pub name: Option<String>,

	/// base url of the jira instance
	pub api_url: Option<Url>,
	/// basic auth user
	pub user: Option<String>,
	/// basic auth password
	pub password: Option<String>,
	/// personal access token, replaces basic auth
	pub personal_access_token: Option<String>,
	/// timeout of jira requests
	#[serde_as(as = "Option<ConfigDuration>")]
	#[serde(default)]
	pub timeout: Option<Duration>,

	/// project key template
	pub project: Option<String>,
	/// issue type template
	pub issue_type: Option<String>,
	/// summary template
	pub summary: Option<String>,
	/// description template
	pub description: Option<String>,
	/// priority template
	pub priority: Option<String>,
	/// component name templates
	pub components: Option<Vec<String>>,

	/// name of the transition reopening resolved issues
	pub reopen_state: Option<String>,
	/// time after which resolved issues get no longer reopened, 0 reopens
	/// forever
	#[serde_as(as = "Option<ConfigDuration>")]
	#[serde(default)]
	pub reopen_duration: Option<Duration>,
	/// issues resolved with this resolution are never reopened
	pub wont_fix_resolution: Option<String>,
	/// resolve issues once all alerts are resolved
	pub auto_resolve: Option<AutoResolve>,

	/// add the group labels as issue labels on creation
	pub add_group_labels: Option<bool>,
	/// add the common labels as issue labels
	pub add_common_labels: Option<bool>,
	/// how alerts get mapped onto issues
	pub group_issue_by: Option<GroupIssueBy>,
	/// template for the issue identifier label, replaces the label derived
	/// from the group labels
	pub issue_identifier_label: Option<String>,

	/// custom fields, every string inside is a template
	pub fields: Option<Map<String, Value>>,
}

/// A duration given either as seconds (`3600`, `0.5`) or as duration string
/// (`1h`, `30m`, `7d`).
pub struct ConfigDuration;

impl<'de> DeserializeAs<'de, Duration> for ConfigDuration {
	fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		#[allow(clippy::missing_docs_in_private_items)]
		enum Raw {
			Seconds(f64),
			Text(String),
		}

		let seconds = match Raw::deserialize(deserializer)? {
			Raw::Seconds(seconds) => seconds,
			Raw::Text(text) => match text.trim().parse::<f64>() {
				Ok(seconds) => seconds,
				Err(_) => {
					return humantime::parse_duration(text.trim()).map_err(|err| {
						D::Error::custom(format!("invalid duration {text:?}: {err}"))
					})
				}
			},
		};

		Duration::try_from_secs_f64(seconds)
			.map_err(|err| D::Error::custom(format!("invalid duration {seconds}: {err}")))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// auto resolve options
pub struct AutoResolve {
	/// name of the transition resolving an issue
	pub state: String,
}

#[derive(Debug, Clone, PartialEq)]
/// the effective configuration of a receiver
pub struct ReceiverConfig {
	#[allow(clippy::missing_docs_in_private_items)]
	pub name: String,
	/// connection to jira
	pub jira: JiraSettings,

	#[allow(clippy::missing_docs_in_private_items)]
	pub project: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub issue_type: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub summary: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub description: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub priority: Option<String>,
	#[allow(clippy::missing_docs_in_private_items)]
	pub components: Vec<String>,

	#[allow(clippy::missing_docs_in_private_items)]
	pub reopen_state: String,
	#[allow(clippy::missing_docs_in_private_items)]
	pub reopen_duration: Duration,
	#[allow(clippy::missing_docs_in_private_items)]
	pub wont_fix_resolution: Option<String>,
	#[allow(clippy::missing_docs_in_private_items)]
	pub auto_resolve: Option<AutoResolve>,

	#[allow(clippy::missing_docs_in_private_items)]
	pub add_group_labels: bool,
	#[allow(clippy::missing_docs_in_private_items)]
	pub add_common_labels: bool,
	#[allow(clippy::missing_docs_in_private_items)]
	pub group_issue_by: GroupIssueBy,
	#[allow(clippy::missing_docs_in_private_items)]
	pub issue_identifier_label: Option<String>,

	#[allow(clippy::missing_docs_in_private_items)]
	pub fields: Map<String, Value>,
}

/// `receiver` if set, `defaults` otherwise
fn inherit<T: Clone>(receiver: &Option<T>, defaults: &Option<T>) -> Option<T> {
	receiver.as_ref().or(defaults.as_ref()).cloned()
}

impl ReceiverSettings {
	/// Merges the receiver with `defaults` and checks that all required
	/// options are set.
	pub fn resolve(&self, defaults: &ReceiverSettings) -> Result<ReceiverConfig> {
		let name = match &self.name {
			Some(name) if !name.is_empty() => name.clone(),
			_ => bail!("missing name for receiver"),
		};

		let required = |value: Option<String>, option: &str| match value {
			Some(value) if !value.is_empty() => Ok(value),
			_ => Err(anyhow::anyhow!("missing {option} in receiver {name:?}")),
		};

		let api_url = inherit(&self.api_url, &defaults.api_url)
			.with_context(|| format!("missing api_url in receiver {name:?}"))?;

		let auth = match (
			inherit(&self.user, &defaults.user),
			inherit(&self.password, &defaults.password),
			inherit(&self.personal_access_token, &defaults.personal_access_token),
		) {
			(None, None, Some(token)) => Auth::PersonalAccessToken(token),
			(Some(user), Some(password), None) => Auth::Basic { user, password },
			(_, _, Some(_)) => bail!(
				"user/password and personal_access_token are mutually exclusive in receiver \
				 {name:?}"
			),
			_ => bail!(
				"missing authentication in receiver {name:?}: set user and password or \
				 personal_access_token"
			),
		};

		let mut fields = defaults.fields.clone().unwrap_or_default();
		fields.extend(self.fields.clone().unwrap_or_default());

		Ok(ReceiverConfig {
			jira: JiraSettings {
				api_url,
				auth,
				timeout: inherit(&self.timeout, &defaults.timeout).unwrap_or(DEFAULT_TIMEOUT),
			},

			project: required(inherit(&self.project, &defaults.project), "project")?,
			issue_type: required(inherit(&self.issue_type, &defaults.issue_type), "issue_type")?,
			summary: required(inherit(&self.summary, &defaults.summary), "summary")?,
			description: inherit(&self.description, &defaults.description).unwrap_or_default(),
			priority: inherit(&self.priority, &defaults.priority).filter(|p| !p.is_empty()),
			components: inherit(&self.components, &defaults.components).unwrap_or_default(),

			reopen_state: required(
				inherit(&self.reopen_state, &defaults.reopen_state),
				"reopen_state",
			)?,
			reopen_duration: inherit(&self.reopen_duration, &defaults.reopen_duration)
				.with_context(|| format!("missing reopen_duration in receiver {name:?}"))?,
			wont_fix_resolution: inherit(&self.wont_fix_resolution, &defaults.wont_fix_resolution)
				.filter(|resolution| !resolution.is_empty()),
			auto_resolve: inherit(&self.auto_resolve, &defaults.auto_resolve),

			add_group_labels: inherit(&self.add_group_labels, &defaults.add_group_labels)
				.unwrap_or(false),
			add_common_labels: inherit(&self.add_common_labels, &defaults.add_common_labels)
				.unwrap_or(false),
			group_issue_by: inherit(&self.group_issue_by, &defaults.group_issue_by)
				.unwrap_or_default(),
			issue_identifier_label: inherit(
				&self.issue_identifier_label,
				&defaults.issue_identifier_label,
			)
			.filter(|label| !label.is_empty()),

			fields,
			name,
		})
	}
}

/// resolves all receivers, rejecting duplicate names
pub fn resolve_all(
	receivers: &[ReceiverSettings],
	defaults: &ReceiverSettings,
) -> Result<Vec<ReceiverConfig>> {
	let mut names = HashSet::new();
	let mut configs = Vec::with_capacity(receivers.len());

	for receiver in receivers {
		let config = receiver.resolve(defaults)?;
		if !names.insert(config.name.clone()) {
			bail!("receiver {:?} is configured more than once", config.name);
		}
		configs.push(config);
	}

	Ok(configs)
}
