//! data structures for deserializing incoming alerts and regrouping them before
//! they get matched against jira issues
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// label or annotation set. Kept sorted by name so every consumer sees the
/// same pair order.
pub type KV = BTreeMap<String, String>;

/// the label every prometheus alert carries with the name of its alerting rule
pub const ALERTNAME: &str = "alertname";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// state of an alert or of a whole alert group
pub enum Status {
	/// alert is currently active
	Firing,
	/// alert stopped firing
	Resolved,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
/// how alerts of one webhook call get mapped onto jira issues
pub enum GroupIssueBy {
	/// one issue per alertmanager alert group
	#[default]
	AlertGroup,
	/// one issue per alerting rule (`alertname` label)
	AlertRule,
	/// one issue per alert
	Alert,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
pub struct Data {
	/// webhook schema version
	pub version: String,
	/// key identifying the alert group inside alertmanager
	pub group_key: String,
	/// number of alerts alertmanager left out of this call
	#[serde(default)]
	pub truncated_alerts: u64,
	/// name of the alertmanager receiver, used to pick the jira configuration
	pub receiver: String,
	/// firing if at least one alert is firing
	pub status: Status,
	/// the alerts of this group
	pub alerts: Vec<Alert>,
	/// labels the group was formed by
	#[serde(default)]
	pub group_labels: KV,
	/// labels shared by all alerts
	#[serde(default)]
	pub common_labels: KV,
	/// annotations shared by all alerts
	#[serde(default)]
	pub common_annotations: KV,
	#[serde(rename = "externalURL", default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub external_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// a single alert inside of [Data]
pub struct Alert {
	/// firing or resolved
	pub status: Status,
	/// identifying labels, normally including `alertname`
	#[serde(default)]
	pub labels: KV,
	/// descriptive annotations
	#[serde(default)]
	pub annotations: KV,
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub starts_at: Option<DateTime<Utc>>,
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename = "generatorURL", default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub generator_url: String,
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub fingerprint: String,
}

impl Alert {
	/// true if the alert is still active
	pub fn is_firing(&self) -> bool {
		self.status == Status::Firing
	}
}

impl Data {
	/// alerts which are still firing
	pub fn firing(&self) -> impl Iterator<Item = &Alert> {
		self.alerts.iter().filter(|alert| alert.is_firing())
	}

	/// true if at least one alert is firing
	pub fn has_firing(&self) -> bool {
		self.firing().next().is_some()
	}

	/// Splits the alerts of this webhook call into the units that get their own
	/// jira issue.
	///
	/// Every returned [Data] contains at least one alert. Alerts without an
	/// `alertname` label are left out when grouping by [GroupIssueBy::AlertRule].
	pub fn group_by(&self, group_by: GroupIssueBy) -> Vec<Data> {
		match group_by {
			// alertmanager already groups by alert group
			GroupIssueBy::AlertGroup => vec![self.clone()],
			GroupIssueBy::AlertRule => self.group_by_rule(),
			GroupIssueBy::Alert => self.group_by_alert(),
		}
	}

	/// copy of `self` without any alerts or common labels/annotations
	fn empty_group(&self, status: Status) -> Data {
		Data {
			version: self.version.clone(),
			group_key: self.group_key.clone(),
			truncated_alerts: 0,
			receiver: self.receiver.clone(),
			status,
			alerts: Vec::new(),
			group_labels: self.group_labels.clone(),
			common_labels: KV::new(),
			common_annotations: KV::new(),
			external_url: self.external_url.clone(),
		}
	}

	/// one [Data] per alert, the alert's own labels and annotations become the
	/// common ones
	fn group_by_alert(&self) -> Vec<Data> {
		self.alerts
			.iter()
			.map(|alert| Data {
				alerts: vec![alert.clone()],
				common_labels: alert.labels.clone(),
				common_annotations: alert.annotations.clone(),
				..self.empty_group(alert.status)
			})
			.collect()
	}

	/// one [Data] per `alertname`, in the order the rules first appear
	fn group_by_rule(&self) -> Vec<Data> {
		let mut rules: IndexMap<&str, Data> = IndexMap::new();
		let mut dropped = 0;

		for alert in &self.alerts {
			let name = match alert.labels.get(ALERTNAME) {
				Some(name) => name.as_str(),
				None => {
					dropped += 1;
					continue;
				}
			};

			let data = rules.entry(name).or_insert_with(|| self.empty_group(Status::Resolved));
			if alert.is_firing() {
				data.status = Status::Firing;
			}
			data.alerts.push(alert.clone());
		}

		if dropped > 0 {
			tracing::debug!(
				"{dropped} alerts of group {} have no {ALERTNAME} label and were left out",
				self.group_key
			);
		}

		rules
			.into_values()
			.map(|mut data| {
				data.common_labels = common(data.alerts.iter().map(|alert| &alert.labels));
				data.common_annotations =
					common(data.alerts.iter().map(|alert| &alert.annotations));
				data
			})
			.collect()
	}
}

/// Intersection of all given sets: a pair is kept only if every set contains
/// it with the same value.
fn common<'a>(mut sets: impl Iterator<Item = &'a KV>) -> KV {
	let mut common = match sets.next() {
		Some(first) => first.clone(),
		None => return KV::new(),
	};

	for set in sets {
		if common.is_empty() {
			break;
		}
		common.retain(|name, value| set.get(name) == Some(value));
	}

	common
}
