//! data structures for deserializing incoming alert group notifications
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// label or annotation set of an alert, iterated in key order
pub type KV = BTreeMap<String, String>;

/// firing state of an alert or a whole alert group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	/// at least one alert is active
	Firing,
	/// the alert stopped firing
	Resolved,
}

impl Default for Status {
	fn default() -> Self {
		Status::Firing
	}
}

/// one webhook delivery of the prometheus alertmanager
///
/// Field names are kept in camelCase when serialized, templates refer to them
/// as `groupLabels`, `commonLabels`, `alerts` and so on.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Data {
	/// webhook payload version
	pub version: String,
	/// key identifying the alert group inside alertmanager
	pub group_key: String,
	/// number of alerts alertmanager left out of this delivery
	pub truncated_alerts: u64,
	/// name of the alertmanager receiver, selects the receiver config
	pub receiver: String,
	/// status of the whole group
	pub status: Status,
	/// alerts of the group in delivery order
	pub alerts: Vec<Alert>,
	/// labels the group was built from
	pub group_labels: KV,
	/// labels shared by every alert of the group
	pub common_labels: KV,
	/// annotations shared by every alert of the group
	pub common_annotations: KV,
	/// url of the alertmanager that sent the notification
	#[serde(rename = "externalURL")]
	pub external_url: String,
}

impl Data {
	/// alerts that are still firing
	pub fn firing(&self) -> impl Iterator<Item = &Alert> {
		self.alerts.iter().filter(|alert| alert.status == Status::Firing)
	}

	/// alerts that have been resolved
	pub fn resolved(&self) -> impl Iterator<Item = &Alert> {
		self.alerts.iter().filter(|alert| alert.status == Status::Resolved)
	}

	/// true if the notification carries at least one firing alert
	pub fn has_firing(&self) -> bool {
		self.firing().next().is_some()
	}
}

/// a single alert of an alert group
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	pub status: Status,
	pub labels: KV,
	pub annotations: KV,
	pub starts_at: Option<DateTime<Utc>>,
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
	pub fingerprint: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_alertmanager_payload() {
		let payload = r#"{
			"version": "4",
			"groupKey": "{}:{alertname=\"HighLatency\"}",
			"truncatedAlerts": 0,
			"status": "firing",
			"receiver": "jira-ab",
			"groupLabels": {"alertname": "HighLatency"},
			"commonLabels": {"alertname": "HighLatency", "severity": "page"},
			"commonAnnotations": {},
			"externalURL": "http://alertmanager:9093",
			"alerts": [
				{
					"status": "firing",
					"labels": {"alertname": "HighLatency", "instance": "b"},
					"annotations": {"summary": "slow"},
					"startsAt": "2023-03-01T10:00:00Z",
					"endsAt": "0001-01-01T00:00:00Z",
					"generatorURL": "http://prometheus/graph",
					"fingerprint": "a1"
				},
				{
					"status": "resolved",
					"labels": {"alertname": "HighLatency", "instance": "a"},
					"annotations": {},
					"generatorURL": "http://prometheus/graph"
				}
			]
		}"#;

		let data: Data = serde_json::from_str(payload).unwrap();

		assert_eq!(data.receiver, "jira-ab");
		assert_eq!(data.status, Status::Firing);
		assert_eq!(data.alerts.len(), 2);
		assert_eq!(data.firing().count(), 1);
		assert_eq!(data.resolved().count(), 1);
		assert!(data.has_firing());
		assert_eq!(data.external_url, "http://alertmanager:9093");
		assert_eq!(data.alerts[0].generator_url, "http://prometheus/graph");
		assert_eq!(
			data.common_labels.keys().collect::<Vec<_>>(),
			vec!["alertname", "severity"]
		);
	}

	#[test]
	fn serializes_camel_case_for_templates() {
		let data = Data { receiver: "r".into(), ..Default::default() };
		let value = serde_json::to_value(&data).unwrap();

		assert!(value.get("groupLabels").is_some());
		assert!(value.get("externalURL").is_some());
		assert_eq!(value["status"], "firing");
	}
}
