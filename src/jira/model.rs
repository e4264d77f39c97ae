//! request and response bodies of the jira rest api v2

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::ticket::{Comment, NewTicket, Ticket, TicketQuery, TicketUpdate};

/// format of `resolutiondate`, e.g. `2024-03-01T11:50:00.000+0000`
const JIRA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Renders a query as JQL, e.g.
/// `project in('AB', 'CD') and labels="ALERT{alertname=\"Down\"}" order by resolutiondate desc`
pub fn jql(query: &TicketQuery) -> String {
	let projects: Vec<_> = query.projects.iter().map(|project| format!("'{project}'")).collect();

	format!("project in({}) and labels={:?} order by resolutiondate desc", projects.join(", "), query.label)
}

/// body of `POST /search`
pub(super) fn search_body(query: &TicketQuery) -> Value {
	json!({
		"jql": jql(query),
		"maxResults": query.limit,
		"fields": query.fields,
	})
}

/// body of `POST /issue`, standard fields win over custom fields of the same name
pub(super) fn create_body(ticket: &NewTicket) -> Value {
	let mut fields = ticket.fields.clone();

	fields.insert("project".into(), json!({ "key": ticket.project }));
	fields.insert("issuetype".into(), json!({ "name": ticket.issue_type }));
	fields.insert("summary".into(), json!(ticket.summary));
	fields.insert("description".into(), json!(ticket.description));
	fields.insert("labels".into(), json!(ticket.labels));

	if let Some(priority) = &ticket.priority {
		fields.insert("priority".into(), json!({ "name": priority }));
	}

	if !ticket.components.is_empty() {
		let components: Vec<_> = ticket.components.iter().map(|name| json!({ "name": name })).collect();
		fields.insert("components".into(), Value::Array(components));
	}

	json!({ "fields": fields })
}

/// body of `PUT /issue/{key}`
pub(super) fn update_body(update: &TicketUpdate) -> Value {
	let mut fields = Map::new();

	if let Some(summary) = &update.summary {
		fields.insert("summary".into(), json!(summary));
	}
	if let Some(description) = &update.description {
		fields.insert("description".into(), json!(description));
	}
	if let Some(priority) = &update.priority {
		fields.insert("priority".into(), json!({ "name": priority }));
	}

	json!({ "fields": fields })
}

/// body of `POST /issue/{key}/transitions`
pub(super) fn transition_body(transition_id: &str) -> Value {
	json!({ "transition": { "id": transition_id } })
}

/// body of `POST /issue/{key}/comment`
pub(super) fn comment_body(body: &str) -> Value {
	json!({ "body": body })
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
	#[serde(default)]
	pub issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateResponse {
	pub id: String,
	pub key: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TransitionsResponse {
	#[serde(default)]
	pub transitions: Vec<Named>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Issue {
	id: String,
	key: String,
	#[serde(default)]
	fields: IssueFields,
}

/// the subset of issue fields a search asks for, jira sends `null` for unset ones
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueFields {
	project: Option<Project>,
	summary: Option<String>,
	description: Option<String>,
	priority: Option<Named>,
	labels: Option<Vec<String>>,
	status: Option<IssueStatus>,
	resolution: Option<Named>,
	#[serde(deserialize_with = "jira_time")]
	resolutiondate: Option<DateTime<Utc>>,
	comment: Option<Comments>,
}

/// anything with an id and a name, e.g. priorities, resolutions and transitions
#[derive(Debug, Deserialize)]
pub(super) struct Named {
	#[serde(default)]
	pub id: String,
	pub name: String,
}

#[derive(Debug, Deserialize)]
struct Project {
	key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueStatus {
	status_category: StatusCategory,
}

#[derive(Debug, Deserialize)]
struct StatusCategory {
	key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Comments {
	comments: Vec<CommentResponse>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentResponse {
	pub id: String,
	#[serde(default)]
	pub body: String,
}

impl From<CommentResponse> for Comment {
	fn from(comment: CommentResponse) -> Self {
		Comment { id: comment.id, body: comment.body }
	}
}

impl From<Issue> for Ticket {
	fn from(issue: Issue) -> Self {
		let fields = issue.fields;

		Ticket {
			id: issue.id,
			key: issue.key,
			project: fields.project.map(|project| project.key).unwrap_or_default(),
			summary: fields.summary.unwrap_or_default(),
			description: fields.description.unwrap_or_default(),
			priority: fields.priority.map(|priority| priority.name),
			labels: fields.labels.unwrap_or_default(),
			status_category: fields.status.map(|status| status.status_category.key).unwrap_or_default(),
			resolution: fields.resolution.map(|resolution| resolution.name),
			resolution_date: fields.resolutiondate,
			comments: fields
				.comment
				.map(|comments| comments.comments.into_iter().map(Comment::from).collect())
				.unwrap_or_default(),
		}
	}
}

/// parse jira's timestamp format, rfc 3339 is accepted as well
fn jira_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
	D: Deserializer<'de>,
{
	let time = match Option::<String>::deserialize(deserializer)? {
		Some(time) if !time.is_empty() => time,
		_ => return Ok(None),
	};

	DateTime::parse_from_str(&time, JIRA_TIME_FORMAT)
		.or_else(|_| DateTime::parse_from_rfc3339(&time))
		.map(|time| Some(time.with_timezone(&Utc)))
		.map_err(|err| D::Error::custom(format!("invalid resolutiondate {time:?}: {err}")))
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn query() -> TicketQuery {
		TicketQuery {
			projects: vec!["AB".into(), "CD".into()],
			label: r#"ALERT{alertname="Down"}"#.into(),
			fields: vec!["summary".into(), "status".into()],
			limit: 2,
		}
	}

	#[test]
	fn renders_jql() {
		assert_eq!(
			jql(&query()),
			r#"project in('AB', 'CD') and labels="ALERT{alertname=\"Down\"}" order by resolutiondate desc"#
		);
	}

	#[test]
	fn search_request() {
		assert_eq!(
			search_body(&query()),
			json!({
				"jql": jql(&query()),
				"maxResults": 2,
				"fields": ["summary", "status"],
			})
		);
	}

	#[test]
	fn parses_resolved_issue() {
		let response: SearchResponse = serde_json::from_value(json!({
			"startAt": 0,
			"total": 1,
			"issues": [{
				"id": "10001",
				"key": "AB-1",
				"fields": {
					"project": {"key": "AB"},
					"summary": "[FIRING:1] Down",
					"description": null,
					"priority": {"id": "3", "name": "Major"},
					"status": {"name": "Closed", "statusCategory": {"id": 3, "key": "done"}},
					"resolution": {"id": "10000", "name": "Won't Fix"},
					"resolutiondate": "2024-03-01T11:50:00.000+0100",
					"comment": {"comments": [{"id": "1", "body": "first"}, {"id": "2", "body": "second"}]}
				}
			}]
		}))
		.unwrap();

		let ticket = Ticket::from(response.issues.into_iter().next().unwrap());

		assert_eq!(ticket.key, "AB-1");
		assert_eq!(ticket.project, "AB");
		assert_eq!(ticket.description, "");
		assert_eq!(ticket.priority.as_deref(), Some("Major"));
		assert!(ticket.is_done());
		assert_eq!(ticket.resolution.as_deref(), Some("Won't Fix"));
		assert_eq!(ticket.resolution_date, Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 50, 0).unwrap()));
		assert_eq!(ticket.last_comment(), Some("second"));
	}

	#[test]
	fn parses_open_issue() {
		let issue: Issue = serde_json::from_value(json!({
			"id": "10002",
			"key": "AB-2",
			"fields": {
				"summary": "s",
				"priority": null,
				"status": {"statusCategory": {"key": "indeterminate"}},
				"resolution": null,
				"resolutiondate": null
			}
		}))
		.unwrap();

		let ticket = Ticket::from(issue);

		assert!(!ticket.is_done());
		assert_eq!(ticket.priority, None);
		assert_eq!(ticket.resolution_date, None);
		assert!(ticket.comments.is_empty());
	}

	#[test]
	fn rejects_garbled_resolution_date() {
		let result: Result<Issue, _> = serde_json::from_value(json!({
			"id": "1",
			"key": "AB-1",
			"fields": {"resolutiondate": "yesterday"}
		}));
		assert!(result.is_err());
	}

	#[test]
	fn create_request() {
		let mut custom = Map::new();
		custom.insert("customfield_10001".into(), json!("jira-ab"));
		custom.insert("summary".into(), json!("overwritten"));

		let ticket = NewTicket {
			project: "AB".into(),
			issue_type: "Bug".into(),
			summary: "[FIRING:1] Down".into(),
			description: "d".into(),
			labels: vec!["ALERT{}".into()],
			priority: Some("Critical".into()),
			components: vec!["Monitoring".into()],
			fields: custom,
		};

		assert_eq!(
			create_body(&ticket),
			json!({"fields": {
				"project": {"key": "AB"},
				"issuetype": {"name": "Bug"},
				"summary": "[FIRING:1] Down",
				"description": "d",
				"labels": ["ALERT{}"],
				"priority": {"name": "Critical"},
				"components": [{"name": "Monitoring"}],
				"customfield_10001": "jira-ab",
			}})
		);
	}

	#[test]
	fn update_request_only_contains_changes() {
		assert_eq!(update_body(&TicketUpdate::summary("s")), json!({"fields": {"summary": "s"}}));
		assert_eq!(update_body(&TicketUpdate::priority("Minor")), json!({"fields": {"priority": {"name": "Minor"}}}));
		assert_eq!(transition_body("11"), json!({"transition": {"id": "11"}}));
	}
}
