//! The ticket backend as seen by the reconciliation.
//!
//! [TicketService] is implemented by the [jira client](crate::jira::JiraClient)
//! and by test doubles. Errors carry enough information to decide whether
//! alertmanager should redeliver the notification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// status category key of resolved tickets
pub const STATUS_CATEGORY_DONE: &str = "done";

/// fields requested when searching for a ticket to reuse
pub const SEARCH_FIELDS: [&str; 7] =
	["summary", "priority", "status", "resolution", "resolutiondate", "description", "comment"];

/// http status codes after which a request should be retried
const RETRYABLE_STATUS: [u16; 3] = [429, 500, 503];

/// A ticket as returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ticket {
	/// backend id
	pub id: String,
	/// human readable key, e.g. `AB-123`
	pub key: String,
	/// project key
	pub project: String,
	/// ticket title
	pub summary: String,
	/// ticket body
	pub description: String,
	/// priority name, if the ticket has one
	pub priority: Option<String>,
	/// labels in display order
	pub labels: Vec<String>,
	/// coarse workflow state, only [STATUS_CATEGORY_DONE] is special
	pub status_category: String,
	/// resolution name of resolved tickets
	pub resolution: Option<String>,
	/// point in time the ticket was resolved
	pub resolution_date: Option<DateTime<Utc>>,
	/// comments, oldest first
	pub comments: Vec<Comment>,
}

impl Ticket {
	/// true if the ticket's status category is "done"
	pub fn is_done(&self) -> bool {
		self.status_category == STATUS_CATEGORY_DONE
	}

	/// body of the most recent comment
	pub fn last_comment(&self) -> Option<&str> {
		self.comments.last().map(|comment| comment.body.as_str())
	}
}

/// a ticket comment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
	/// backend id
	pub id: String,
	/// comment text
	pub body: String,
}

/// a workflow transition available on a ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	/// backend id, used to apply the transition
	pub id: String,
	/// name of the transition as configured in `reopen_state`/`auto_resolve`
	pub name: String,
}

/// id and key of a newly created ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRef {
	/// backend id
	pub id: String,
	/// human readable key
	pub key: String,
}

/// Search for tickets in any of `projects` carrying `label`, most recently
/// resolved first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
	/// project keys to search
	pub projects: Vec<String>,
	/// the group label
	pub label: String,
	/// fields to return
	pub fields: Vec<String>,
	/// maximum number of results
	pub limit: usize,
}

/// a ticket to be created
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTicket {
	/// project key
	pub project: String,
	/// issue type name
	pub issue_type: String,
	/// ticket title
	pub summary: String,
	/// ticket body
	pub description: String,
	/// labels, the group label among them
	pub labels: Vec<String>,
	/// priority name
	pub priority: Option<String>,
	/// component names
	pub components: Vec<String>,
	/// additional backend specific fields
	pub fields: serde_json::Map<String, serde_json::Value>,
}

/// changes to an existing ticket, unset fields stay untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
	/// new title
	pub summary: Option<String>,
	/// new body
	pub description: Option<String>,
	/// new priority name
	pub priority: Option<String>,
}

impl TicketUpdate {
	/// update only the summary
	pub fn summary(summary: impl Into<String>) -> Self {
		Self { summary: Some(summary.into()), ..Default::default() }
	}

	/// update only the description
	pub fn description(description: impl Into<String>) -> Self {
		Self { description: Some(description.into()), ..Default::default() }
	}

	/// update only the priority
	pub fn priority(priority: impl Into<String>) -> Self {
		Self { priority: Some(priority.into()), ..Default::default() }
	}
}

/// Error returned by a [TicketService]
#[derive(Error, Debug)]
pub enum ServiceError {
	/// the backend answered with a non 2xx status
	#[error("{api} returned status {status}: {body}")]
	Status {
		/// operation that failed
		api: &'static str,
		/// http status code
		status: u16,
		/// response body
		body: String,
	},
	/// the request timed out before a response arrived
	#[error("{api} timed out")]
	Timeout {
		/// operation that failed
		api: &'static str,
	},
	/// the request couldn't be sent or the response couldn't be read
	#[error("{api} failed")]
	Transport {
		/// operation that failed
		api: &'static str,
		/// underlying error
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},
	/// the response didn't look like expected
	#[error("malformed response from {api}: {reason}")]
	Malformed {
		/// operation that failed
		api: &'static str,
		/// what was wrong
		reason: String,
	},
}

impl ServiceError {
	/// true if redelivering the notification may succeed
	pub fn is_retryable(&self) -> bool {
		match self {
			ServiceError::Status { status, .. } => RETRYABLE_STATUS.contains(status),
			ServiceError::Timeout { .. } => true,
			ServiceError::Transport { .. } | ServiceError::Malformed { .. } => false,
		}
	}
}

/// Operations on the ticket backend.
#[async_trait]
pub trait TicketService: Send + Sync {
	/// search tickets
	async fn search(&self, query: &TicketQuery) -> Result<Vec<Ticket>, ServiceError>;

	/// create a ticket
	async fn create(&self, ticket: &NewTicket) -> Result<TicketRef, ServiceError>;

	/// update fields of a ticket
	async fn update_fields(&self, key: &str, update: &TicketUpdate) -> Result<(), ServiceError>;

	/// add a comment to a ticket
	async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, ServiceError>;

	/// transitions currently possible for a ticket
	async fn list_transitions(&self, key: &str) -> Result<Vec<Transition>, ServiceError>;

	/// apply a transition by id
	async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<(), ServiceError>;
}
