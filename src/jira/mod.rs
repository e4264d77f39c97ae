//! [TicketService] implementation for the jira rest api v2

mod model;

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{HistogramVec, IntCounterVec};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use self::model::jql;
use crate::{
	config::{Auth, ReceiverConfig},
	ticket::{Comment, NewTicket, ServiceError, Ticket, TicketQuery, TicketRef, TicketService, TicketUpdate, Transition},
};

/// Error occuring when constructing a [JiraClient]
#[derive(Error, Debug)]
pub enum ClientError {
	/// the http client couldn't be built
	#[error("failed to build http client")]
	Http(#[from] reqwest::Error),
	/// the metrics couldn't be registered
	#[error("failed to register metrics")]
	Metrics(#[from] prometheus::Error),
}

#[derive(Debug, Clone)]
struct Metrics {
	requests: IntCounterVec,
	requests_failed: IntCounterVec,
	request_duration: HistogramVec,
}

impl Metrics {
	fn new(receiver: &str) -> prometheus::Result<Self> {
		use prometheus::{
			exponential_buckets, histogram_opts, labels, opts, register_histogram_vec, register_int_counter_vec,
		};

		let requests = register_int_counter_vec!(
			opts!("requests_total", "total number of jira requests", labels! {"receiver" => receiver})
				.namespace("alertbridge")
				.subsystem("jira"),
			&["api"]
		)?;

		let requests_failed = register_int_counter_vec!(
			opts!("requests_failed", "number of failed jira requests", labels! {"receiver" => receiver})
				.namespace("alertbridge")
				.subsystem("jira"),
			&["api", "status_code"]
		)?;

		let request_duration = register_histogram_vec!(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a jira request in seconds",
				exponential_buckets(0.01, 2., 12)?,
				labels! {"receiver".to_string() => receiver.to_string()}
			)
			.namespace("alertbridge")
			.subsystem("jira"),
			&["api"]
		)?;

		Ok(Self { requests, requests_failed, request_duration })
	}
}

/// Jira client of one receiver.
#[derive(Debug, Clone)]
pub struct JiraClient {
	client: reqwest::Client,
	/// `<api_url>/rest/api/2`
	api_root: String,
	auth: Auth,
	metrics: Metrics,
}

impl JiraClient {
	/// Builds a client for `conf`. Requests fail with
	/// [ServiceError::Timeout] once `timeout` elapsed.
	pub fn new(conf: &ReceiverConfig, timeout: Duration) -> Result<Self, ClientError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self {
			client,
			api_root: format!("{}/rest/api/2", conf.api_url.as_str().trim_end_matches('/')),
			auth: conf.auth.clone(),
			metrics: Metrics::new(&conf.name)?,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.api_root, path)
	}

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.auth {
			Auth::Basic { user, password } => request.basic_auth(user, Some(password.expose())),
			Auth::Token(token) => request.bearer_auth(token.expose()),
		}
	}

	/// send the request, non 2xx responses are turned into errors
	async fn send(&self, api: &'static str, request: RequestBuilder) -> Result<Response, ServiceError> {
		self.metrics.requests.with_label_values(&[api]).inc();
		let _timer = self.metrics.request_duration.with_label_values(&[api]).start_timer();

		let response = self.authorize(request).send().await.map_err(|err| transport_error(api, err))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		self.metrics.requests_failed.with_label_values(&[api, status.as_str()]).inc();

		let url = response.url().to_string();
		let body = response.text().await.unwrap_or_default();
		tracing::error!(api, url = url.as_str(), status = status.as_u16(), body = body.as_str(), "jira request failed");

		Err(ServiceError::Status { api, status: status.as_u16(), body })
	}

	/// send the request and decode the json response
	async fn send_json<T: DeserializeOwned>(
		&self,
		api: &'static str,
		request: RequestBuilder,
	) -> Result<T, ServiceError> {
		self.send(api, request).await?.json().await.map_err(|err| transport_error(api, err))
	}
}

/// classify errors of the http client
fn transport_error(api: &'static str, err: reqwest::Error) -> ServiceError {
	if err.is_timeout() {
		ServiceError::Timeout { api }
	} else if err.is_decode() {
		ServiceError::Malformed { api, reason: err.to_string() }
	} else {
		ServiceError::Transport { api, source: Box::new(err) }
	}
}

#[async_trait]
impl TicketService for JiraClient {
	async fn search(&self, query: &TicketQuery) -> Result<Vec<Ticket>, ServiceError> {
		let request = self.client.post(self.url("search")).json(&model::search_body(query));
		let response: model::SearchResponse = self.send_json("Issue.Search", request).await?;

		Ok(response.issues.into_iter().map(Ticket::from).collect())
	}

	async fn create(&self, ticket: &NewTicket) -> Result<TicketRef, ServiceError> {
		let request = self.client.post(self.url("issue")).json(&model::create_body(ticket));
		let created: model::CreateResponse = self.send_json("Issue.Create", request).await?;

		Ok(TicketRef { id: created.id, key: created.key })
	}

	async fn update_fields(&self, key: &str, update: &TicketUpdate) -> Result<(), ServiceError> {
		let request = self.client.put(self.url(&format!("issue/{key}"))).json(&model::update_body(update));
		self.send("Issue.Update", request).await?;

		Ok(())
	}

	async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, ServiceError> {
		let request = self.client.post(self.url(&format!("issue/{key}/comment"))).json(&model::comment_body(body));
		let comment: model::CommentResponse = self.send_json("Issue.AddComment", request).await?;

		Ok(comment.into())
	}

	async fn list_transitions(&self, key: &str) -> Result<Vec<Transition>, ServiceError> {
		let request = self.client.get(self.url(&format!("issue/{key}/transitions")));
		let response: model::TransitionsResponse = self.send_json("Issue.GetTransitions", request).await?;

		Ok(response.transitions.into_iter().map(|t| Transition { id: t.id, name: t.name }).collect())
	}

	async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<(), ServiceError> {
		let request = self
			.client
			.post(self.url(&format!("issue/{key}/transitions")))
			.json(&model::transition_body(transition_id));
		self.send("Issue.DoTransition", request).await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{ReceiverSettings, Secret};

	#[test]
	fn builds_api_urls() {
		let settings = ReceiverSettings {
			name: "jira-url-test".into(),
			api_url: Some("https://example.com/jira/".into()),
			personal_access_token: Some(Secret::new("pat")),
			project: Some("AB".into()),
			issue_type: Some("Bug".into()),
			summary: Some("s".into()),
			reopen_state: Some("To Do".into()),
			reopen_duration: Some("1h".parse().unwrap()),
			..Default::default()
		};
		let conf = ReceiverConfig::merge(&settings, &ReceiverSettings::default()).unwrap();

		let client = JiraClient::new(&conf, Duration::from_secs(10)).unwrap();

		assert_eq!(client.url("issue/AB-1/transitions"), "https://example.com/jira/rest/api/2/issue/AB-1/transitions");
		assert_eq!(client.auth, Auth::Token(Secret::new("pat")));
	}
}
