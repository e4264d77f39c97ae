use std::{
	collections::HashMap,
	net::{IpAddr, Ipv4Addr, SocketAddr},
	sync::Arc,
};

use alertbridge::{alert, config::ReceiverConfig, notify::Reconciler, ticket::TicketService};
use anyhow::{Context, Result};
use axum::{
	extract::{rejection::JsonRejection, Extension, Json},
	http::StatusCode,
	response::{Html, IntoResponse, Response},
	routing::{get, post},
	Router,
};
use prometheus::IntCounterVec;
use serde::{Deserialize, Serialize};

use crate::{settings::Settings, telemetry_endpoint::TelemetryEndpointSettings};

/// receiver label of requests that couldn't be matched to a receiver
const UNKNOWN_RECEIVER: &str = "<unknown>";

const DOCS_URL: &str = "https://github.com/prometheus-community/jiralert#readme";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct WebhookReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl Default for WebhookReceiverSettings {
	fn default() -> Self {
		Self { bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9097 }
	}
}

impl WebhookReceiverSettings {
	pub fn global() -> &'static Self {
		&Settings::global().webhook_receiver
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// a configured receiver and the ticket backend it talks to
pub struct Receiver {
	pub config: ReceiverConfig,
	pub service: Arc<dyn TicketService>,
}

/// body of error responses
#[derive(Debug, Serialize)]
struct ErrorResponse {
	error: bool,
	status: u16,
	message: String,
}

/// a request that couldn't be handled
#[derive(Debug)]
struct Failure {
	status: StatusCode,
	receiver: String,
	message: String,
}

impl Failure {
	fn new(status: StatusCode, receiver: &str, message: impl Into<String>) -> Self {
		Self { status, receiver: receiver.to_owned(), message: message.into() }
	}
}

impl IntoResponse for Failure {
	fn into_response(self) -> Response {
		let body = ErrorResponse { error: true, status: self.status.as_u16(), message: self.message };
		(self.status, Json(body)).into_response()
	}
}

struct State {
	receivers: HashMap<String, Receiver>,
	reconciler: Reconciler,
	/// served on `/config`
	config: serde_json::Value,
	metric: IntCounterVec,
}

impl State {
	fn new(
		receivers: Vec<Receiver>,
		reconciler: Reconciler,
		config: serde_json::Value,
		metric: IntCounterVec,
	) -> Self {
		let receivers =
			receivers.into_iter().map(|receiver| (receiver.config.name.clone(), receiver)).collect();

		Self { receivers, reconciler, config, metric }
	}

	/// reconcile the notification, returns the name of the matched receiver
	async fn handle(&self, data: &alert::Data) -> Result<String, Failure> {
		let receiver = self.receivers.get(&data.receiver).ok_or_else(|| {
			Failure::new(StatusCode::NOT_FOUND, UNKNOWN_RECEIVER, format!("receiver missing: {}", data.receiver))
		})?;

		let name = receiver.config.name.as_str();
		tracing::debug!(receiver = name, "matched receiver");

		match self.reconciler.reconcile(receiver.service.as_ref(), data, &receiver.config).await {
			Ok(outcome) => {
				tracing::debug!(receiver = name, ?outcome, "notification handled");
				Ok(name.to_owned())
			}
			Err(err) => {
				// instruct alertmanager to retry
				let status = if err.is_retryable() {
					StatusCode::SERVICE_UNAVAILABLE
				} else {
					StatusCode::INTERNAL_SERVER_ERROR
				};
				Err(Failure::new(status, name, format!("{:#}", anyhow::Error::new(err))))
			}
		}
	}

	fn count(&self, receiver: &str, status: StatusCode) {
		self.metric.with_label_values(&[receiver, status.as_str()]).inc();
	}
}

async fn alert_handler(
	Extension(state): Extension<Arc<State>>,
	payload: Result<Json<alert::Data>, JsonRejection>,
) -> Response {
	tracing::debug!("handling /alert webhook request");

	let (result, group_labels) = match payload {
		Ok(Json(data)) => (state.handle(&data).await, data.group_labels),
		Err(err) => {
			(Err(Failure::new(StatusCode::BAD_REQUEST, UNKNOWN_RECEIVER, err.to_string())), Default::default())
		}
	};

	match result {
		Ok(receiver) => {
			state.count(&receiver, StatusCode::OK);
			StatusCode::OK.into_response()
		}
		Err(failure) => {
			tracing::error!(
				status = failure.status.as_u16(),
				receiver = failure.receiver.as_str(),
				?group_labels,
				err = failure.message.as_str(),
				"error handling request"
			);
			state.count(&failure.receiver, failure.status);
			failure.into_response()
		}
	}
}

/// landing page linking the other endpoints
fn index_page(metrics_port: u16) -> String {
	format!(
		r#"<html>
<head><title>alertbridge</title></head>
<body>
<h1>alertbridge</h1>
<p>Receives prometheus alertmanager notifications on <code>POST /alert</code> and keeps one jira ticket per alert group.</p>
<ul>
<li><a href="/config">Configuration</a></li>
<li><a href="/healthz">Health</a></li>
<li>Metrics: <code>/metrics</code> on port {metrics_port}</li>
<li><a href="{DOCS_URL}">Help</a></li>
</ul>
</body>
</html>
"#
	)
}

async fn index() -> Html<String> {
	Html(index_page(TelemetryEndpointSettings::global().port))
}

async fn healthz() -> &'static str {
	"OK"
}

async fn config_handler(Extension(state): Extension<Arc<State>>) -> Json<serde_json::Value> {
	Json(state.config.clone())
}

fn register_metric() -> Result<IntCounterVec> {
	use prometheus::{opts, register_int_counter_vec};

	let metric = register_int_counter_vec!(
		opts!("requests_total", "requests processed, by receiver and status code")
			.namespace("alertbridge")
			.subsystem("webhook"),
		&["receiver", "code"]
	)?;

	Ok(metric)
}

pub async fn run_webhook_receiver(receivers: Vec<Receiver>, reconciler: Reconciler) -> Result<()> {
	let config = Settings::global().redacted()?;
	let state = Arc::new(State::new(receivers, reconciler, config, register_metric()?));
	let addr = WebhookReceiverSettings::global().to_socket_addr();

	let app = Router::new()
		.route("/", get(index))
		.route("/alert", post(alert_handler))
		.route("/healthz", get(healthz))
		.route("/config", get(config_handler))
		.layer(Extension(state));

	tracing::info!(%addr, "listening");

	axum::Server::bind(&addr).serve(app.into_make_service()).await.context("webhook receiver crashed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use alertbridge::{
		config::{ReceiverSettings, Secret},
		notify::ReconcileOptions,
		template::{FunctionTable, TemplateEngine},
		ticket::{
			Comment, NewTicket, ServiceError, Ticket, TicketQuery, TicketRef, TicketUpdate, Transition,
		},
	};
	use async_trait::async_trait;
	use prometheus::opts;

	use super::*;

	/// backend answering every search with the configured status
	struct StatusService(Option<u16>);

	#[async_trait]
	impl TicketService for StatusService {
		async fn search(&self, _: &TicketQuery) -> Result<Vec<Ticket>, ServiceError> {
			match self.0 {
				Some(status) => Err(ServiceError::Status { api: "Issue.Search", status, body: "busy".into() }),
				None => Ok(Vec::new()),
			}
		}

		async fn create(&self, _: &NewTicket) -> Result<TicketRef, ServiceError> {
			Ok(TicketRef { id: "1".into(), key: "AB-1".into() })
		}

		async fn update_fields(&self, _: &str, _: &TicketUpdate) -> Result<(), ServiceError> {
			Ok(())
		}

		async fn add_comment(&self, _: &str, body: &str) -> Result<Comment, ServiceError> {
			Ok(Comment { id: "1".into(), body: body.into() })
		}

		async fn list_transitions(&self, _: &str) -> Result<Vec<Transition>, ServiceError> {
			Ok(Vec::new())
		}

		async fn apply_transition(&self, _: &str, _: &str) -> Result<(), ServiceError> {
			Ok(())
		}
	}

	fn receiver(name: &str, status: Option<u16>) -> Receiver {
		let settings = ReceiverSettings {
			name: name.into(),
			api_url: Some("https://jira.example.com".into()),
			personal_access_token: Some(Secret::new("pat")),
			project: Some("AB".into()),
			issue_type: Some("Bug".into()),
			summary: Some("{{ groupLabels.alertname }}".into()),
			reopen_state: Some("To Do".into()),
			reopen_duration: Some("1h".parse().unwrap()),
			..Default::default()
		};

		Receiver {
			config: ReceiverConfig::merge(&settings, &ReceiverSettings::default()).unwrap(),
			service: Arc::new(StatusService(status)),
		}
	}

	fn state() -> State {
		let templates = Arc::new(TemplateEngine::new(&FunctionTable::builtin()));
		let metric =
			IntCounterVec::new(opts!("requests_total", "test counter"), &["receiver", "code"]).unwrap();

		State::new(
			vec![receiver("ok", None), receiver("busy", Some(503)), receiver("broken", Some(400))],
			Reconciler::new(templates, ReconcileOptions::default()),
			serde_json::Value::Null,
			metric,
		)
	}

	fn notification(receiver: &str) -> alert::Data {
		alert::Data {
			receiver: receiver.into(),
			alerts: vec![alert::Alert::default()],
			..Default::default()
		}
	}

	#[tokio::test]
	async fn handles_known_receiver() {
		assert_eq!(state().handle(&notification("ok")).await.unwrap(), "ok");
	}

	#[tokio::test]
	async fn unknown_receiver_is_not_found() {
		let failure = state().handle(&notification("nope")).await.unwrap_err();

		assert_eq!(failure.status, StatusCode::NOT_FOUND);
		assert_eq!(failure.receiver, UNKNOWN_RECEIVER);
		assert_eq!(failure.message, "receiver missing: nope");
	}

	#[tokio::test]
	async fn retryable_errors_ask_for_redelivery() {
		let failure = state().handle(&notification("busy")).await.unwrap_err();

		assert_eq!(failure.status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(failure.receiver, "busy");
		assert!(failure.message.contains("503"), "{}", failure.message);
	}

	#[tokio::test]
	async fn other_errors_are_internal() {
		let failure = state().handle(&notification("broken")).await.unwrap_err();

		assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn index_links_endpoints() {
		let page = index_page(9098);

		assert!(page.contains(r#"<a href="/config">"#));
		assert!(page.contains(r#"<a href="/healthz">"#));
		assert!(page.contains("<code>/metrics</code> on port 9098"));
		assert!(page.contains(DOCS_URL));
	}

	#[test]
	fn counts_requests() {
		let state = state();
		state.count("ok", StatusCode::OK);
		state.count("ok", StatusCode::OK);

		assert_eq!(state.metric.with_label_values(&["ok", "200"]).get(), 2);
	}
}
