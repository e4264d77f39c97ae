//! Reconciles alert group notifications with tickets.
//!
//! Every notification is mapped to at most one ticket, found by the group
//! label. Depending on the state of that ticket it is created, updated,
//! reopened or resolved. All updates are compared against the current ticket
//! first, so a redelivered notification doesn't change anything.

mod fields;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tera::Context;
use thiserror::Error;

use crate::{
	alert::Data,
	config::ReceiverConfig,
	group_label::{group_ticket_label, quote},
	template::{TemplateEngine, TemplateError},
	ticket::{NewTicket, ServiceError, Ticket, TicketQuery, TicketService, TicketUpdate, SEARCH_FIELDS},
};

/// more than one match is only reported, the first one is used
const SEARCH_LIMIT: usize = 2;

/// group label values attached to new tickets are cut after this many characters
const GROUP_LABEL_VALUE_LIMIT: usize = 200;

/// Process wide switches of the reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileOptions {
	/// use `JIRALERT{<sha512>}` instead of `ALERT{...}` as group label
	pub hash_group_label: bool,
	/// keep the summary of existing tickets up to date
	pub update_summary: bool,
	/// keep the description of existing tickets up to date
	pub update_description: bool,
	/// keep the priority of existing tickets up to date
	pub update_priority: bool,
	/// reopen recently resolved tickets when the group fires again
	pub reopen_tickets: bool,
	/// longer descriptions are truncated, counted in characters
	pub max_description_length: usize,
}

impl Default for ReconcileOptions {
	fn default() -> Self {
		Self {
			hash_group_label: false,
			update_summary: true,
			update_description: true,
			update_priority: true,
			reopen_tickets: true,
			max_description_length: 32767,
		}
	}
}

/// Error returned by [Reconciler::reconcile]
#[derive(Error, Debug)]
pub enum NotifyError {
	/// a configured template couldn't be rendered
	#[error("failed to render {what}")]
	Template {
		/// the rendered field
		what: &'static str,
		/// underlying template error
		#[source]
		source: TemplateError,
	},
	/// the ticket backend failed
	#[error(transparent)]
	Service(#[from] ServiceError),
	/// the ticket has no transition with the configured name
	#[error("state {state:?} does not exist or no transition possible for {key}")]
	MissingTransition {
		/// name of the requested transition
		state: String,
		/// ticket key
		key: String,
	},
}

impl NotifyError {
	/// true if alertmanager should deliver the notification again
	pub fn is_retryable(&self) -> bool {
		match self {
			NotifyError::Service(err) => err.is_retryable(),
			NotifyError::Template { .. } | NotifyError::MissingTransition { .. } => false,
		}
	}
}

/// What a reconciliation did to the ticket of the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// no usable ticket existed, a new one was created
	Created {
		/// key of the new ticket
		key: String,
	},
	/// an existing ticket was brought up to date
	Reused {
		/// ticket key
		key: String,
	},
	/// a recently resolved ticket was reopened
	Reopened {
		/// ticket key
		key: String,
	},
	/// every alert resolved and the ticket was auto-resolved
	Resolved {
		/// ticket key
		key: String,
	},
	/// the ticket was resolved with the won't fix resolution and stays closed
	Exempt {
		/// ticket key
		key: String,
	},
	/// nothing fires and there is no ticket
	Ignored,
}

impl Outcome {
	/// key of the affected ticket
	pub fn key(&self) -> Option<&str> {
		match self {
			Outcome::Created { key }
			| Outcome::Reused { key }
			| Outcome::Reopened { key }
			| Outcome::Resolved { key }
			| Outcome::Exempt { key } => Some(key),
			Outcome::Ignored => None,
		}
	}
}

/// renders the templates of one receiver against one notification
pub(crate) struct Renderer<'a> {
	/// the shared template library
	engine: &'a TemplateEngine,
	/// the serialized notification
	context: Context,
}

impl<'a> Renderer<'a> {
	fn new(engine: &'a TemplateEngine, data: &Data) -> Result<Self, NotifyError> {
		let context = TemplateEngine::context(data)
			.map_err(|source| NotifyError::Template { what: "template context", source })?;

		Ok(Self { engine, context })
	}

	/// render `text`, `what` names the field in errors
	pub(crate) fn render(&self, what: &'static str, text: &str) -> Result<String, NotifyError> {
		self.engine.render(text, &self.context).map_err(|source| NotifyError::Template { what, source })
	}
}

/// rendered fields compared against existing tickets
struct Rendered {
	summary: String,
	description: String,
	priority: Option<String>,
}

/// Creates, updates, reopens and resolves tickets for alert groups.
#[derive(Debug, Clone)]
pub struct Reconciler {
	/// template library shared with every other reconciler
	templates: Arc<TemplateEngine>,
	/// process wide switches
	options: ReconcileOptions,
	/// current time, replaced in tests
	now: fn() -> DateTime<Utc>,
}

impl Reconciler {
	pub fn new(templates: Arc<TemplateEngine>, options: ReconcileOptions) -> Self {
		Self { templates, options, now: Utc::now }
	}

	/// replace the clock used to decide whether a resolved ticket is stale
	pub fn with_clock(mut self, now: fn() -> DateTime<Utc>) -> Self {
		self.now = now;
		self
	}

	pub fn options(&self) -> &ReconcileOptions {
		&self.options
	}

	/// Brings the ticket of the notified alert group up to date.
	///
	/// The first failing step aborts, earlier changes are not rolled back.
	#[tracing::instrument(skip_all, fields(receiver = %conf.name, group_key = %data.group_key))]
	pub async fn reconcile<S>(&self, service: &S, data: &Data, conf: &ReceiverConfig) -> Result<Outcome, NotifyError>
	where
		S: TicketService + ?Sized,
	{
		let renderer = Renderer::new(&self.templates, data)?;

		let project = renderer.render("project", &conf.project)?;
		let label = group_ticket_label(&data.group_labels, self.options.hash_group_label);

		let ticket = self.find_ticket_to_reuse(service, conf, &project, &label).await?;

		// the summary is always rendered, it may reflect the current group state
		let rendered = Rendered {
			summary: renderer.render("summary", &conf.summary)?,
			priority: conf.priority.as_deref().map(|p| renderer.render("priority", p)).transpose()?,
			description: self.truncate(renderer.render("description", &conf.description)?),
		};

		match ticket {
			Some(ticket) => self.update(service, conf, data, &label, ticket, rendered).await,
			None if !data.has_firing() => {
				tracing::debug!(label = label.as_str(), "no firing alert, nothing to do");
				Ok(Outcome::Ignored)
			}
			None => self.create(service, conf, data, &renderer, project, label, rendered).await,
		}
	}

	/// Searches the ticket of the group in `project` and the other configured
	/// projects. Resolved tickets outside the reopen window are ignored.
	async fn find_ticket_to_reuse<S>(
		&self,
		service: &S,
		conf: &ReceiverConfig,
		project: &str,
		label: &str,
	) -> Result<Option<Ticket>, NotifyError>
	where
		S: TicketService + ?Sized,
	{
		// tickets may have been moved to one of the other projects
		let mut projects = vec![project.to_owned()];
		projects.extend(conf.other_projects.iter().filter(|other| *other != project).cloned());

		let query = TicketQuery {
			projects,
			label: label.to_owned(),
			fields: SEARCH_FIELDS.iter().map(|field| field.to_string()).collect(),
			limit: SEARCH_LIMIT,
		};

		tracing::debug!(?query, "searching ticket");
		let tickets = service.search(&query).await?;

		if tickets.len() > 1 {
			let keys: Vec<_> = tickets.iter().map(|ticket| ticket.key.as_str()).collect();
			tracing::warn!(
				label,
				?keys,
				picked = keys[0],
				"more than one ticket matched, picking most recently resolved"
			);
		}

		let ticket = match tickets.into_iter().next() {
			Some(ticket) => ticket,
			None => {
				tracing::debug!(label, "no ticket found");
				return Ok(None);
			}
		};

		if let Some(resolved) = ticket.resolution_date {
			let window = conf.reopen_duration;
			let stale = !window.is_zero()
				&& resolved.checked_add_signed(window.to_chrono()).map_or(false, |end| end < (self.now)());

			if stale {
				tracing::debug!(
					key = ticket.key.as_str(),
					label,
					resolution_time = %resolved.to_rfc3339(),
					reopen_duration = %window,
					"resolved ticket is too old to reopen, skipping"
				);
				return Ok(None);
			}
		}

		tracing::debug!(key = ticket.key.as_str(), label, "reusing ticket");
		Ok(Some(ticket))
	}

	/// cut the description after the configured number of characters
	fn truncate(&self, mut description: String) -> String {
		let limit = self.options.max_description_length;
		if let Some((end, _)) = description.char_indices().nth(limit) {
			tracing::warn!(original = description.chars().count(), limit, "truncating description");
			description.truncate(end);
		}
		description
	}

	/// update, comment on, resolve or reopen an existing ticket
	async fn update<S>(
		&self,
		service: &S,
		conf: &ReceiverConfig,
		data: &Data,
		label: &str,
		ticket: Ticket,
		rendered: Rendered,
	) -> Result<Outcome, NotifyError>
	where
		S: TicketService + ?Sized,
	{
		let key = ticket.key.as_str();

		if self.options.update_summary && ticket.summary != rendered.summary {
			tracing::debug!(key, summary = rendered.summary.as_str(), "updating summary");
			service.update_fields(key, &TicketUpdate::summary(&rendered.summary)).await?;
		}

		// comments have to be checked against the description before it is updated
		if conf.update_in_comment {
			match ticket.last_comment() {
				Some(last) if last == rendered.description => {
					tracing::debug!(key, "not adding comment identical to the last one");
				}
				None if ticket.description == rendered.description => {
					tracing::debug!(key, "not adding comment identical to the description");
				}
				_ => {
					let comment = service.add_comment(key, &rendered.description).await?;
					tracing::debug!(key, id = comment.id.as_str(), "added comment");
				}
			}
		}

		if self.options.update_description && ticket.description != rendered.description {
			tracing::debug!(key, "updating description");
			service.update_fields(key, &TicketUpdate::description(&rendered.description)).await?;
		}

		if self.options.update_priority {
			if let (Some(current), Some(priority)) = (&ticket.priority, &rendered.priority) {
				if current != priority {
					tracing::debug!(key, priority = priority.as_str(), "updating priority");
					service.update_fields(key, &TicketUpdate::priority(priority)).await?;
				}
			}
		}

		if !data.has_firing() {
			if let Some(auto_resolve) = &conf.auto_resolve {
				tracing::debug!(key, label, "no firing alert, resolving ticket");
				self.transition(service, key, &auto_resolve.state).await?;
				return Ok(Outcome::Resolved { key: ticket.key });
			}

			tracing::debug!(key, label, "no firing alert, nothing else to do");
			return Ok(Outcome::Reused { key: ticket.key });
		}

		if !ticket.is_done() {
			tracing::debug!(key, label, "ticket is unresolved, all is done");
			return Ok(Outcome::Reused { key: ticket.key });
		}

		if !self.options.reopen_tickets {
			tracing::debug!(key, label, "reopening disabled, leaving ticket resolved");
			return Ok(Outcome::Reused { key: ticket.key });
		}

		if let (Some(wont_fix), Some(resolution)) = (&conf.wont_fix_resolution, &ticket.resolution) {
			if wont_fix == resolution {
				tracing::info!(key, label, resolution = resolution.as_str(), "ticket was resolved as won't fix, not reopening");
				return Ok(Outcome::Exempt { key: ticket.key });
			}
		}

		tracing::info!(key, label, "ticket was recently resolved, reopening");
		self.transition(service, key, &conf.reopen_state).await?;

		Ok(Outcome::Reopened { key: ticket.key })
	}

	/// create a new ticket for the group
	#[allow(clippy::too_many_arguments)]
	async fn create<S>(
		&self,
		service: &S,
		conf: &ReceiverConfig,
		data: &Data,
		renderer: &Renderer<'_>,
		project: String,
		label: String,
		rendered: Rendered,
	) -> Result<Outcome, NotifyError>
	where
		S: TicketService + ?Sized,
	{
		tracing::info!(label = label.as_str(), "no recent matching ticket found, creating new ticket");

		let issue_type = renderer.render("issue type", &conf.issue_type)?;

		let mut labels = conf.static_labels.clone();
		labels.push(label);
		if conf.add_group_labels {
			labels.extend(data.group_labels.iter().map(|(name, value)| {
				let value: String = value.chars().take(GROUP_LABEL_VALUE_LIMIT).collect();
				format!("{name}={}", quote(&value))
			}));
		}

		let components = conf
			.components
			.iter()
			.map(|component| renderer.render("component", component))
			.collect::<Result<Vec<_>, _>>()?;

		let mut fields = serde_json::Map::new();
		for (key, value) in &conf.fields {
			fields.insert(key.clone(), fields::render_field(renderer, value)?);
		}

		let ticket = NewTicket {
			project,
			issue_type,
			summary: rendered.summary,
			description: rendered.description,
			labels,
			priority: rendered.priority,
			components,
			fields,
		};

		tracing::debug!(?ticket, "creating ticket");
		let created = service.create(&ticket).await?;
		tracing::info!(key = created.key.as_str(), id = created.id.as_str(), "ticket created");

		Ok(Outcome::Created { key: created.key })
	}

	/// apply the transition named `state`
	async fn transition<S>(&self, service: &S, key: &str, state: &str) -> Result<(), NotifyError>
	where
		S: TicketService + ?Sized,
	{
		let transitions = service.list_transitions(key).await?;

		let transition = transitions.iter().find(|transition| transition.name == state).ok_or_else(|| {
			NotifyError::MissingTransition { state: state.to_owned(), key: key.to_owned() }
		})?;

		tracing::debug!(key, state, transition = transition.id.as_str(), "applying transition");
		service.apply_transition(key, &transition.id).await?;

		Ok(())
	}
}
